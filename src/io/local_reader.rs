use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use super::byte_reader::ByteReader;

/// ByteReader implementation for local files
#[derive(Clone)]
pub struct LocalFileByteReader {
    file_path: PathBuf,
}

impl LocalFileByteReader {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ByteReader for LocalFileByteReader {
    fn location(&self) -> String {
        self.file_path.display().to_string()
    }

    async fn read_all(&self) -> Result<Bytes> {
        let data = tokio::fs::read(&self.file_path)
            .await
            .with_context(|| format!("Failed to read file {}", self.file_path.display()))?;
        Ok(Bytes::from(data))
    }
}
