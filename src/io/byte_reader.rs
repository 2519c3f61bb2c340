use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use super::http_reader::HttpByteReader;
use super::local_reader::LocalFileByteReader;
use super::uri::SourceUri;
use crate::error::IngestError;

/// Abstraction for fetching a whole source object
/// This trait lets the loader read from different locations (local, HTTP)
/// with a unified interface
#[async_trait]
pub trait ByteReader: Send + Sync {
    /// Human-readable location, used in logs and errors
    fn location(&self) -> String;

    /// Read the entire object into memory
    async fn read_all(&self) -> Result<Bytes>;
}

/// Create the reader for a parsed source URI
pub fn reader_for(uri: &SourceUri) -> Result<Arc<dyn ByteReader>> {
    Ok(match uri {
        SourceUri::Local(path) => Arc::new(LocalFileByteReader::new(path)),
        SourceUri::Http(url) => Arc::new(HttpByteReader::new(url.clone())?),
    })
}

/// Parse `source`, fetch it, and map any failure to `IngestError::SourceFetch`
pub async fn fetch_source(source: &str) -> Result<Bytes> {
    let fetch_error = |reason: String| IngestError::SourceFetch {
        location: source.to_string(),
        reason,
    };

    let uri = SourceUri::parse(source).map_err(|e| fetch_error(format!("{:#}", e)))?;
    let reader = reader_for(&uri).map_err(|e| fetch_error(format!("{:#}", e)))?;

    tracing::info!("Fetching {}", reader.location());
    let data = reader
        .read_all()
        .await
        .map_err(|e| fetch_error(format!("{:#}", e)))?;
    tracing::info!("Fetched {} bytes from {}", data.len(), reader.location());

    Ok(data)
}
