use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use super::byte_reader::ByteReader;

/// ByteReader implementation for HTTP(S) downloads
///
/// Redirects are followed (release assets on GitHub redirect to object
/// storage). Non-success status codes are errors.
#[derive(Clone)]
pub struct HttpByteReader {
    client: reqwest::Client,
    url: Url,
}

impl HttpByteReader {
    pub fn new(url: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl ByteReader for HttpByteReader {
    fn location(&self) -> String {
        self.url.to_string()
    }

    async fn read_all(&self) -> Result<Bytes> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .context("HTTP request failed")?
            .error_for_status()
            .context("Server returned an error status")?;

        response
            .bytes()
            .await
            .context("Failed to read HTTP response body")
    }
}
