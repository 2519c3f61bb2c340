use anyhow::{Result, anyhow};
use std::path::PathBuf;
use url::Url;

/// Represents a parsed source URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceUri {
    Local(PathBuf),
    Http(Url),
}

impl SourceUri {
    /// Parse a URI string into a SourceUri
    pub fn parse(uri: &str) -> Result<Self> {
        // Try parsing as URL first
        if let Ok(url) = Url::parse(uri) {
            match url.scheme() {
                "http" | "https" => {
                    if url.host_str().is_none_or(str::is_empty) {
                        return Err(anyhow!("URL missing host: {}", uri));
                    }
                    Ok(SourceUri::Http(url))
                }
                "file" => {
                    let path = url
                        .to_file_path()
                        .map_err(|_| anyhow!("Invalid file:// URI: {}", uri))?;
                    Ok(SourceUri::Local(path))
                }
                // Windows drive letters parse as a one-letter scheme
                scheme if scheme.len() == 1 => Ok(SourceUri::Local(PathBuf::from(uri))),
                scheme => Err(anyhow!("Unsupported URI scheme: {}", scheme)),
            }
        } else {
            // Treat as local file path
            Ok(SourceUri::Local(PathBuf::from(uri)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_https_url() {
        let uri = SourceUri::parse(
            "https://d37ci6vzurychx.cloudfront.net/trip-data/green_tripdata_2025-11.parquet",
        )
        .unwrap();
        match uri {
            SourceUri::Http(url) => {
                assert_eq!(url.host_str(), Some("d37ci6vzurychx.cloudfront.net"));
                assert_eq!(url.path(), "/trip-data/green_tripdata_2025-11.parquet");
            }
            _ => panic!("Expected HTTP URI"),
        }
    }

    #[test]
    fn test_parse_local_path() {
        let uri = SourceUri::parse("/data/file.csv").unwrap();
        assert_eq!(uri, SourceUri::Local(PathBuf::from("/data/file.csv")));
    }

    #[test]
    fn test_parse_relative_path() {
        let uri = SourceUri::parse("data/file.csv").unwrap();
        assert!(matches!(uri, SourceUri::Local(_)));
    }

    #[test]
    fn test_parse_file_uri() {
        let uri = SourceUri::parse("file:///data/file.csv").unwrap();
        assert!(matches!(uri, SourceUri::Local(_)));
    }

    #[test]
    fn test_parse_unsupported_scheme() {
        let result = SourceUri::parse("s3://bucket/key.parquet");
        assert!(result.is_err());
    }
}
