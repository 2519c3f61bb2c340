use super::value::Value;
use crate::db::schema::TableSchema;

/// A single record (row) from the source
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }
}

/// A fully materialized table: the column layout plus every row in source order
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub schema: TableSchema,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Contiguous slices of at most `batch_size` rows, in order
    pub fn batches(&self, batch_size: usize) -> std::slice::Chunks<'_, Record> {
        self.records.chunks(batch_size)
    }

    /// Number of batches `batches(batch_size)` yields
    pub fn batch_count(&self, batch_size: usize) -> usize {
        self.records.len().div_ceil(batch_size)
    }
}

/// Configuration for delimited file reading (CSV, TSV, etc.)
#[derive(Debug, Clone)]
pub struct DelimitedConfig {
    pub delimiter: u8,
    pub quote: u8,
}

impl Default for DelimitedConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
        }
    }
}

impl DelimitedConfig {
    pub fn csv() -> Self {
        Self::default()
    }

    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            quote: b'"',
        }
    }
}

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Tsv,
    Parquet,
}

impl Format {
    /// Auto-detect file format from a path or URL
    pub fn detect(path: &str) -> Option<Self> {
        // Ignore query strings on URLs
        let lower = path.split(['?', '#']).next().unwrap_or(path).to_lowercase();

        if lower.ends_with(".csv") {
            Some(Format::Csv)
        } else if lower.ends_with(".tsv") {
            Some(Format::Tsv)
        } else if lower.ends_with(".parquet") {
            Some(Format::Parquet)
        } else {
            None
        }
    }

    /// Delimiter settings for text formats, `None` for Parquet
    pub fn delimited_config(self) -> Option<DelimitedConfig> {
        match self {
            Format::Csv => Some(DelimitedConfig::csv()),
            Format::Tsv => Some(DelimitedConfig::tsv()),
            Format::Parquet => None,
        }
    }
}
