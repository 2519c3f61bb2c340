use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use csv::StringRecord;
use std::io::Cursor;

use crate::db::schema::{FieldValues, SchemaInferrer, SqlType, TableSchema};
use crate::error::IngestError;
use crate::formats::reader::{DelimitedConfig, Record};
use crate::formats::value::Value;

/// Chunked reader over a delimited file held in memory
///
/// The column layout is fixed from the header and the first chunk; every chunk,
/// the first included, is then parsed against that layout. A field that does not
/// parse as its column's type fails the chunk with `IngestError::SchemaMismatch`.
pub struct DelimitedChunks {
    reader: csv::Reader<Cursor<Bytes>>,
    schema: TableSchema,
    chunk_size: usize,
    table: String,
    pending: Option<Vec<FieldValues>>,
    rows_converted: usize,
    exhausted: bool,
}

impl DelimitedChunks {
    /// Open the reader, consume the header and first chunk, and settle the schema
    ///
    /// `declared` overrides the inferred type of the named columns; naming a
    /// column the file does not have is an error. `table` only labels errors.
    pub fn new(
        data: Bytes,
        config: &DelimitedConfig,
        chunk_size: usize,
        declared: &[(String, SqlType)],
        table: &str,
    ) -> Result<Self> {
        anyhow::ensure!(chunk_size > 0, "Chunk size must be greater than zero");

        let reader = csv::ReaderBuilder::new()
            .delimiter(config.delimiter)
            .quote(config.quote)
            .has_headers(false) // We handle headers ourselves
            .flexible(true)
            .from_reader(Cursor::new(data));

        let mut chunks = Self {
            reader,
            schema: TableSchema::default(),
            chunk_size,
            table: table.to_string(),
            pending: None,
            rows_converted: 0,
            exhausted: false,
        };

        let header = chunks
            .read_raw_chunk(1)?
            .pop()
            .ok_or_else(|| anyhow!("no columns to parse from file"))?;
        let first_chunk = chunks.read_raw_chunk(chunk_size)?;

        let mut sample = Vec::with_capacity(first_chunk.len() + 1);
        sample.push(header);
        sample.extend(first_chunk.iter().cloned());

        let mut schema = SchemaInferrer
            .infer_from_data(&sample)
            .context("Failed to infer schema")?;

        for (name, sql_type) in declared {
            let idx = schema
                .position(name)
                .ok_or_else(|| IngestError::MissingColumn(name.clone()))?;
            schema.columns[idx].sql_type = *sql_type;
        }

        chunks.schema = schema;
        chunks.pending = Some(first_chunk);
        Ok(chunks)
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Read up to `limit` raw rows
    fn read_raw_chunk(&mut self, limit: usize) -> Result<Vec<FieldValues>> {
        let mut rows = Vec::new();
        let mut record = StringRecord::new();

        while rows.len() < limit {
            let more = self
                .reader
                .read_record(&mut record)
                .context("Failed to parse CSV record")?;
            if !more {
                self.exhausted = true;
                break;
            }
            rows.push(record.iter().map(|s| s.to_string()).collect());
        }

        Ok(rows)
    }

    /// Parse raw rows against the schema
    fn convert(&mut self, rows: Vec<FieldValues>) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(rows.len());

        for fields in rows {
            let row = self.rows_converted;
            if fields.len() > self.schema.len() {
                return Err(IngestError::BatchWidth {
                    table: self.table.clone(),
                    row,
                    expected: self.schema.len(),
                    found: fields.len(),
                }
                .into());
            }

            let mut values = Vec::with_capacity(self.schema.len());
            for (idx, column) in self.schema.columns.iter().enumerate() {
                // Short rows are padded with missing values
                let raw = fields.get(idx).map(|s| s.as_str()).unwrap_or("");
                let value = Value::parse_as(raw, column.sql_type).ok_or_else(|| {
                    IngestError::SchemaMismatch {
                        table: self.table.clone(),
                        column: column.name.clone(),
                        row,
                        value: raw.to_string(),
                        expected: column.sql_type,
                    }
                })?;
                values.push(value);
            }

            records.push(Record { values });
            self.rows_converted += 1;
        }

        Ok(records)
    }
}

impl Iterator for DelimitedChunks {
    type Item = Result<Vec<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(first) = self.pending.take() {
            if first.is_empty() {
                return None;
            }
            return Some(self.convert(first));
        }

        if self.exhausted {
            return None;
        }

        let rows = match self.read_raw_chunk(self.chunk_size) {
            Ok(rows) => rows,
            Err(e) => {
                self.exhausted = true;
                return Some(Err(e));
            }
        };

        if rows.is_empty() {
            return None;
        }

        Some(self.convert(rows))
    }
}
