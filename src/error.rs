//! Typed failures of the bulk-load path
//!
//! The loader works with `anyhow::Result`; these variants are what ends up at
//! the root of the chain, so callers can `downcast_ref::<IngestError>()` to
//! tell a bad source apart from bad data.

use thiserror::Error;

use crate::db::schema::SqlType;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to fetch source '{location}': {reason}")]
    SourceFetch { location: String, reason: String },

    #[error("column '{column}' row {row}: cannot convert {value} to {target}")]
    TypeCoercion {
        column: String,
        row: usize,
        value: String,
        target: &'static str,
    },

    #[error("declared column '{0}' not found in source")]
    MissingColumn(String),

    #[error(
        "table '{table}' row {row}: value '{value}' in column '{column}' does not match {expected}"
    )]
    SchemaMismatch {
        table: String,
        column: String,
        row: usize,
        value: String,
        expected: SqlType,
    },

    #[error("table '{table}' has {expected} columns but batch row {row} has {found}")]
    BatchWidth {
        table: String,
        row: usize,
        expected: usize,
        found: usize,
    },
}
