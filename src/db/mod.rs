//! Database layer - connection handle, access helpers, and schema inference

pub mod connection;
pub mod helpers;
pub mod schema;

pub use connection::{ConnectionParams, ConnectionParamsBuilder, DbConnection};
pub use helpers::{DbError, DbErrorKind, DbOutcome};
pub use schema::{SchemaInferrer, SqlType, TableSchema};
