//! Parquet file format support.
//!
//! The file is fetched whole, streamed through Arrow's async record batch reader
//! and converted into row-based Records with one tagged value per column.

mod conversion;
mod reader;

pub use reader::read_parquet;
