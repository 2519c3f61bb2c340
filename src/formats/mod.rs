//! File format parsers and readers

pub mod delimited;
pub mod parquet;
pub mod reader;
pub mod value;

pub use reader::{Dataset, DelimitedConfig, Format, Record};
pub use value::Value;
