//! Delimited (CSV / TSV) sources read chunk by chunk

pub mod reader;

pub use reader::DelimitedChunks;
