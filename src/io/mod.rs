//! I/O abstraction layer for fetching source bytes from different locations

pub mod byte_reader;
pub mod http_reader;
pub mod local_reader;
pub mod uri;

pub use byte_reader::fetch_source;
