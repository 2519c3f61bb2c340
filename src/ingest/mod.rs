//! Batch loader - fetch, convert, replace, append

pub mod loader;
pub mod progress;

pub use loader::{LoadResult, load_dataset, write_batches};
pub use progress::LoadProgress;
