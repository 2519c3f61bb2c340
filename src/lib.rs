// Public API - the runner plus the pieces the CLI and helper callers need
pub mod config;
pub mod dataset;
pub mod db;
pub mod error;
pub mod formats;
pub mod ingest;
pub mod runner;

// Internal modules - organized by subsystem
mod io;
mod telemetry;
