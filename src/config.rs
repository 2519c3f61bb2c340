//! Configuration constants for the ingestion utility
//!
//! This module centralizes the defaults and tunables used throughout the
//! application. The CLI exposes most of them as flags.

// ============================================================================
// Connection Defaults
// ============================================================================

pub const DEFAULT_PG_USER: &str = "postgres";

pub const DEFAULT_PG_PASSWORD: &str = "postgres";

pub const DEFAULT_PG_HOST: &str = "localhost";

pub const DEFAULT_PG_PORT: u16 = 5433;

pub const DEFAULT_PG_DATABASE: &str = "ny_taxi";

// ============================================================================
// Dataset Defaults
// ============================================================================

pub const DEFAULT_GREEN_URL: &str =
    "https://d37ci6vzurychx.cloudfront.net/trip-data/green_tripdata_2025-11.parquet";

pub const DEFAULT_GREEN_TABLE: &str = "green_taxi_trips";

pub const DEFAULT_ZONES_URL: &str =
    "https://github.com/DataTalksClub/nyc-tlc-data/releases/download/misc/taxi_zone_lookup.csv";

pub const DEFAULT_ZONES_TABLE: &str = "taxi_zones";

/// Rows per batch for both the Parquet slices and the CSV chunk reader
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

// ============================================================================
// Write Path Configuration
// ============================================================================

/// Upper bound on bind parameters in a single INSERT statement
///
/// PostgreSQL accepts 65535 parameters per statement and SQLite (as bundled by
/// sqlx) accepts 32766. Using the smaller limit keeps one statement builder for
/// both backends. A batch whose rows need more parameters is split into several
/// statements inside the same transaction.
pub const MAX_BIND_PARAMS: usize = 32_766;

// ============================================================================
// Parsing Configuration
// ============================================================================

/// Timestamp layouts accepted when parsing text into TIMESTAMP values
pub const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",    // 2025-01-01 12:34:56
    "%Y-%m-%dT%H:%M:%S",    // 2025-01-01T12:34:56 (ISO 8601)
    "%Y-%m-%d %H:%M:%S%.f", // With fractional seconds
    "%Y-%m-%dT%H:%M:%S%.f", // ISO 8601 with fractional seconds
    "%Y-%m-%d %H:%M",       // Without seconds
    "%Y-%m-%dT%H:%M",       // ISO 8601 without seconds
    "%m/%d/%Y %H:%M:%S",    // US format with time
    "%m/%d/%Y %I:%M:%S %p", // US format, 12-hour clock
    "%d-%m-%Y %H:%M:%S",    // European format with time
];

/// Date-only layouts, interpreted as midnight
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];
