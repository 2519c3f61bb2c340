//! Dataset descriptors: where a dataset comes from, where it goes, and the
//! column types it is coerced to on the way.

use anyhow::Result;

use crate::db::schema::SqlType;
use crate::error::IngestError;
use crate::formats::{Dataset, Format};

/// Declared type of a source column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    /// Integer that may be missing
    NullableInt,
    Float,
    Text,
    Timestamp,
}

impl SemanticType {
    pub fn sql_type(self) -> SqlType {
        match self {
            SemanticType::NullableInt => SqlType::BigInt,
            SemanticType::Float => SqlType::DoublePrecision,
            SemanticType::Text => SqlType::Text,
            SemanticType::Timestamp => SqlType::Timestamp,
        }
    }

    /// Name used in coercion errors
    pub fn label(self) -> &'static str {
        match self {
            SemanticType::NullableInt => "Int64",
            SemanticType::Float => "float64",
            SemanticType::Text => "string",
            SemanticType::Timestamp => "datetime",
        }
    }
}

/// Everything needed to load one dataset into one table
#[derive(Debug, Clone)]
pub struct DatasetDescriptor {
    pub name: String,
    pub source_uri: String,
    pub target_table: String,
    pub format: Format,
    /// Ordered column rules applied before loading
    pub column_types: Vec<(String, SemanticType)>,
    /// Columns parsed into timestamps after the type rules
    pub timestamp_columns: Vec<String>,
    pub batch_size: usize,
}

const GREEN_TAXI_TYPES: &[(&str, SemanticType)] = &[
    ("VendorID", SemanticType::NullableInt),
    ("passenger_count", SemanticType::NullableInt),
    ("trip_distance", SemanticType::Float),
    ("RatecodeID", SemanticType::NullableInt),
    ("store_and_fwd_flag", SemanticType::Text),
    ("PULocationID", SemanticType::NullableInt),
    ("DOLocationID", SemanticType::NullableInt),
    ("payment_type", SemanticType::NullableInt),
    ("fare_amount", SemanticType::Float),
    ("extra", SemanticType::Float),
    ("mta_tax", SemanticType::Float),
    ("tip_amount", SemanticType::Float),
    ("tolls_amount", SemanticType::Float),
    ("improvement_surcharge", SemanticType::Float),
    ("total_amount", SemanticType::Float),
    ("congestion_surcharge", SemanticType::Float),
    ("ehail_fee", SemanticType::Float),
    ("trip_type", SemanticType::NullableInt),
];

const GREEN_TAXI_TIMESTAMPS: &[&str] = &["lpep_pickup_datetime", "lpep_dropoff_datetime"];

impl DatasetDescriptor {
    /// Green taxi trip records (Parquet)
    pub fn green_taxi_trips(source_uri: &str, target_table: &str, batch_size: usize) -> Self {
        Self {
            name: "green taxi trips".to_string(),
            source_uri: source_uri.to_string(),
            target_table: target_table.to_string(),
            format: Format::detect(source_uri).unwrap_or(Format::Parquet),
            column_types: GREEN_TAXI_TYPES
                .iter()
                .map(|(name, ty)| (name.to_string(), *ty))
                .collect(),
            timestamp_columns: GREEN_TAXI_TIMESTAMPS.iter().map(|c| c.to_string()).collect(),
            batch_size,
        }
    }

    /// Taxi zone lookup table (CSV), loaded with inferred column types
    pub fn taxi_zones(source_uri: &str, target_table: &str, chunksize: usize) -> Self {
        Self {
            name: "taxi zones".to_string(),
            source_uri: source_uri.to_string(),
            target_table: target_table.to_string(),
            format: Format::detect(source_uri).unwrap_or(Format::Csv),
            column_types: Vec::new(),
            timestamp_columns: Vec::new(),
            batch_size: chunksize,
        }
    }

    /// Column rules as SQL types, timestamp columns last
    ///
    /// A column named in both lists ends up as TIMESTAMP.
    pub fn declared_types(&self) -> Vec<(String, SqlType)> {
        let mut declared: Vec<(String, SqlType)> = self
            .column_types
            .iter()
            .filter(|(name, _)| !self.timestamp_columns.contains(name))
            .map(|(name, ty)| (name.clone(), ty.sql_type()))
            .collect();
        declared.extend(
            self.timestamp_columns
                .iter()
                .map(|name| (name.clone(), SqlType::Timestamp)),
        );
        declared
    }
}

/// Apply the descriptor's column rules, then its timestamp parsing, in place
///
/// Undeclared columns keep their source type. Fails on the first declared
/// column missing from the dataset or the first value that cannot be converted.
pub fn coerce_dataset(dataset: &mut Dataset, descriptor: &DatasetDescriptor) -> Result<()> {
    let rules = descriptor.column_types.iter().map(|(name, ty)| (name, *ty)).chain(
        descriptor
            .timestamp_columns
            .iter()
            .map(|name| (name, SemanticType::Timestamp)),
    );

    for (name, semantic) in rules {
        let idx = dataset
            .schema
            .position(name)
            .ok_or_else(|| IngestError::MissingColumn(name.clone()))?;
        let target = semantic.sql_type();

        for (row, record) in dataset.records.iter_mut().enumerate() {
            let current = &record.values[idx];
            let converted = current
                .clone()
                .coerce(target)
                .ok_or_else(|| IngestError::TypeCoercion {
                    column: name.clone(),
                    row,
                    value: current.describe(),
                    target: semantic.label(),
                })?;
            record.values[idx] = converted;
        }

        dataset.schema.columns[idx].sql_type = target;
    }

    tracing::debug!(
        "Applied {} column rules to {}",
        descriptor.column_types.len() + descriptor.timestamp_columns.len(),
        descriptor.name
    );
    Ok(())
}
