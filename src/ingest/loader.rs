//! Replace-then-append bulk load of one dataset.

use anyhow::{Context, Result, bail};
use std::time::{Duration, Instant};
use tracing::info;

use super::progress::LoadProgress;
use crate::dataset::{DatasetDescriptor, coerce_dataset};
use crate::db::DbConnection;
use crate::db::schema::TableSchema;
use crate::error::IngestError;
use crate::formats::delimited::DelimitedChunks;
use crate::formats::parquet::read_parquet;
use crate::formats::Record;
use crate::io::fetch_source;
use crate::telemetry::TelemetryEvent;

/// Result of a completed dataset load
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub table: String,
    pub batches_written: usize,
    pub rows_written: u64,
    pub duration: Duration,
    /// p50 / p90 / p99 batch commit time in milliseconds
    pub batch_percentiles: (Option<u64>, Option<u64>, Option<u64>),
}

/// Load one dataset into its target table
///
/// Fetches the source, converts it to typed records, recreates the target table
/// from the dataset's columns and appends the records batch by batch. Each
/// batch commits on its own, so a failure part-way leaves the earlier batches
/// in place.
pub async fn load_dataset(
    db: &mut DbConnection,
    descriptor: &DatasetDescriptor,
    quiet: bool,
) -> Result<LoadResult> {
    let batch_size = descriptor.batch_size;
    if batch_size == 0 {
        bail!("batch size for {} must be greater than zero", descriptor.name);
    }

    let start = Instant::now();
    info!(
        "Ingesting {} from {} into {}...",
        descriptor.name, descriptor.source_uri, descriptor.target_table
    );

    let data = fetch_source(&descriptor.source_uri).await?;
    let table = descriptor.target_table.as_str();

    let progress = match descriptor.format.delimited_config() {
        None => {
            let mut dataset = read_parquet(data)
                .await
                .map_err(|e| as_source_error(&descriptor.source_uri, e))?;
            info!(
                "Read {} rows, {} columns",
                dataset.len(),
                dataset.schema.len()
            );
            coerce_dataset(&mut dataset, descriptor)?;

            let mut progress = LoadProgress::new(
                &descriptor.name,
                Some(dataset.batch_count(batch_size) as u64),
                quiet,
            )?;
            let batches = dataset.batches(batch_size).map(Ok);
            write_batches(db, table, &dataset.schema, batches, &mut progress).await?;
            progress
        }
        Some(config) => {
            let chunks = DelimitedChunks::new(
                data,
                &config,
                batch_size,
                &descriptor.declared_types(),
                table,
            )
            .map_err(|e| as_source_error(&descriptor.source_uri, e))?;
            let schema = chunks.schema().clone();
            info!("Inferred {} columns", schema.len());

            let mut progress = LoadProgress::new(&descriptor.name, None, quiet)?;
            write_batches(db, table, &schema, chunks, &mut progress).await?;
            progress
        }
    };
    progress.finish();

    let stats = progress.stats();
    let result = LoadResult {
        table: table.to_string(),
        batches_written: stats.batches_written,
        rows_written: stats.rows_written,
        duration: start.elapsed(),
        batch_percentiles: stats.get_percentiles(),
    };

    info!(
        "Load complete: {} rows in {} batches into {} in {:.2}s",
        result.rows_written,
        result.batches_written,
        result.table,
        result.duration.as_secs_f64()
    );

    Ok(result)
}

/// Recreate `table` from `schema`, then append every batch in order
///
/// The replace step runs even when `batches` is empty. Rows are numbered
/// across batches in error messages.
pub async fn write_batches<I, B>(
    db: &mut DbConnection,
    table: &str,
    schema: &TableSchema,
    batches: I,
    progress: &mut LoadProgress,
) -> Result<()>
where
    I: IntoIterator<Item = Result<B>>,
    B: AsRef<[Record]>,
{
    db.replace_table(table, schema)
        .await
        .with_context(|| format!("Failed to replace table '{}'", table))?;
    progress.record(TelemetryEvent::TableReplaced);

    let mut row_offset = 0;
    for batch in batches {
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                progress.abandon();
                return Err(e);
            }
        };
        let records = batch.as_ref();

        let started = Instant::now();
        let rows = match db.append(table, schema, records, row_offset).await {
            Ok(rows) => rows,
            Err(e) => {
                progress.abandon();
                return Err(e.context(format!(
                    "Failed to append batch {} to '{}'",
                    progress.stats().batches_written + 1,
                    table
                )));
            }
        };
        row_offset += records.len();

        progress.record(TelemetryEvent::BatchWritten {
            rows,
            duration_ms: started.elapsed().as_millis() as u64,
        });
    }

    Ok(())
}

/// Report unreadable source bytes as a fetch failure, keeping typed errors as-is
fn as_source_error(location: &str, error: anyhow::Error) -> anyhow::Error {
    if error.downcast_ref::<IngestError>().is_some() {
        return error;
    }
    IngestError::SourceFetch {
        location: location.to_string(),
        reason: format!("{:#}", error),
    }
    .into()
}
