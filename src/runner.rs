//! High-level runner API for the ingestion utility.
//!
//! Opens the single database connection, loads each dataset in turn and
//! collects the per-dataset outcomes. This is the API the CLI drives.

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::dataset::DatasetDescriptor;
use crate::db::{ConnectionParams, DbConnection};
use crate::ingest::{LoadResult, load_dataset};

/// Arguments for an ingestion run
#[derive(Clone)]
pub struct IngestArgs {
    pub connection: ConnectionParams,
    /// Loaded in order, one after the other
    pub datasets: Vec<DatasetDescriptor>,
    pub quiet: bool,
}

/// Outcome of one dataset load
#[derive(Debug)]
pub struct DatasetOutcome {
    pub name: String,
    pub result: Result<LoadResult>,
}

/// Outcomes of every dataset, in load order
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub outcomes: Vec<DatasetOutcome>,
}

impl IngestSummary {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Connect, load every dataset, and close the connection
///
/// Only a connection failure is returned as `Err`; failed loads are reported
/// in the summary.
pub async fn run_ingest(args: IngestArgs) -> Result<IngestSummary> {
    let mut db = DbConnection::connect(&args.connection)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {}",
                args.connection.display_target()
            )
        })?;
    info!("Connected to {}", args.connection.display_target());

    let summary = run_ingest_with(&mut db, &args.datasets, args.quiet).await;

    if let Err(e) = db.close().await {
        warn!("Failed to close connection cleanly: {}", e);
    }

    Ok(summary)
}

/// Load `datasets` sequentially over an open connection
///
/// A failed load is logged and does not stop the remaining ones.
pub async fn run_ingest_with(
    db: &mut DbConnection,
    datasets: &[DatasetDescriptor],
    quiet: bool,
) -> IngestSummary {
    let mut summary = IngestSummary::default();

    for descriptor in datasets {
        let result = load_dataset(db, descriptor, quiet).await;
        match &result {
            Ok(_) => info!("{} ingested successfully", descriptor.name),
            Err(e) => error!("Failed to ingest {}: {:#}", descriptor.name, e),
        }
        summary.outcomes.push(DatasetOutcome {
            name: descriptor.name.clone(),
            result,
        });
    }

    summary
}
