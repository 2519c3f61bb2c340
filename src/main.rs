use clap::Parser;
use taxi_ingest::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_GREEN_TABLE, DEFAULT_GREEN_URL, DEFAULT_PG_DATABASE,
    DEFAULT_PG_HOST, DEFAULT_PG_PASSWORD, DEFAULT_PG_PORT, DEFAULT_PG_USER, DEFAULT_ZONES_TABLE,
    DEFAULT_ZONES_URL,
};
use taxi_ingest::dataset::DatasetDescriptor;
use taxi_ingest::db::ConnectionParamsBuilder;
use taxi_ingest::runner::{IngestArgs, IngestSummary, run_ingest};

/// Ingest green taxi Parquet and taxi zones CSV data into PostgreSQL
#[derive(Parser, Clone)]
#[command(version)]
struct Args {
    /// PostgreSQL user
    #[arg(long, default_value = DEFAULT_PG_USER)]
    pg_user: String,

    /// PostgreSQL password
    #[arg(long, default_value = DEFAULT_PG_PASSWORD)]
    pg_pass: String,

    /// PostgreSQL host
    #[arg(long, default_value = DEFAULT_PG_HOST)]
    pg_host: String,

    /// PostgreSQL port
    #[arg(long, default_value_t = DEFAULT_PG_PORT)]
    pg_port: u16,

    /// PostgreSQL database name
    #[arg(long, default_value = DEFAULT_PG_DATABASE)]
    pg_db: String,

    /// URL (or local path) of the green taxi Parquet data
    #[arg(long, default_value = DEFAULT_GREEN_URL)]
    green_url: String,

    /// Target table name for green taxi data
    #[arg(long, default_value = DEFAULT_GREEN_TABLE)]
    green_table: String,

    /// Rows per insert batch for green taxi data
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    green_batch_size: usize,

    /// URL (or local path) of the taxi zones CSV data
    #[arg(long, default_value = DEFAULT_ZONES_URL)]
    zones_url: String,

    /// Target table name for taxi zones data
    #[arg(long, default_value = DEFAULT_ZONES_TABLE)]
    zones_table: String,

    /// Rows per chunk when reading the taxi zones CSV
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    zones_chunksize: usize,

    /// Quiet mode - no progress bars, warnings and the summary only
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing based on quiet mode
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let filter = if args.quiet {
        EnvFilter::new("taxi_ingest=warn,sqlx=warn")
    } else {
        EnvFilter::new("taxi_ingest=info,sqlx=warn")
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let connection = ConnectionParamsBuilder::default()
        .host(args.pg_host.as_str())
        .port(args.pg_port)
        .database(args.pg_db.as_str())
        .user(args.pg_user.as_str())
        .password(args.pg_pass.as_str())
        .build()?;

    let datasets = vec![
        DatasetDescriptor::green_taxi_trips(
            &args.green_url,
            &args.green_table,
            args.green_batch_size,
        ),
        DatasetDescriptor::taxi_zones(&args.zones_url, &args.zones_table, args.zones_chunksize),
    ];

    if !args.quiet {
        println!("Taxi Data Ingest");
        println!("================");
        println!("Database: {}", connection.display_target());
        for dataset in &datasets {
            println!(
                "{}: {} -> {}",
                dataset.name, dataset.source_uri, dataset.target_table
            );
        }
        println!();
    }

    let summary = run_ingest(IngestArgs {
        connection,
        datasets,
        quiet: args.quiet,
    })
    .await?;

    print_summary(&summary);

    if !summary.all_succeeded() {
        anyhow::bail!(
            "{} of {} datasets failed to load",
            summary.failed(),
            summary.outcomes.len()
        );
    }
    Ok(())
}

fn print_summary(summary: &IngestSummary) {
    println!();
    println!("Load Summary");
    println!("============");
    for outcome in &summary.outcomes {
        match &outcome.result {
            Ok(result) => {
                println!("{} ingested successfully.", outcome.name);
                println!("  Table: {}", result.table);
                println!("  Rows written: {}", result.rows_written);
                println!("  Batches: {}", result.batches_written);
                println!("  Duration: {:.2}s", result.duration.as_secs_f64());
                let secs = result.duration.as_secs_f64();
                if secs > 0.0 {
                    println!(
                        "  Throughput: {:.2} rows/sec",
                        result.rows_written as f64 / secs
                    );
                }
                if let (Some(p50), Some(p90), Some(p99)) = result.batch_percentiles {
                    println!("  Batch time: p50 {}ms, p90 {}ms, p99 {}ms", p50, p90, p99);
                }
            }
            Err(e) => {
                println!("{} failed.", outcome.name);
                println!("  Error: {:#}", e);
            }
        }
    }
}
