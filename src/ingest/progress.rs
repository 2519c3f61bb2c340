use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::telemetry::{ProgressStats, TelemetryEvent};

/// Per-dataset progress: a batch bar on the terminal plus timing statistics
pub struct LoadProgress {
    bar: ProgressBar,
    stats: ProgressStats,
}

impl LoadProgress {
    /// `total_batches` is known for in-memory datasets and unknown for streamed
    /// delimited sources. With `quiet` the bar is hidden but stats still count.
    pub fn new(label: &str, total_batches: Option<u64>, quiet: bool) -> Result<Self> {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            match total_batches {
                Some(total) => {
                    let bar = ProgressBar::new(total);
                    bar.set_style(
                        ProgressStyle::default_bar()
                            .template(
                                "[{elapsed_precise}] {prefix}: [{bar:30.cyan/blue}] {pos}/{len} batches | {msg}",
                            )
                            .context("Invalid progress bar template")?
                            .progress_chars("=>-"),
                    );
                    bar
                }
                None => {
                    let bar = ProgressBar::no_length();
                    bar.set_style(
                        ProgressStyle::default_spinner()
                            .template("[{elapsed_precise}] {prefix}: {spinner} {pos} batches | {msg}")
                            .context("Invalid progress bar template")?,
                    );
                    bar
                }
            }
        };
        bar.set_prefix(label.to_string());

        Ok(Self {
            bar,
            stats: ProgressStats::new(),
        })
    }

    pub fn record(&mut self, event: TelemetryEvent) {
        self.stats.update(&event);

        match event {
            TelemetryEvent::TableReplaced => {
                self.bar.set_message("table recreated");
                tracing::debug!("{}: table recreated", self.bar.prefix());
            }
            TelemetryEvent::BatchWritten { rows, duration_ms } => {
                self.bar.inc(1);
                self.bar.set_message(self.summary_message());
                tracing::debug!(
                    "{}: batch {} committed, {} rows in {}ms",
                    self.bar.prefix(),
                    self.stats.batches_written,
                    rows,
                    duration_ms
                );
            }
        }
    }

    pub fn stats(&self) -> &ProgressStats {
        &self.stats
    }

    pub fn finish(&self) {
        self.bar.finish_with_message(self.summary_message());
    }

    /// Leave the bar where it stopped, without marking it complete
    pub fn abandon(&self) {
        self.bar.abandon();
    }

    fn summary_message(&self) -> String {
        match self.stats.get_percentiles() {
            (Some(p50), Some(p90), Some(p99)) => format!(
                "{} rows | p50: {}ms, p90: {}ms, p99: {}ms",
                self.stats.rows_written, p50, p90, p99
            ),
            _ => format!("{} rows", self.stats.rows_written),
        }
    }
}
