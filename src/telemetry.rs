/// Telemetry events emitted by the write path for progress tracking
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    /// Target table was dropped and recreated empty
    TableReplaced,
    /// One batch was appended and committed
    BatchWritten { rows: u64, duration_ms: u64 },
}

/// Statistics aggregated from telemetry events
#[derive(Debug, Default, Clone)]
pub struct ProgressStats {
    pub batches_written: usize,
    pub rows_written: u64,
    pub batch_durations_ms: Vec<u64>,
}

impl ProgressStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a telemetry event
    pub fn update(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::TableReplaced => {}
            TelemetryEvent::BatchWritten { rows, duration_ms } => {
                self.batches_written += 1;
                self.rows_written += rows;
                self.batch_durations_ms.push(*duration_ms);
            }
        }
    }

    /// Calculate percentile from batch durations
    pub fn percentile(&self, p: f64) -> Option<u64> {
        if self.batch_durations_ms.is_empty() {
            return None;
        }

        let mut sorted = self.batch_durations_ms.clone();
        sorted.sort_unstable();

        let index = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let index = index.saturating_sub(1).min(sorted.len() - 1);

        Some(sorted[index])
    }

    /// Get p50, p90, p99 percentiles
    pub fn get_percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        (
            self.percentile(50.0),
            self.percentile(90.0),
            self.percentile(99.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate_batches() {
        let mut stats = ProgressStats::new();
        stats.update(&TelemetryEvent::TableReplaced);
        for (rows, duration_ms) in [(100, 40), (100, 10), (100, 30), (100, 20), (7, 50)] {
            stats.update(&TelemetryEvent::BatchWritten { rows, duration_ms });
        }

        assert_eq!(stats.batches_written, 5);
        assert_eq!(stats.rows_written, 407);
        assert_eq!(stats.get_percentiles(), (Some(30), Some(50), Some(50)));
    }

    #[test]
    fn test_percentiles_without_batches() {
        let stats = ProgressStats::new();
        assert_eq!(stats.get_percentiles(), (None, None, None));
        assert_eq!(stats.percentile(0.0), None);
    }
}
