use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Per-loop counters shared between a running task and the session.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub processed: usize,
    /// Frames never seen by this loop: dropped acquisitions or overwritten slots.
    pub skipped: usize,
    pub errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_processed(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.processed += 1;
        }
    }

    pub fn record_skipped(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.skipped += count;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.errors += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let metrics = MetricsRecorder::new();
        metrics.record_processed();
        metrics.record_processed();
        metrics.record_skipped(3);
        metrics.record_error();
        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                processed: 2,
                skipped: 3,
                errors: 1
            }
        );
    }
}
