//! Batch report aggregator
//!
//! Emits a summary every time the resolution history reaches a multiple of
//! the batch size. The only state is the history length last reported.

use serde::Serialize;
use tracing::info;

use crate::domain::ResolvedEntry;

/// Summary of the most recent batch of resolutions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub entries: Vec<ResolvedEntry>,
    pub wins: usize,
    pub total: usize,
    /// Percent, 0-100
    pub success_rate: f64,
}

impl BatchReport {
    pub fn from_entries(entries: &[ResolvedEntry]) -> Self {
        let total = entries.len();
        let wins = entries.iter().filter(|e| e.outcome.is_success()).count();
        let success_rate = if total > 0 {
            wins as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            entries: entries.to_vec(),
            wins,
            total,
            success_rate,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportAggregator {
    batch_size: usize,
    last_reported_len: usize,
}

impl ReportAggregator {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            last_reported_len: 0,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Report on the next completed batch of `history`, if there is one.
    ///
    /// Several resolutions can land between two calls; each crossed multiple
    /// still yields exactly one report, oldest first.
    pub fn maybe_report(&mut self, history: &[ResolvedEntry]) -> Option<BatchReport> {
        let next = (self.last_reported_len / self.batch_size + 1) * self.batch_size;
        if history.len() < next {
            return None;
        }
        self.last_reported_len = next;

        let report = BatchReport::from_entries(&history[next - self.batch_size..next]);
        info!(
            history_len = next,
            wins = report.wins,
            total = report.total,
            success_rate = format!("{:.1}", report.success_rate),
            "batch report"
        );
        Some(report)
    }

    /// Forget the last reported length (history was cleared)
    pub fn reset(&mut self) {
        self.last_reported_len = 0;
    }
}

impl Default for ReportAggregator {
    fn default() -> Self {
        Self::new(20)
    }
}
