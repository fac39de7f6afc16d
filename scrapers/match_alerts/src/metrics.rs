use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PollMetrics {
    pub polls: u64,
    pub pages_fetched: u64,
    pub page_failures: u64,
    pub rows_skipped: u64,
    pub results_recorded: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub last_poll: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
}

/// Shared counters, updated by the poll loop and read by the status endpoint.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    metrics: Arc<Mutex<PollMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_poll(&self, pages_fetched: u64, rows_skipped: u64, results_recorded: u64) {
        let mut metrics = self.lock();
        metrics.polls += 1;
        metrics.pages_fetched += pages_fetched;
        metrics.rows_skipped += rows_skipped;
        metrics.results_recorded += results_recorded;
        metrics.last_poll = Some(Utc::now());
    }

    pub fn record_page_failure(&self, error: String) {
        let mut metrics = self.lock();
        metrics.page_failures += 1;
        metrics.last_error = Some(error);
        metrics.last_error_time = Some(Utc::now());
    }

    pub fn record_notification(&self, success: bool) {
        let mut metrics = self.lock();
        if success {
            metrics.notifications_sent += 1;
        } else {
            metrics.notifications_failed += 1;
        }
    }

    pub fn get_metrics(&self) -> PollMetrics {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PollMetrics> {
        // Counters stay usable even if a holder panicked.
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
