// Runtime metrics module
//
// Lightweight counters for the shared HTTP client and the shutdown sequence

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Environment-wide counters
///
/// Uses atomic operations so any worker thread can record without locks.
/// The summary is logged once when shutdown completes.
#[derive(Debug)]
pub struct Metrics {
    /// Requests handed to the shared client
    pub requests_sent: AtomicU64,

    /// Requests that returned a transport error
    pub requests_failed: AtomicU64,

    /// Requests abandoned because the client was shut down
    pub requests_cancelled: AtomicU64,

    /// Teardown steps that reported an error
    pub teardown_failures: AtomicU64,

    /// Quit observers invoked
    pub quit_observers_run: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_sent: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            requests_cancelled: AtomicU64::new(0),
            teardown_failures: AtomicU64::new(0),
            quit_observers_run: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_request_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_cancelled(&self) {
        self.requests_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_teardown_failure(&self) {
        self.teardown_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quit_observer(&self) {
        self.quit_observers_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Environment Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "HTTP: {} sent, {} failed, {} cancelled",
            self.requests_sent.load(Ordering::Relaxed),
            self.requests_failed.load(Ordering::Relaxed),
            self.requests_cancelled.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Shutdown: {} quit observers, {} failed steps",
            self.quit_observers_run.load(Ordering::Relaxed),
            self.teardown_failures.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
