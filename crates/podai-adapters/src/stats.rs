//! Send counters shared by every adapter for health reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Error rate at or above which an adapter reports itself unhealthy.
pub const UNHEALTHY_ERROR_RATE: f64 = 0.5;

#[derive(Debug, Default)]
pub(crate) struct AdapterStats {
    attempts: AtomicU64,
    failures: AtomicU64,
    last_latency_ms: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl AdapterStats {
    pub(crate) fn record_success(&self, latency_ms: u64) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.last_latency_ms.store(latency_ms, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, error: impl Into<String>) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.set_last_error(error);
    }

    pub(crate) fn set_last_error(&self, error: impl Into<String>) {
        let mut guard = match self.last_error.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(error.into());
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        match self.last_error.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn latency_ms(&self) -> u64 {
        self.last_latency_ms.load(Ordering::Relaxed)
    }

    /// Fraction of failed sends; `0.0` before the first attempt.
    pub(crate) fn error_rate(&self) -> f64 {
        let attempts = self.attempts.load(Ordering::Relaxed);
        if attempts == 0 {
            return 0.0;
        }
        self.failures.load(Ordering::Relaxed) as f64 / attempts as f64
    }
}
