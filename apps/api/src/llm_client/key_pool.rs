//! Round-robin rotation over the configured model API keys.
//!
//! Each key tracks consecutive failures. A key at or above the error threshold
//! is skipped until a success resets it; when every key is over the threshold
//! all counters are cleared and rotation starts over. Counters are plain
//! atomics with relaxed ordering, which is enough for bookkeeping.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;
use tracing::warn;

struct ApiKey {
    secret: String,
    consecutive_errors: AtomicU32,
    requests: AtomicU64,
}

/// A key handed out for one request. Report the outcome back with its `index`.
pub struct KeyLease<'a> {
    pub index: usize,
    pub secret: &'a str,
}

/// Per-key usage counters, safe to expose (no secret material).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyStats {
    pub index: usize,
    pub requests: u64,
    pub consecutive_errors: u32,
}

pub struct KeyPool {
    keys: Vec<ApiKey>,
    cursor: AtomicUsize,
    error_threshold: u32,
}

impl KeyPool {
    pub fn new(secrets: Vec<String>, error_threshold: u32) -> Self {
        let keys = secrets
            .into_iter()
            .map(|secret| ApiKey {
                secret,
                consecutive_errors: AtomicU32::new(0),
                requests: AtomicU64::new(0),
            })
            .collect();

        Self {
            keys,
            cursor: AtomicUsize::new(0),
            error_threshold: error_threshold.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of keys currently below the error threshold.
    pub fn available(&self) -> usize {
        self.keys
            .iter()
            .filter(|k| k.consecutive_errors.load(Ordering::Relaxed) < self.error_threshold)
            .count()
    }

    /// Returns the next healthy key, or `None` if no keys are configured.
    pub fn next(&self) -> Option<KeyLease<'_>> {
        if self.is_empty() {
            return None;
        }
        let len = self.keys.len();

        for _ in 0..len {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
            if self.keys[index].consecutive_errors.load(Ordering::Relaxed) < self.error_threshold {
                return Some(self.lease(index));
            }
        }

        warn!("All {len} API keys reached the error threshold, resetting counters");
        for key in &self.keys {
            key.consecutive_errors.store(0, Ordering::Relaxed);
        }

        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
        Some(self.lease(index))
    }

    pub fn record_success(&self, index: usize) {
        if let Some(key) = self.keys.get(index) {
            key.consecutive_errors.store(0, Ordering::Relaxed);
        }
    }

    pub fn record_failure(&self, index: usize) {
        if let Some(key) = self.keys.get(index) {
            let errors = key.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
            if errors == self.error_threshold {
                warn!("API key #{index} disabled after {errors} consecutive errors");
            }
        }
    }

    pub fn stats(&self) -> Vec<KeyStats> {
        self.keys
            .iter()
            .enumerate()
            .map(|(index, key)| KeyStats {
                index,
                requests: key.requests.load(Ordering::Relaxed),
                consecutive_errors: key.consecutive_errors.load(Ordering::Relaxed),
            })
            .collect()
    }

    fn lease(&self, index: usize) -> KeyLease<'_> {
        let key = &self.keys[index];
        key.requests.fetch_add(1, Ordering::Relaxed);
        KeyLease {
            index,
            secret: &key.secret,
        }
    }
}
