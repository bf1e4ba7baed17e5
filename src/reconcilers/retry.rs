// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Requeue policy with exponential backoff for failed reconciles.
//!
//! Reconcilers never retry in a loop themselves. A failed reconcile returns an
//! error, and the controller's error policy asks this module how long to wait
//! before the key is processed again.
//!
//! # Requeue Schedule
//!
//! Attempts are counted per reconcile key and reset when the key reconciles
//! successfully. The delay before attempt `n` is `1s * 2^n` capped at 5 minutes,
//! with ±10% jitter:
//!
//! 1. 1s
//! 2. 2s
//! 3. 4s
//! 4. 8s
//! 5. ...
//! 6. 256s
//! 7. 300s (capped), and every attempt after

use crate::constants::{REQUEUE_BASE_DELAY_SECS, REQUEUE_MAX_DELAY_SECS};
use crate::errors::ErrorKind;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Highest exponent worth computing; `2^9` seconds is already past the cap.
const MAX_EXPONENT: u32 = 9;

/// Un-jittered delay before retry number `attempt` (0-based).
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64 << attempt.min(MAX_EXPONENT);
    Duration::from_secs((REQUEUE_BASE_DELAY_SECS * factor).min(REQUEUE_MAX_DELAY_SECS))
}

/// Apply randomization (jitter) to an interval.
fn apply_jitter(interval: Duration) -> Duration {
    let secs = interval.as_secs_f64();
    if secs == 0.0 {
        return interval;
    }
    let delta = secs * RANDOMIZATION_FACTOR;
    let jittered = rand::rng().random_range((secs - delta)..=(secs + delta));
    Duration::from_secs_f64(jittered.max(0.0))
}

/// How long to wait before reconciling a key again after an error of `kind`,
/// or `None` when the key must not be requeued.
///
/// | Kind | Decision |
/// |------|----------|
/// | `Conflict` | immediately |
/// | `TransientCloud`, `Ambiguous`, `NotFound` | exponential backoff |
/// | `NotReady` | wait for the next watch event |
/// | `Terminal`, `Fatal`, `Cancelled` | never |
#[must_use]
pub fn requeue_after(kind: ErrorKind, attempt: u32) -> Option<Duration> {
    match kind {
        ErrorKind::Conflict => Some(Duration::ZERO),
        ErrorKind::TransientCloud | ErrorKind::Ambiguous | ErrorKind::NotFound => {
            Some(apply_jitter(backoff_delay(attempt)))
        }
        ErrorKind::NotReady | ErrorKind::Terminal | ErrorKind::Fatal | ErrorKind::Cancelled => {
            None
        }
    }
}

/// A key that has not failed for this long is forgotten. A key that is still
/// backing off fails at least once per [`REQUEUE_MAX_DELAY_SECS`], so only
/// keys whose object was deleted mid-backoff age out.
const STALE_AFTER: Duration = Duration::from_secs(REQUEUE_MAX_DELAY_SECS * 2);

/// Per-key attempt counters.
#[derive(Debug, Default)]
pub struct RequeueTracker {
    attempts: Mutex<HashMap<String, (u32, Instant)>>,
}

impl RequeueTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the attempt number for `key` and count one more failure.
    pub fn next_attempt(&self, key: &str) -> u32 {
        self.next_attempt_at(key, Instant::now())
    }

    /// [`Self::next_attempt`] at a given instant. Entries idle for longer
    /// than [`STALE_AFTER`] are dropped first.
    pub(crate) fn next_attempt_at(&self, key: &str, now: Instant) -> u32 {
        let Ok(mut attempts) = self.attempts.lock() else {
            return 0;
        };
        attempts.retain(|_, (_, last)| now.saturating_duration_since(*last) <= STALE_AFTER);
        let (counter, last) = attempts.entry(key.to_string()).or_insert((0, now));
        let current = *counter;
        *counter = counter.saturating_add(1);
        *last = now;
        current
    }

    /// Forget the failure history of `key` after a successful reconcile.
    pub fn reset(&self, key: &str) {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.remove(key);
        }
    }

    /// Number of keys currently backing off.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attempts.lock().map(|a| a.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
