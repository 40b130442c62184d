// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-key exponential backoff for requeues after transient failures.
//!
//! The delay for the `n`-th consecutive failure of a key is
//! `initial_interval * 2^n`, capped at `max_interval`. There is no
//! jitter: delays for a key never decrease until the key is forgotten.
//!
//! | Failure | Delay (100ms base, 300s cap) |
//! |---------|------------------------------|
//! | 0       | 100ms                        |
//! | 1       | 200ms                        |
//! | 5       | 3.2s                         |
//! | 11      | 204.8s                       |
//! | 12+     | 300s                         |

use crate::constants::{DEFAULT_BACKOFF_BASE_MILLIS, DEFAULT_BACKOFF_MAX_SECS};
use std::time::Duration;

/// Exponential backoff schedule shared by every key of a queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemBackoff {
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl ItemBackoff {
    /// Create a schedule growing by a factor of two from `initial_interval`
    /// up to `max_interval`.
    #[must_use]
    pub fn new(initial_interval: Duration, max_interval: Duration) -> Self {
        Self {
            initial_interval,
            max_interval: max_interval.max(initial_interval),
        }
    }

    /// Delay before retrying a key that already failed `failures` times.
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        2u32.checked_pow(failures)
            .and_then(|factor| self.initial_interval.checked_mul(factor))
            .map_or(self.max_interval, |delay| delay.min(self.max_interval))
    }
}

impl Default for ItemBackoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_BACKOFF_BASE_MILLIS),
            Duration::from_secs(DEFAULT_BACKOFF_MAX_SECS),
        )
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod backoff_tests;
