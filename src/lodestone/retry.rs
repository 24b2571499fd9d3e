// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Retry classification and backoff for upstream responses
//!
//! The Lodestone rate limits aggressively and occasionally answers with
//! gateway errors. Those statuses are retried with linear, jittered backoff
//! until a fixed deadline measured from the first attempt has passed.

use rand::Rng;
use std::time::Duration;

/// Overall budget for one logical fetch, measured from the first attempt
pub const RETRY_DEADLINE: Duration = Duration::from_secs(20);

/// Statuses worth retrying
pub const RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Severity multiplier applied to the jittered wait, or `None` when the
/// status is not retryable
pub fn severity_multiplier(status: u16) -> Option<u32> {
    match status {
        429 => Some(1),
        502 => Some(3),
        503 | 504 => Some(2),
        _ => None,
    }
}

pub fn is_retryable(status: u16) -> bool {
    severity_multiplier(status).is_some()
}

/// Wait before the next attempt
///
/// `multiplier(status) * uniform(1..=attempt + 2)` seconds, where `attempt`
/// starts at 1 for the first try. Returns `None` for non-retryable statuses.
pub fn backoff<R: Rng + ?Sized>(status: u16, attempt: u32, rng: &mut R) -> Option<Duration> {
    let multiplier = severity_multiplier(status)?;
    let jitter = rng.gen_range(1..=attempt.saturating_add(2));
    Some(Duration::from_secs(u64::from(multiplier) * u64::from(jitter)))
}

/// State of one logical fetch across its attempts
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    /// 1-based attempt counter
    pub attempt: u32,
    /// Time since the first attempt was issued
    pub elapsed: Duration,
    /// Status of the most recent response
    pub last_status: Option<u16>,
}

impl FetchAttempt {
    pub fn first() -> Self {
        Self {
            attempt: 1,
            elapsed: Duration::ZERO,
            last_status: None,
        }
    }

    /// Whether the status just observed should be retried
    pub fn should_retry(&self) -> bool {
        match self.last_status {
            Some(status) => is_retryable(status) && self.elapsed < RETRY_DEADLINE,
            None => false,
        }
    }
}
