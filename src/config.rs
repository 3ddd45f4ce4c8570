// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection behavior configuration.
//!
//! Backoff and retry policy are injected at construction rather than read
//! from module-level constants, so embedders can bound worst-case command
//! latency per device.

use std::time::Duration;

/// Attempt budget for the command dispatcher's retry loop.
///
/// The protocol has no end-to-end command timeout, so with
/// [`RetryBudget::Unbounded`] a `send` during an outage blocks until the
/// device comes back. Callers that need bounded latency should configure
/// [`RetryBudget::Limited`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryBudget {
    /// Retry until the command succeeds or a non-retryable error occurs.
    #[default]
    Unbounded,
    /// Give up and surface the last error after this many attempts.
    Limited(u32),
}

impl RetryBudget {
    /// Returns `true` if another attempt is allowed after `attempts` tries.
    pub(crate) fn allows_retry(self, attempts: u32) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Limited(max) => attempts < max,
        }
    }
}

/// Tunable connection behavior for a device.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use allpowers_ble::{ConnectionConfig, RetryBudget};
///
/// let config = ConnectionConfig::default()
///     .with_backoff(Duration::from_millis(500))
///     .with_retry_budget(RetryBudget::Limited(5));
/// assert_eq!(config.backoff, Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Delay before retrying after a transient failure, and between
    /// reconnect attempts while the device is unreachable.
    pub backoff: Duration,
    /// Attempt budget for outbound command retries.
    pub retry_budget: RetryBudget,
}

impl ConnectionConfig {
    /// Default backoff between retries and reconnect attempts.
    pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

    /// Sets the backoff interval.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the command retry budget.
    #[must_use]
    pub fn with_retry_budget(mut self, budget: RetryBudget) -> Self {
        self.retry_budget = budget;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            backoff: Self::DEFAULT_BACKOFF,
            retry_budget: RetryBudget::Unbounded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.backoff, Duration::from_millis(250));
        assert_eq!(config.retry_budget, RetryBudget::Unbounded);
    }

    #[test]
    fn unbounded_budget_always_allows() {
        assert!(RetryBudget::Unbounded.allows_retry(0));
        assert!(RetryBudget::Unbounded.allows_retry(u32::MAX));
    }

    #[test]
    fn limited_budget_exhausts() {
        let budget = RetryBudget::Limited(3);
        assert!(budget.allows_retry(1));
        assert!(budget.allows_retry(2));
        assert!(!budget.allows_retry(3));
    }
}
