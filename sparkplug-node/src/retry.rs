//! Reconnect retry policy
//!
//! The node retries forever without delay unless configured otherwise:
//!
//! ```text
//! Backoff::None                      -> 0, 0, 0, ...
//! Backoff::Fixed(d)                  -> d, d, d, ...
//! Backoff::Exponential { initial, max } -> initial, 2*initial, 4*initial, ... capped at max
//! ```

use std::time::Duration;

use crate::error::{NodeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    #[default]
    None,
    Fixed(Duration),
    Exponential { initial: Duration, max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// `None` retries forever
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn forever() -> Self {
        Self::default()
    }

    /// Delay before retrying after the `failures`-th consecutive failure (1-based).
    pub fn delay(&self, failures: u32) -> Duration {
        match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => d,
            Backoff::Exponential { initial, max } => {
                let exp = failures.saturating_sub(1).min(31);
                initial.saturating_mul(1u32 << exp).min(max)
            }
        }
    }

    pub fn allows(&self, failures: u32) -> bool {
        self.max_attempts.map_or(true, |max| failures < max)
    }
}

/// Per-outage retry counter driven by a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct Retry {
    policy: RetryPolicy,
    failures: u32,
}

impl Retry {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, failures: 0 }
    }

    /// Records a failed attempt and returns how long to wait before the next
    /// one, or `ReconnectExhausted` once the policy gives up.
    pub fn next_delay(&mut self, error: &str) -> Result<Duration> {
        self.failures = self.failures.saturating_add(1);
        if !self.policy.allows(self.failures) {
            return Err(NodeError::ReconnectExhausted {
                attempts: self.failures,
                last_error: error.to_string(),
            });
        }
        Ok(self.policy.delay(self.failures))
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
