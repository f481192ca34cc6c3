//! Retry policies for polling the target while it starts up.

use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::shutdown::ShutdownSignal;

/// Decides how long to wait before the next attempt.
pub trait RetryStrategy: Send + Sync {
    /// Delay before retry number `attempt` (1-based), or `None` to give up.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Constant delay, optionally capped at a number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl FixedDelay {
    /// Retry forever with the given delay.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl RetryStrategy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt >= max => None,
            _ => Some(self.delay),
        }
    }
}

/// Poll `attempt` until it yields a value.
///
/// `Ok(None)` means "not ready yet" and errors are treated as transient; both
/// wait according to `strategy`. Returns [`Error::Cancelled`] once `shutdown`
/// is triggered and [`Error::RetriesExhausted`] when the strategy gives up.
pub fn poll_until<T, F>(
    what: &str,
    strategy: &dyn RetryStrategy,
    shutdown: &ShutdownSignal,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Result<Option<T>>,
{
    let mut attempts = 0u32;
    loop {
        shutdown.check()?;
        attempts += 1;

        match attempt() {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => debug!("{} not ready (attempt {}): {}", what, attempts, e),
        }

        let Some(delay) = strategy.next_delay(attempts) else {
            return Err(Error::RetriesExhausted {
                what: what.to_string(),
                attempts,
            });
        };
        shutdown.sleep(delay)?;
    }
}
