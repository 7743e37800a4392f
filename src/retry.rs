use std::time::Duration;

use crate::TransferError;

/// Retries per chunk when none is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Bound on how often a failed operation is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first; an operation runs at most `max_retries + 1` times.
    pub max_retries: u32,
    /// Pause between attempts. Zero retries immediately.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Duration::ZERO,
        }
    }
}

/// Result of an operation run under a [RetryPolicy].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    /// Number of times the operation ran, at least 1.
    pub attempts: u32,
    pub result: Result<T, TransferError>,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run `op` until it succeeds, fails fatally, or has been retried `max_retries` times.
    ///
    /// `op` receives the 1-based attempt number.
    /// `on_retry` is called with each failure that will be retried.
    pub fn run<T>(
        &self,
        mut op: impl FnMut(u32) -> Result<T, TransferError>,
        mut on_retry: impl FnMut(u32, &TransferError),
    ) -> Attempted<T> {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(v) => {
                    return Attempted {
                        attempts: attempt,
                        result: Ok(v),
                    };
                }
                Err(e) if e.is_retryable() && attempt <= self.max_retries => {
                    on_retry(attempt, &e);
                    if !self.backoff.is_zero() {
                        std::thread::sleep(self.backoff);
                    }
                    attempt += 1;
                }
                Err(e) => {
                    return Attempted {
                        attempts: attempt,
                        result: Err(e),
                    };
                }
            }
        }
    }
}
