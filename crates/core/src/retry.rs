//! Retry logic with quadratic backoff

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Unit the backoff delay is multiplied from
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit values.
    #[must_use]
    pub const fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts,
            backoff_unit,
        }
    }

    /// Set the maximum number of attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the backoff unit.
    #[must_use]
    pub const fn with_backoff_unit(mut self, backoff_unit: Duration) -> Self {
        self.backoff_unit = backoff_unit;
        self
    }

    /// Delay to wait after failed attempt `attempt` (1-indexed): `attempt² × unit`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(attempt.saturating_mul(attempt))
    }

    /// Attempts actually made; a budget of zero still runs once.
    pub(crate) fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Why [`with_retry`] gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryFailure<E> {
    /// Every attempt failed; carries the last error.
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        last_error: E,
    },
    /// The cancellation token fired between attempts.
    Cancelled {
        /// Attempts made before cancellation
        attempts: u32,
    },
}

impl<E> RetryFailure<E> {
    /// Attempts made before giving up.
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts } => *attempts,
        }
    }
}

/// Execute an async operation with retry logic.
///
/// The operation receives the 1-based attempt number. On success the value is
/// returned together with the number of attempts it took. Cancellation is
/// honoured while waiting between attempts; the first attempt always runs.
///
/// # Errors
///
/// Returns [`RetryFailure::Exhausted`] with the last error once the attempt
/// budget is spent, or [`RetryFailure::Cancelled`] if `cancel` fires first.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<(T, u32), RetryFailure<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.effective_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if attempt >= max_attempts => {
                return Err(RetryFailure::Exhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    "Operation failed (attempt {}/{}): {}. Retrying in {:?}",
                    attempt,
                    max_attempts,
                    e,
                    delay
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        tracing::debug!(attempt, "Retry aborted by cancellation");
                        return Err(RetryFailure::Cancelled { attempts: attempt });
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
