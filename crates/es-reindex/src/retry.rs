//! Retry logic for resilient network operations.
//!
//! A copy of a large index can run for hours, and every request it makes must
//! eventually succeed. Operations report an [`Attempt`]: a value, a definitive
//! "does not exist" answer (never retried), or a failure worth retrying. The
//! policy deciding how often and how fast to retry is a [`RetryConfig`].

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Outcome of a single attempt of a retried operation.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The operation succeeded.
    Success(T),
    /// The target resource does not exist. Not an error, not retried.
    Absent,
    /// The operation failed and may be attempted again.
    Retry(Error),
}

impl<T> Attempt<T> {
    /// Maps the success value, keeping absence and failures as they are.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Attempt<U> {
        match self {
            Self::Success(value) => Attempt::Success(f(value)),
            Self::Absent => Attempt::Absent,
            Self::Retry(e) => Attempt::Retry(e),
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    /// `None` retries forever.
    pub max_retries: Option<u32>,
    /// Initial delay before the first retry.
    #[serde(with = "duration_ms", rename = "initial_delay_ms")]
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    #[serde(with = "duration_ms", rename = "max_delay_ms")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each retry).
    pub backoff_multiplier: f64,
    /// Whether to add jitter to prevent thundering herd.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Retries forever without waiting between attempts.
    pub fn immediate() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Creates a config with no retries (for testing or when retries are unwanted).
    pub fn no_retry() -> Self {
        Self {
            max_retries: Some(0),
            ..Self::immediate()
        }
    }

    /// Calculates the delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.add_jitter {
            // Add up to 25% jitter
            let jitter = capped_delay * 0.25 * rand_jitter();
            capped_delay + jitter
        } else {
            capped_delay
        };

        if final_delay.is_finite() {
            Duration::from_secs_f64(final_delay.max(0.0))
        } else {
            self.max_delay
        }
    }

    fn exhausted(&self, retries_done: u32) -> bool {
        self.max_retries.is_some_and(|max| retries_done >= max)
    }
}

/// Pseudo-random jitter in `[0, 1)` taken from the clock.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Executes an async operation with retry logic.
///
/// # Arguments
///
/// * `config` - Retry configuration
/// * `operation_name` - Name for logging purposes
/// * `operation` - The async operation to execute
///
/// # Returns
///
/// `Some(value)` on success, `None` as soon as an attempt reports
/// [`Attempt::Absent`].
///
/// # Errors
///
/// Returns non-transient failures immediately, and
/// [`Error::RetriesExhausted`] once a bounded policy runs out of attempts.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut retries: u32 = 0;

    loop {
        match operation().await {
            Attempt::Success(value) => {
                if retries > 0 {
                    debug!("{}: Succeeded after {} retries", operation_name, retries);
                }
                return Ok(Some(value));
            }
            Attempt::Absent => return Ok(None),
            Attempt::Retry(e) if !e.is_transient() => return Err(e),
            Attempt::Retry(e) => {
                warn!("Retrying {} ERROR: {} - {}", operation_name, e.class(), e);

                if config.exhausted(retries) {
                    return Err(Error::RetriesExhausted {
                        operation: operation_name.to_string(),
                        attempts: retries.saturating_add(1),
                        last: Box::new(e),
                    });
                }

                retries = retries.saturating_add(1);
                let delay = config.delay_for_attempt(retries);
                if !delay.is_zero() {
                    debug!("{}: Retry attempt {} after {:?}", operation_name, retries, delay);
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Serializes a [`Duration`] as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u128::from(u64::MAX)) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
