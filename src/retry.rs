//! Retry logic with a fixed inter-attempt delay
//!
//! Artifact transfers are retried a fixed number of times with a constant delay
//! between attempts. Jitter can be switched on to spread out retries when many
//! slots hit the same host.
//!
//! # Example
//!
//! ```no_run
//! use modpack_dl::retry::{IsRetryable, download_with_retry};
//! use modpack_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! download_with_retry(&config, || async {
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (connection refused, reset, 5xx, 404 from a flaky mirror)
/// return `true`. Local failures (disk full, permission denied, bad file name)
/// return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Builder errors are programming errors, everything else on the wire is transient
            Error::Network(e) => !e.is_builder(),
            // Any non-success status is retried
            Error::HttpStatus { .. } => true,
            // Local filesystem failures never heal by retrying
            Error::Filesystem { .. } | Error::Io(_) => false,
            Error::InvalidFileName { .. } => false,
            Error::Config { .. } => false,
            Error::Manifest(_) => false,
            Error::UnknownArtifact(_) => false,
            Error::Serialization(_) => false,
            Error::Other(_) => false,
        }
    }
}

/// Execute an async operation, retrying transient failures
///
/// The operation is attempted at most `config.max_attempts` times. Between
/// attempts the task sleeps for `config.delay` (optionally jittered). A
/// non-retryable error is returned immediately.
///
/// # Example
///
/// ```no_run
/// use modpack_dl::retry::download_with_retry;
/// use modpack_dl::config::RetryConfig;
/// use modpack_dl::error::Error;
///
/// # async fn example() -> Result<(), Error> {
/// let config = RetryConfig::default();
/// let body = download_with_retry(&config, || async {
///     Ok::<String, Error>("jar bytes".to_string())
/// }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn download_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = if config.jitter {
                    add_jitter(config.delay)
                } else {
                    config.delay
                };

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(
                        error = %e,
                        "Operation failed with non-retryable error"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The result is uniformly distributed between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
