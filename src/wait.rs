//! Fixed-interval waiting with optional timeout and cancellation support.
//!
//! Provides a small abstraction for polling a remote condition (e.g. an
//! ingress revocation finishing) at a fixed interval until it holds.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for fixed-interval condition polling.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Delay between checks
    pub interval: Duration,
    /// Maximum total time to wait; `None` waits until the condition holds
    pub timeout: Option<Duration>,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: None,
        }
    }
}

impl WaitConfig {
    /// Create a WaitConfig with the default interval and the given timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Default::default()
        }
    }
}

/// Wait for a condition to hold, polling at a fixed interval.
///
/// # Arguments
/// * `config` - Wait configuration
/// * `cancel` - Optional cancellation token
/// * `check` - Async function that returns `Ok(true)` when done, `Ok(false)` to keep polling
/// * `what` - Description of the awaited condition, for logging and errors
///
/// # Returns
/// * `Ok(())` - Condition holds
/// * `Err` - Timeout, cancelled, or check returned an error
pub async fn wait_for_condition<F, Fut>(
    config: &WaitConfig,
    cancel: Option<&CancellationToken>,
    check: F,
    what: &str,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = std::time::Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        // Check cancellation before each attempt
        if let Some(token) = cancel {
            if token.is_cancelled() {
                anyhow::bail!("Wait for {} cancelled", what);
            }
        }

        // Check timeout
        if let Some(timeout) = config.timeout {
            if start.elapsed() >= timeout {
                anyhow::bail!(
                    "Timeout waiting for {} after {:?} ({} attempts)",
                    what,
                    timeout,
                    attempts
                );
            }
        }

        match check().await {
            Ok(true) => {
                debug!(condition = %what, attempts, "Condition holds");
                return Ok(());
            }
            Ok(false) => {
                debug!(
                    condition = %what,
                    attempt = attempts,
                    delay_ms = config.interval.as_millis(),
                    "Not done yet, polling again"
                );

                // Sleep with cancellation support
                tokio::select! {
                    _ = tokio::time::sleep(config.interval) => {}
                    _ = async {
                        if let Some(token) = cancel {
                            token.cancelled().await
                        } else {
                            std::future::pending::<()>().await
                        }
                    } => {
                        anyhow::bail!("Wait for {} cancelled", what);
                    }
                }
            }
            Err(e) => {
                warn!(condition = %what, error = ?e, "Condition check failed");
                return Err(e);
            }
        }
    }
}
