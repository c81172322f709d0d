//! Cancellable polling helpers
//!
//! All waiting in the harness goes through these two functions. The predicate
//! is re-checked every `poll_interval`, bounded by a timeout, and the
//! cancellation token is honoured at every tick.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::DeviceError;

/// Why a wait ended early
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WaitError {
    #[error("{action} did not complete within {timeout:?}")]
    TimedOut { action: String, timeout: Duration },

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Device(#[from] DeviceError),
}

/// Sleep for `duration` unless cancelled first
pub async fn wait_for(duration: Duration, cancel: &CancellationToken) -> Result<(), WaitError> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(WaitError::Cancelled),
    }
}

/// Poll `busy` until it returns false.
///
/// Returns the elapsed time on success. A device error from the predicate
/// ends the wait and is returned to the caller for classification.
pub async fn wait_while<F, Fut>(
    action: &str,
    mut busy: F,
    poll_interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Duration, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, DeviceError>>,
{
    let start = Instant::now();
    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        if !busy().await? {
            tracing::debug!("{} completed after {:?}", action, start.elapsed());
            return Ok(start.elapsed());
        }
        if start.elapsed() >= timeout {
            tracing::debug!("{} timed out after {:?}", action, timeout);
            return Err(WaitError::TimedOut {
                action: action.to_string(),
                timeout,
            });
        }
        wait_for(poll_interval, cancel).await?;
    }
}
