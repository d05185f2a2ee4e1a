//! Bounded retry, per-call timeout and cancellation for collaborator calls.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::io::collaborator::CollaboratorError;

/// Retry and timeout settings shared by every collaborator call in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Retries after the first attempt, transient failures only.
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Bound on a single attempt.
    pub timeout: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("cancelled")]
    Cancelled,
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Failed(#[from] CollaboratorError),
}

impl CallError {
    pub fn is_transient(&self) -> bool {
        match self {
            CallError::Cancelled => false,
            CallError::TimedOut(_) => true,
            CallError::Failed(err) => err.transient,
        }
    }
}

/// Run `op` under `policy`, retrying transient failures and timeouts with
/// exponential backoff. Cancellation aborts the in-flight attempt or backoff
/// sleep and returns [`CallError::Cancelled`].
pub async fn call_with_retry<T, F, Fut>(
    policy: &CallPolicy,
    cancel: &CancellationToken,
    label: &str,
    op: F,
) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CollaboratorError>>,
{
    if cancel.is_cancelled() {
        return Err(CallError::Cancelled);
    }

    let timeout = policy.timeout;
    let mut op = op;
    let attempt = || {
        let call = op();
        async move {
            match tokio::time::timeout(timeout, call).await {
                Ok(result) => result.map_err(CallError::Failed),
                Err(_) => Err(CallError::TimedOut(timeout)),
            }
        }
    };

    let backoff = ExponentialBuilder::default()
        .with_min_delay(policy.min_delay)
        .with_max_delay(policy.max_delay)
        .with_max_times(policy.max_retries);

    let retried = attempt
        .retry(backoff)
        .when(CallError::is_transient)
        .notify(|err: &CallError, delay: Duration| {
            warn!(
                call = label,
                error = %err,
                "collaborator call failed, retrying after {:.2}s",
                delay.as_secs_f64()
            );
        });

    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!(call = label, "collaborator call cancelled");
            Err(CallError::Cancelled)
        }
        result = retried => result,
    }
}
