//! # Operation Timeout Guard
//!
//! Races an external call against a deadline. The call runs as a detached
//! task: when the deadline wins the caller gets [`WalletError::Timeout`] and
//! the task keeps running until it settles on its own. Its result is dropped.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

use crate::domain::WalletError;

/// Run `operation` with a `budget`, labelled for errors and logs.
///
/// Must be called from inside a tokio runtime.
pub async fn guard<T, F>(label: &str, budget: Duration, operation: F) -> Result<T, WalletError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, WalletError>> + Send + 'static,
{
    let handle = tokio::spawn(operation);

    match timeout(budget, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(WalletError::Internal(format!(
            "{label} task failed: {join_error}"
        ))),
        Err(_) => {
            let timeout_ms = budget.as_millis() as u64;
            warn!(
                label,
                timeout_ms, "[pw-wallet] Call exceeded its budget; late result will be discarded"
            );
            Err(WalletError::Timeout {
                label: label.to_string(),
                timeout_ms,
            })
        }
    }
}
