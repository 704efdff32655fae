// SPDX-License-Identifier: MIT

//! Exponential backoff at the client layer, per spec.md §4.2 and the design
//! note in §9: "Retry policy. Exponential backoff at the Panel-client layer,
//! not inside callers. Callers either get a final error or a success; they
//! do not re-try themselves."

use crate::error::PanelError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const MAX_ELAPSED: Duration = Duration::from_secs(30);
const MAX_INTERVAL: Duration = Duration::from_secs(8);
const INITIAL_INTERVAL: Duration = Duration::from_millis(250);

/// Retry `op` with exponential backoff until it succeeds, returns a
/// non-retryable error, or `MAX_ELAPSED` has passed since the first attempt.
///
/// Races every attempt and every backoff sleep against `cancel`, returning
/// [`PanelError::Cancelled`] the instant it fires rather than after the
/// in-flight attempt completes, so a caller cancelled mid-install or
/// mid-reconcile never blocks on a call it no longer needs.
pub(crate) async fn with_backoff<T, F, Fut>(cancel: &CancellationToken, mut op: F) -> Result<T, PanelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PanelError>>,
{
    let start = tokio::time::Instant::now();
    let mut interval = INITIAL_INTERVAL;

    loop {
        let attempt = tokio::select! {
            result = op() => result,
            _ = cancel.cancelled() => return Err(PanelError::Cancelled),
        };
        match attempt {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                if start.elapsed() >= MAX_ELAPSED {
                    return Err(err);
                }
                tracing::warn!(error = %err, retry_in_ms = interval.as_millis(), "retrying panel call");
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = cancel.cancelled() => return Err(PanelError::Cancelled),
                }
                interval = (interval * 2).min(MAX_INTERVAL);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result = with_backoff(&cancel, || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(PanelError::Transient { status: 503, body: String::new() })
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let attempts = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result: Result<(), PanelError> = with_backoff(&cancel, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(PanelError::Permanent { status: 404, body: String::new() })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_short_circuits_the_retry_loop() {
        let attempts = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), PanelError> = with_backoff(&cancel, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(PanelError::Transient { status: 503, body: String::new() })
        })
        .await;
        assert!(matches!(result, Err(PanelError::Cancelled)));
    }
}
