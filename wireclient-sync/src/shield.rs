//! Cancellation shielding for the cleanup `handle_request` must run even
//! if the calling task is dropped mid-request (removing the `PoolRequest`,
//! closing the stream, re-running assignment — see the concurrency
//! model's cancellation semantics).
//!
//! Rust has no structured-cancellation primitive to mask against, so the
//! shield is built the way the design notes suggest: the cleanup runs on
//! a detached task that keeps running even if the caller awaiting it is
//! dropped, and the caller joins it.

use std::future::Future;
use tracing::warn;

/// Run `fut` to completion on a detached task and return its output.
///
/// If the calling future is itself dropped (cancelled) while awaiting
/// this function, the spawned task is unaffected and keeps running the
/// cleanup to completion; only the *join* is abandoned.
pub async fn shielded<F>(fut: F) -> F::Output
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handle = tokio::spawn(fut);
    match handle.await {
        Ok(output) => output,
        Err(join_err) => {
            if join_err.is_panic() {
                std::panic::resume_unwind(join_err.into_panic());
            }
            // The task was cancelled by the runtime shutting down, not by
            // us (we never call `abort` on it) — nothing sensible to
            // return, so this only happens during process teardown.
            warn!("shielded cleanup task was cancelled before completion");
            unreachable!("shielded tasks are never aborted by this crate")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn cleanup_completes_even_if_caller_is_aborted() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();

        let caller = tokio::spawn(async move {
            shielded(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                ran2.store(true, Ordering::SeqCst);
            })
            .await;
        });

        // Give the caller task a moment to start (and spawn the shielded
        // cleanup task) before cancelling it.
        tokio::time::sleep(Duration::from_millis(5)).await;
        caller.abort();
        let _ = caller.await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn shielded_returns_the_future_output() {
        let value = shielded(async { 7 + 5 }).await;
        assert_eq!(value, 12);
    }
}
