//! A one-shot event: set exactly once, any number of waiters observe it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Error returned by [`Event::wait`] when a timeout was given and elapsed
/// before the event was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut;

/// Fires once. A fresh `Event` must be constructed for each wait cycle —
/// a `PoolRequest` re-queued after `ConnectionNotAvailable` gets a brand
/// new one, matching the "set exactly once" invariant.
#[derive(Debug)]
pub struct Event {
    notify: Notify,
    is_set: AtomicBool,
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl Event {
    #[must_use]
    pub fn new() -> Self {
        Self { notify: Notify::new(), is_set: AtomicBool::new(false) }
    }

    /// Set the event. Idempotent, but callers should treat this as a
    /// one-shot signal (see the pool invariant on `connection_acquired`).
    pub fn set(&self) {
        self.is_set.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.is_set.load(Ordering::Acquire)
    }

    /// Wait for the event, optionally bounded by `timeout`.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<(), TimedOut> {
        if self.is_set() {
            return Ok(());
        }
        // Register interest before re-checking the flag, so a `set()` that
        // races in between the first check and now is not missed.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_set() {
            return Ok(());
        }
        match timeout {
            Some(d) => tokio::time::timeout(d, notified).await.map_err(|_| TimedOut),
            None => {
                notified.await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn wait_returns_immediately_if_already_set() {
        let event = Event::new();
        event.set();
        assert!(event.wait(Some(Duration::from_millis(10))).await.is_ok());
    }

    #[tokio::test]
    async fn wait_times_out_if_never_set() {
        let event = Event::new();
        assert_eq!(
            event.wait(Some(Duration::from_millis(20))).await,
            Err(TimedOut)
        );
    }

    #[tokio::test]
    async fn wait_wakes_up_when_set_concurrently() {
        let event = Arc::new(Event::new());
        let e2 = event.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            e2.set();
        });
        assert!(event.wait(Some(Duration::from_secs(5))).await.is_ok());
    }
}
