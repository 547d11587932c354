//! A bounded semaphore whose bound can be adjusted at runtime — used for
//! the HTTP/2 per-connection stream-concurrency limit, which the remote
//! peer can lower or raise via a `SETTINGS` update. Per the concurrency
//! model, such an adjustment only affects *future* acquisitions; permits
//! already granted are unaffected.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// A semaphore with a live, adjustable bound.
#[derive(Debug)]
pub struct BoundedSemaphore {
    inner: Arc<Semaphore>,
    bound: AtomicUsize,
}

impl BoundedSemaphore {
    #[must_use]
    pub fn new(bound: usize) -> Self {
        Self { inner: Arc::new(Semaphore::new(bound)), bound: AtomicUsize::new(bound) }
    }

    #[must_use]
    pub fn bound(&self) -> usize {
        self.bound.load(Ordering::Acquire)
    }

    /// Acquire one permit, waiting if none are currently available.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        // The semaphore is never closed in this crate's usage, so a
        // closed error here would indicate a logic bug upstream.
        #[allow(clippy::expect_used)]
        self.inner.acquire().await.expect("semaphore unexpectedly closed")
    }

    /// Like [`Self::acquire`], but the permit doesn't borrow from `self` —
    /// for holding a permit across an owned response body's lifetime
    /// rather than just the call that acquired it.
    pub async fn acquire_owned(&self) -> tokio::sync::OwnedSemaphorePermit {
        #[allow(clippy::expect_used)]
        self.inner.clone().acquire_owned().await.expect("semaphore unexpectedly closed")
    }

    /// Raise or lower the effective bound. Raising adds permits
    /// immediately; lowering spawns a background task that acquires and
    /// permanently discards the surplus permits as they're returned,
    /// rather than revoking ones already checked out.
    pub fn adjust_bound(&self, new_bound: usize) {
        let old_bound = self.bound.swap(new_bound, Ordering::AcqRel);
        if new_bound > old_bound {
            self.inner.add_permits(new_bound - old_bound);
        } else if new_bound < old_bound {
            let delta = old_bound - new_bound;
            let inner = self.inner.clone();
            tokio::spawn(async move {
                if let Ok(surplus) = inner.acquire_many_owned(delta as u32).await {
                    surplus.forget();
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_respects_initial_bound() {
        let sem = BoundedSemaphore::new(1);
        let _p1 = sem.acquire().await;
        assert_eq!(sem.inner.available_permits(), 0);
    }

    #[tokio::test]
    async fn raising_bound_adds_permits() {
        let sem = BoundedSemaphore::new(1);
        sem.adjust_bound(3);
        assert_eq!(sem.bound(), 3);
        assert_eq!(sem.inner.available_permits(), 3);
    }

    #[tokio::test]
    async fn lowering_bound_eventually_shrinks_capacity() {
        let sem = BoundedSemaphore::new(4);
        sem.adjust_bound(1);
        // Give the background shrink task a chance to run.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(sem.inner.available_permits(), 1);
    }
}
