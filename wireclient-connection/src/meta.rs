//! Connection-level bookkeeping shared by both engines: the derived
//! predicates the pool scheduler reads (`is_available`, `is_idle`,
//! `has_expired`, `is_closed`) live here, guarded by a plain sync mutex
//! since nothing here is ever held across an `.await`.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Not yet connected; the transport opens lazily on first use.
    Pending,
    Active,
    Idle,
    Closed,
}

#[derive(Debug)]
struct Inner {
    status: Status,
    request_count: u64,
    expire_at: Option<Instant>,
    /// HTTP/2 only: the connection has received a GOAWAY and must not be
    /// handed any more new streams once in-flight ones finish.
    goaway: bool,
    /// HTTP/2 only: the client-side stream id space is exhausted.
    stream_ids_exhausted: bool,
}

/// Shared, lock-guarded connection metadata.
#[derive(Debug)]
pub struct ConnMeta {
    inner: Mutex<Inner>,
}

impl Default for ConnMeta {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnMeta {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                status: Status::Pending,
                request_count: 0,
                expire_at: None,
                goaway: false,
                stream_ids_exhausted: false,
            }),
        }
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.inner.lock().status
    }

    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.inner.lock().request_count
    }

    pub fn mark_active(&self) {
        let mut guard = self.inner.lock();
        guard.status = Status::Active;
        guard.request_count += 1;
        guard.expire_at = None;
    }

    /// Enter IDLE, arming the keep-alive expiry clock. `None` means never
    /// expire by time; `Some(Duration::ZERO)` expires immediately, which
    /// the pool observes on its next sweep as `has_expired() == true`.
    pub fn mark_idle(&self, keepalive_expiry: Option<Duration>) {
        let mut guard = self.inner.lock();
        if guard.status == Status::Closed {
            return;
        }
        guard.status = Status::Idle;
        guard.expire_at = keepalive_expiry.map(|d| Instant::now() + d);
    }

    pub fn mark_closed(&self) {
        let mut guard = self.inner.lock();
        guard.status = Status::Closed;
        guard.expire_at = None;
    }

    pub fn mark_goaway(&self) {
        self.inner.lock().goaway = true;
    }

    pub fn mark_stream_ids_exhausted(&self) {
        self.inner.lock().stream_ids_exhausted = true;
    }

    #[must_use]
    pub fn goaway_received(&self) -> bool {
        self.inner.lock().goaway
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().status == Status::Closed
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.inner.lock().status == Status::Idle
    }

    #[must_use]
    pub fn has_expired(&self) -> bool {
        let guard = self.inner.lock();
        guard.status == Status::Idle && guard.expire_at.is_some_and(|at| Instant::now() >= at)
    }

    /// HTTP/1.1 is available only while IDLE. HTTP/2 is available
    /// whenever it isn't closed or exhausted, even mid-request.
    #[must_use]
    pub fn is_available_http2(&self) -> bool {
        let guard = self.inner.lock();
        guard.status != Status::Closed && !guard.stream_ids_exhausted && !guard.goaway
    }

    #[must_use]
    pub fn is_available_http1(&self) -> bool {
        self.is_idle()
    }
}
