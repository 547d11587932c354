//! The pool-wide assignment algorithm: a cleanup pass followed by a FIFO
//! matching pass, both run under one lock with no network I/O; eviction
//! candidates are collected and closed by the caller after the lock is
//! released.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wireclient_connection::PoolConnection;
use wireclient_sync::{Event, TimedOut};
use wireclient_types::Origin;

/// Builds a brand-new connection for an origin the current connection set
/// can't satisfy. `Pool`, `HttpProxy`, and `SocksProxy` each supply one.
pub trait ConnectionFactory: Send + Sync {
    fn create(&self, origin: &Origin) -> Arc<dyn PoolConnection>;
}

/// One request waiting for, or already holding, a connection assignment.
/// A fresh `connection_acquired` event is installed whenever the
/// assignment is cleared, so a request bounced back by
/// `ConnectionNotAvailable` can't observe a stale `set()` from its
/// previous, now-discarded assignment.
pub struct PoolRequest {
    id: u64,
    origin: Origin,
    assigned: Mutex<Option<Arc<dyn PoolConnection>>>,
    connection_acquired: Mutex<Arc<Event>>,
}

impl PoolRequest {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    #[must_use]
    pub fn assignment(&self) -> Option<Arc<dyn PoolConnection>> {
        self.assigned.lock().clone()
    }

    /// Clear this request's assignment (e.g. after `ConnectionNotAvailable`)
    /// so the next `run_assignment` pass reconsiders it from scratch.
    pub fn clear_assignment(&self) {
        *self.assigned.lock() = None;
        *self.connection_acquired.lock() = Arc::new(Event::new());
    }

    /// Wait for this request to be assigned a connection, bounded by
    /// `timeout`.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<(), TimedOut> {
        let event = self.connection_acquired.lock().clone();
        event.wait(timeout).await
    }
}

struct State {
    connections: Vec<Arc<dyn PoolConnection>>,
    requests: Vec<Arc<PoolRequest>>,
}

/// Owns the connection set and request queue for one `Pool`/`HttpProxy`/
/// `SocksProxy` instance.
pub struct Scheduler {
    factory: Arc<dyn ConnectionFactory>,
    max_connections: usize,
    max_keepalive_connections: usize,
    state: Mutex<State>,
    next_id: AtomicU64,
}

impl Scheduler {
    #[must_use]
    pub fn new(factory: Arc<dyn ConnectionFactory>, max_connections: usize, max_keepalive_connections: usize) -> Self {
        Self {
            factory,
            max_connections,
            max_keepalive_connections,
            state: Mutex::new(State { connections: Vec::new(), requests: Vec::new() }),
            next_id: AtomicU64::new(0),
        }
    }

    /// Append a new `PoolRequest` to the FIFO queue.
    #[must_use]
    pub fn enqueue(&self, origin: Origin) -> Arc<PoolRequest> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Arc::new(PoolRequest {
            id,
            origin,
            assigned: Mutex::new(None),
            connection_acquired: Mutex::new(Arc::new(Event::new())),
        });
        self.state.lock().requests.push(Arc::clone(&request));
        request
    }

    /// Remove a request from the queue — called once it succeeds, times
    /// out, or fails fatally.
    pub fn remove_request(&self, request: &PoolRequest) {
        self.state.lock().requests.retain(|r| r.id != request.id);
    }

    /// Run cleanup then matching under the pool lock. Returns connections
    /// that must be closed by the caller *outside* the lock, and fires
    /// `connection_acquired` for every request newly assigned this pass.
    pub fn run_assignment(&self) -> Vec<Arc<dyn PoolConnection>> {
        let mut to_close = Vec::new();
        let mut newly_assigned: Vec<Arc<PoolRequest>> = Vec::new();

        {
            let mut state = self.state.lock();

            // Cleanup phase.
            let mut idle_count = state.connections.iter().filter(|c| c.is_idle()).count();
            let mut kept = Vec::with_capacity(state.connections.len());
            for conn in std::mem::take(&mut state.connections) {
                if conn.is_closed() {
                    continue;
                }
                if conn.has_expired() {
                    if conn.is_idle() {
                        idle_count -= 1;
                    }
                    to_close.push(conn);
                    continue;
                }
                if conn.is_idle() && idle_count > self.max_keepalive_connections {
                    idle_count -= 1;
                    to_close.push(conn);
                    continue;
                }
                kept.push(conn);
            }
            state.connections = kept;

            // Matching phase, FIFO order over unassigned requests.
            let requests = state.requests.clone();
            for request in requests {
                if request.assignment().is_some() {
                    continue;
                }

                if let Some(existing) = state
                    .connections
                    .iter()
                    .find(|c| c.can_handle_request(request.origin()) && c.is_available())
                    .cloned()
                {
                    *request.assigned.lock() = Some(existing);
                    newly_assigned.push(request);
                    continue;
                }

                if state.connections.len() < self.max_connections {
                    let fresh = self.factory.create(request.origin());
                    state.connections.push(Arc::clone(&fresh));
                    *request.assigned.lock() = Some(fresh);
                    newly_assigned.push(request);
                    continue;
                }

                if let Some(idle_idx) = state.connections.iter().position(|c| c.is_idle()) {
                    let evicted = state.connections.remove(idle_idx);
                    to_close.push(evicted);
                    let fresh = self.factory.create(request.origin());
                    state.connections.push(Arc::clone(&fresh));
                    *request.assigned.lock() = Some(fresh);
                    newly_assigned.push(request);
                    continue;
                }

                // Capacity exhausted and nothing idle to evict — leave
                // unassigned; the request keeps waiting on its event.
            }
        }

        for request in newly_assigned {
            request.connection_acquired.lock().set();
        }
        to_close
    }

    /// Snapshot of the current connection set, for `Pool::connections()`.
    #[must_use]
    pub fn connections(&self) -> Vec<Arc<dyn PoolConnection>> {
        self.state.lock().connections.clone()
    }

    /// Drop and close every connection, leaving the request queue intact
    /// (in-flight requests observe their next read failing, per the
    /// close-while-in-flight failure rule).
    pub async fn close_all(&self) {
        let conns = std::mem::take(&mut self.state.lock().connections);
        for conn in conns {
            conn.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32};
    use wireclient_common::{HandleRequestError, TimeoutConfig};
    use wireclient_connection::ConnMeta;
    use wireclient_types::{Request, Response};

    struct FakeConnection {
        origin: Origin,
        meta: Arc<ConnMeta>,
        available: AtomicBool,
    }

    #[async_trait]
    impl PoolConnection for FakeConnection {
        fn origin(&self) -> &Origin {
            &self.origin
        }
        fn meta(&self) -> &Arc<ConnMeta> {
            &self.meta
        }
        fn is_available(&self) -> bool {
            self.available.load(Ordering::SeqCst)
        }
        async fn handle_request(
            &self,
            _request: &mut Request,
            _timeouts: TimeoutConfig,
        ) -> std::result::Result<Response, HandleRequestError> {
            unreachable!("scheduler tests never drive a real request")
        }
        async fn close(&self) {
            self.meta.mark_closed();
        }
    }

    struct CountingFactory {
        created: AtomicU32,
    }

    impl ConnectionFactory for CountingFactory {
        fn create(&self, origin: &Origin) -> Arc<dyn PoolConnection> {
            self.created.fetch_add(1, Ordering::SeqCst);
            let meta = Arc::new(ConnMeta::new());
            meta.mark_idle(None);
            Arc::new(FakeConnection { origin: origin.clone(), meta, available: AtomicBool::new(true) })
        }
    }

    fn test_origin() -> Origin {
        wireclient_types::Url::parse("http://example.com/").unwrap().origin()
    }

    #[test]
    fn first_request_creates_a_connection_when_under_capacity() {
        let factory = Arc::new(CountingFactory { created: AtomicU32::new(0) });
        let scheduler = Scheduler::new(factory.clone(), 10, 10);
        let request = scheduler.enqueue(test_origin());

        let to_close = scheduler.run_assignment();
        assert!(to_close.is_empty());
        assert!(request.assignment().is_some());
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_same_origin_request_reuses_the_available_connection() {
        let factory = Arc::new(CountingFactory { created: AtomicU32::new(0) });
        let scheduler = Scheduler::new(factory.clone(), 10, 10);

        let r1 = scheduler.enqueue(test_origin());
        scheduler.run_assignment();
        let conn = r1.assignment().unwrap();
        scheduler.remove_request(&r1);

        let r2 = scheduler.enqueue(test_origin());
        scheduler.run_assignment();
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&r2.assignment().unwrap(), &conn));
    }

    #[test]
    fn requests_beyond_max_connections_stay_unassigned() {
        let factory = Arc::new(CountingFactory { created: AtomicU32::new(0) });
        let scheduler = Scheduler::new(factory, 1, 1);

        let origin_a = test_origin();
        let mut origin_b = test_origin();
        origin_b.port = 8080;

        let r1 = scheduler.enqueue(origin_a);
        let r2 = scheduler.enqueue(origin_b);
        scheduler.run_assignment();

        assert!(r1.assignment().is_some());
        assert!(r2.assignment().is_none());
    }

    #[test]
    fn expired_idle_connections_are_collected_for_closing() {
        let factory = Arc::new(CountingFactory { created: AtomicU32::new(0) });
        let scheduler = Scheduler::new(factory, 10, 10);
        let r1 = scheduler.enqueue(test_origin());
        scheduler.run_assignment();
        let conn = r1.assignment().unwrap();
        scheduler.remove_request(&r1);

        conn.meta().mark_idle(Some(Duration::ZERO));
        assert!(conn.has_expired());

        let to_close = scheduler.run_assignment();
        assert_eq!(to_close.len(), 1);
        assert!(scheduler.connections().is_empty());
    }

    #[test]
    fn cleared_assignment_gets_a_fresh_event() {
        let scheduler_factory = Arc::new(CountingFactory { created: AtomicU32::new(0) });
        let scheduler = Scheduler::new(scheduler_factory, 10, 10);
        let request = scheduler.enqueue(test_origin());
        scheduler.run_assignment();
        assert!(request.assignment().is_some());

        request.clear_assignment();
        assert!(request.assignment().is_none());
    }
}
