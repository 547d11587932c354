//! Connection-level state machine. Mirrors the lifecycle a sans-I/O HTTP/1.1
//! engine walks through: never more than one request in flight, and a
//! closed engine never reopens.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not yet connected; the transport hasn't been opened.
    Pending,
    /// A request/response cycle is in progress.
    Active,
    /// Nothing in flight; safe to hand back out for reuse.
    Idle,
    /// Closed — any further use is a bug in the caller.
    Closed,
}
