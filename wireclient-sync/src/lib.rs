//! Synchronization primitives shared by the pool scheduler and the HTTP/2
//! engine: a one-shot `Event`, a `BoundedSemaphore` with a live-adjustable
//! bound, and a cancellation shield for cleanup-on-drop.
//!
//! This is the parallel (OS-thread, Tokio) implementation named in the
//! concurrency model; a cooperative-single-threaded implementation would
//! provide the same `Event`/`BoundedSemaphore`/`shielded` surface backed
//! by a different executor without callers changing.

pub mod event;
pub mod semaphore;
pub mod shield;

pub use event::{Event, TimedOut};
pub use semaphore::BoundedSemaphore;
pub use shield::shielded;

/// Re-exported so crates that hold a lock across an `.await` don't need
/// their own direct `tokio` dependency just for this.
pub use tokio::sync::Mutex;
