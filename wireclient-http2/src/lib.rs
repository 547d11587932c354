//! Sans-I/O HTTP/2 engine: RFC 9113 framing, a minimal HPACK
//! implementation, and per-connection flow-control/stream bookkeeping.
//! Like `wireclient-http1`, this crate never touches a socket — bytes in,
//! events out. The connection façade crate drives it.

pub mod connection;
pub mod event;
pub mod frame;
pub mod hpack;
pub mod settings;

pub use connection::{Http2Connection, StreamIdsExhausted};
pub use event::{ConnectionEvent, ResponseReceived, StreamEvent};
pub use frame::{FrameType, RawFrame};
pub use settings::RemoteSettings;
