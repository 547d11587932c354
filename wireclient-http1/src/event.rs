//! Sans-I/O events. The engine never performs I/O itself: callers feed it
//! bytes via [`crate::Http11Connection::receive_data`] and pull events back
//! out via `next_event`, exactly mirroring the read side of an HTTP/1.1
//! message.

use bytes::Bytes;
use wireclient_types::Headers;

/// A fully parsed informational (1xx, excluding 101) response.
#[derive(Debug, Clone)]
pub struct InformationalResponse {
    pub status_code: u16,
    pub headers: Headers,
}

/// A fully parsed status line + header block.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub http_version: (u8, u8),
    pub status_code: u16,
    pub reason_phrase: Bytes,
    pub headers: Headers,
}

/// One unit of progress the engine can report back to the caller.
#[derive(Debug, Clone)]
pub enum Event {
    InformationalResponse(InformationalResponse),
    Response(ResponseHead),
    Data(Bytes),
    EndOfMessage,
    /// The peer closed the connection (EOF with nothing left to parse).
    ConnectionClosed,
}

/// Returned by `next_event` instead of an `Event` when the engine cannot
/// make progress without more bytes from the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeedData;

/// Returned instead of an `Event` when the engine has paused after a
/// `101 Switching Protocols` response — the remaining bytes belong to the
/// upgraded protocol, not to this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paused;

/// What `next_event` yields: progress, a need for more bytes, or a pause
/// for protocol upgrade.
#[derive(Debug, Clone)]
pub enum NextEvent {
    Event(Event),
    NeedData(NeedData),
    Paused(Paused),
}
