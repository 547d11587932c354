//! Per-stream events the engine reports after parsing inbound frames.

use bytes::Bytes;
use wireclient_types::Headers;

#[derive(Debug, Clone)]
pub struct ResponseReceived {
    pub status_code: u16,
    pub headers: Headers,
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    ResponseReceived(ResponseReceived),
    Data { data: Bytes, flow_controlled_length: usize },
    TrailingHeaders(Headers),
    StreamEnded,
    StreamReset { error_code: u32 },
}

/// Connection-wide events that aren't scoped to a single stream.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The peer's `MAX_CONCURRENT_STREAMS` changed; the caller should
    /// adjust its stream-concurrency semaphore bound for future
    /// acquisitions only.
    RemoteMaxConcurrentStreamsChanged(u32),
    GoAway { last_stream_id: u32, error_code: u32 },
}
