//! The sans-I/O HTTP/2 engine itself: framing, HPACK, and flow-control
//! bookkeeping. It never touches a socket — [`Http2Connection`] is fed
//! network bytes via `receive_data` and asked for bytes to send via the
//! `send_*`/`take_outgoing_bytes` methods. The connection façade crate
//! owns the actual stream, the four named locks, and the per-stream
//! concurrency semaphore.

use crate::event::{ConnectionEvent, ResponseReceived, StreamEvent};
use crate::frame::{self, flags, FrameType, RawFrame};
use crate::hpack::{HpackDecoder, HpackEncoder};
use crate::settings::{self, RemoteSettings};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use wireclient_common::constants::{
    HTTP2_CONNECTION_WINDOW_DELTA, HTTP2_ENABLE_PUSH, HTTP2_MAX_CONCURRENT_STREAMS,
    HTTP2_MAX_HEADER_LIST_SIZE,
};
use wireclient_common::{Error, Result};
use wireclient_types::{Headers, Request};

/// Returned by [`Http2Connection::get_next_available_stream_id`] once the
/// client-initiated stream-id space (odd numbers) is exhausted.
#[derive(Debug, Clone, Copy)]
pub struct StreamIdsExhausted;

struct StreamState {
    send_window: i64,
    recv_window: i64,
    header_received: bool,
    end_stream_sent: bool,
    end_stream_received: bool,
}

impl StreamState {
    fn new(send_window: i64, recv_window: i64) -> Self {
        Self { send_window, recv_window, header_received: false, end_stream_sent: false, end_stream_received: false }
    }
}

struct PendingHeaderBlock {
    stream_id: u32,
    buffer: BytesMut,
    end_stream: bool,
}

pub struct Http2Connection {
    hpack_encoder: HpackEncoder,
    hpack_decoder: HpackDecoder,
    read_buffer: BytesMut,
    outgoing: BytesMut,
    remote_settings: RemoteSettings,
    local_max_frame_size: u32,
    conn_send_window: i64,
    conn_recv_window: i64,
    next_stream_id: u32,
    streams: HashMap<u32, StreamState>,
    used_all_stream_ids: bool,
    goaway: Option<(u32, u32)>,
    pending_header_block: Option<PendingHeaderBlock>,
}

impl Default for Http2Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Http2Connection {
    #[must_use]
    pub fn new() -> Self {
        Self {
            hpack_encoder: HpackEncoder::new(),
            hpack_decoder: HpackDecoder::new(settings::DEFAULT_HEADER_TABLE_SIZE),
            read_buffer: BytesMut::new(),
            outgoing: BytesMut::new(),
            remote_settings: RemoteSettings::default(),
            local_max_frame_size: settings::DEFAULT_MAX_FRAME_SIZE,
            conn_send_window: i64::from(settings::DEFAULT_INITIAL_WINDOW_SIZE),
            conn_recv_window: i64::from(settings::DEFAULT_INITIAL_WINDOW_SIZE),
            next_stream_id: 1,
            streams: HashMap::new(),
            used_all_stream_ids: false,
            goaway: None,
            pending_header_block: None,
        }
    }

    #[must_use]
    pub fn local_max_concurrent_streams(&self) -> u32 {
        HTTP2_MAX_CONCURRENT_STREAMS
    }

    #[must_use]
    pub fn remote_max_concurrent_streams(&self) -> Option<u32> {
        self.remote_settings.max_concurrent_streams
    }

    #[must_use]
    pub fn goaway(&self) -> Option<(u32, u32)> {
        self.goaway
    }

    #[must_use]
    pub fn used_all_stream_ids(&self) -> bool {
        self.used_all_stream_ids
    }

    /// Client connection preface, initial SETTINGS, and a connection-level
    /// `WINDOW_UPDATE` boosting our receive window — written once, before
    /// the first request.
    pub fn send_connection_init(&mut self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(frame::CLIENT_PREFACE);

        let local_settings = [
            (settings::ENABLE_PUSH, HTTP2_ENABLE_PUSH),
            (settings::MAX_CONCURRENT_STREAMS, HTTP2_MAX_CONCURRENT_STREAMS),
            (settings::MAX_HEADER_LIST_SIZE, HTTP2_MAX_HEADER_LIST_SIZE),
        ];
        let payload = frame::encode_settings_payload(&local_settings);
        buf.extend_from_slice(&RawFrame::encode(FrameType::Settings, 0, 0, &payload));

        self.conn_recv_window += i64::from(HTTP2_CONNECTION_WINDOW_DELTA);
        buf.extend_from_slice(&RawFrame::encode(
            FrameType::WindowUpdate,
            0,
            0,
            &frame::encode_window_update_payload(HTTP2_CONNECTION_WINDOW_DELTA as u32),
        ));

        buf.freeze()
    }

    pub fn get_next_available_stream_id(&mut self) -> std::result::Result<u32, StreamIdsExhausted> {
        if self.goaway.is_some() {
            return Err(StreamIdsExhausted);
        }
        if self.next_stream_id > 0x7fff_fffd {
            self.used_all_stream_ids = true;
            return Err(StreamIdsExhausted);
        }
        let id = self.next_stream_id;
        self.next_stream_id += 2;
        Ok(id)
    }

    /// Serialize the request's pseudo- and regular headers into one or
    /// more HEADERS/CONTINUATION frames, registering per-stream flow
    /// control state and a receive-window boost like
    /// `send_connection_init` does at the connection level.
    pub fn send_request_headers(&mut self, stream_id: u32, request: &Request) -> Result<Bytes> {
        let authority = request
            .headers
            .get("host")
            .ok_or_else(|| Error::LocalProtocolError("request is missing a Host header".into()))?;

        let mut pairs: Vec<(Bytes, Bytes)> = vec![
            (Bytes::from_static(b":method"), request.method.clone()),
            (Bytes::from_static(b":authority"), Bytes::copy_from_slice(authority)),
            (Bytes::from_static(b":scheme"), request.url.scheme.clone()),
            (Bytes::from_static(b":path"), request.url.target.clone()),
        ];
        for (name, value) in request.headers.iter() {
            if name.eq_ignore_ascii_case(b"host") || name.eq_ignore_ascii_case(b"transfer-encoding") {
                continue;
            }
            pairs.push((Bytes::from(name.to_ascii_lowercase()), value.clone()));
        }

        let end_stream = !has_body_headers(&request.headers);
        let block = self.hpack_encoder.encode(&pairs);

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&self.encode_header_block(stream_id, &block, end_stream));

        self.streams.insert(
            stream_id,
            StreamState::new(
                i64::from(self.remote_settings.initial_window_size),
                i64::from(settings::DEFAULT_INITIAL_WINDOW_SIZE) + i64::from(HTTP2_CONNECTION_WINDOW_DELTA),
            ),
        );
        buf.extend_from_slice(&RawFrame::encode(
            FrameType::WindowUpdate,
            0,
            stream_id,
            &frame::encode_window_update_payload(HTTP2_CONNECTION_WINDOW_DELTA as u32),
        ));

        Ok(buf.freeze())
    }

    fn encode_header_block(&self, stream_id: u32, block: &Bytes, end_stream: bool) -> Bytes {
        let max = self.local_max_frame_size as usize;
        if block.len() <= max {
            let mut flags = flags::END_HEADERS;
            if end_stream {
                flags |= self::flags::END_STREAM;
            }
            return RawFrame::encode(FrameType::Headers, flags, stream_id, block);
        }

        let mut out = BytesMut::new();
        let mut first = true;
        let mut offset = 0;
        while offset < block.len() {
            let end = (offset + max).min(block.len());
            let chunk = &block[offset..end];
            let is_last = end == block.len();
            let frame_type = if first { FrameType::Headers } else { FrameType::Continuation };
            let mut frame_flags = 0;
            if is_last {
                frame_flags |= flags::END_HEADERS;
            }
            if first && end_stream {
                frame_flags |= flags::END_STREAM;
            }
            out.extend_from_slice(&RawFrame::encode(frame_type, frame_flags, stream_id, chunk));
            offset = end;
            first = false;
        }
        out.freeze()
    }

    /// `min(per-stream send window, connection send window, peer's max
    /// frame size)` — the most this connection may send as one DATA
    /// frame on `stream_id` right now.
    #[must_use]
    pub fn outbound_flow(&self, stream_id: u32) -> u32 {
        let stream_window = self.streams.get(&stream_id).map_or(0, |s| s.send_window.max(0));
        let window = stream_window.min(self.conn_send_window.max(0));
        (window as u32).min(self.remote_settings.max_frame_size)
    }

    pub fn send_data_frame(&mut self, stream_id: u32, chunk: &[u8]) -> Bytes {
        if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream.send_window -= chunk.len() as i64;
        }
        self.conn_send_window -= chunk.len() as i64;
        RawFrame::encode(FrameType::Data, 0, stream_id, chunk)
    }

    pub fn end_stream(&mut self, stream_id: u32) -> Bytes {
        if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream.end_stream_sent = true;
        }
        RawFrame::encode(FrameType::Data, flags::END_STREAM, stream_id, &[])
    }

    /// Acknowledge `amount` bytes of DATA consumed by the caller,
    /// replenishing both the stream and connection receive windows.
    pub fn acknowledge_received_data(&mut self, stream_id: u32, amount: u32) -> Bytes {
        let mut buf = BytesMut::new();
        if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream.recv_window += i64::from(amount);
            buf.extend_from_slice(&RawFrame::encode(
                FrameType::WindowUpdate,
                0,
                stream_id,
                &frame::encode_window_update_payload(amount),
            ));
        }
        self.conn_recv_window += i64::from(amount);
        buf.extend_from_slice(&RawFrame::encode(
            FrameType::WindowUpdate,
            0,
            0,
            &frame::encode_window_update_payload(amount),
        ));
        buf.freeze()
    }

    /// Drain bytes the engine queued as a side effect of processing
    /// inbound frames (SETTINGS/PING acks) rather than as a direct
    /// response to a caller action.
    pub fn take_outgoing_bytes(&mut self) -> Bytes {
        self.outgoing.split().freeze()
    }

    pub fn response_closed(&mut self, stream_id: u32) {
        self.streams.remove(&stream_id);
    }

    /// Abandon a stream the caller is no longer reading, telling the peer
    /// to stop sending `DATA` frames for it.
    pub fn reset_stream(&mut self, stream_id: u32, error_code: u32) -> Bytes {
        self.streams.remove(&stream_id);
        RawFrame::encode(FrameType::RstStream, 0, stream_id, &frame::encode_rst_stream_payload(error_code))
    }

    /// Feed newly read network bytes in and parse as many complete
    /// frames as are buffered, routing stream-scoped events to their
    /// stream id and connection-scoped ones separately.
    pub fn receive_data(
        &mut self,
        data: &[u8],
    ) -> Result<(Vec<(u32, StreamEvent)>, Vec<ConnectionEvent>)> {
        self.read_buffer.extend_from_slice(data);
        let mut stream_events = Vec::new();
        let mut conn_events = Vec::new();

        while let Some(raw) = RawFrame::parse(&mut self.read_buffer, self.local_max_frame_size)? {
            self.process_frame(raw, &mut stream_events, &mut conn_events)?;
        }
        Ok((stream_events, conn_events))
    }

    fn process_frame(
        &mut self,
        raw: RawFrame,
        stream_events: &mut Vec<(u32, StreamEvent)>,
        conn_events: &mut Vec<ConnectionEvent>,
    ) -> Result<()> {
        match raw.frame_type {
            FrameType::Settings => {
                if raw.flags & flags::ACK != 0 {
                    return Ok(());
                }
                let pairs = frame::parse_settings_payload(&raw.payload)?;
                for (id, value) in pairs {
                    if self.remote_settings.apply(id, value) && id == settings::MAX_CONCURRENT_STREAMS {
                        conn_events.push(ConnectionEvent::RemoteMaxConcurrentStreamsChanged(value));
                    }
                }
                self.outgoing.extend_from_slice(&RawFrame::encode(FrameType::Settings, flags::ACK, 0, &[]));
            }
            FrameType::WindowUpdate => {
                let increment = frame::parse_window_update_payload(&raw.payload)?;
                if raw.stream_id == 0 {
                    self.conn_send_window += i64::from(increment);
                } else if let Some(stream) = self.streams.get_mut(&raw.stream_id) {
                    stream.send_window += i64::from(increment);
                }
            }
            FrameType::Ping => {
                if raw.flags & flags::ACK == 0 {
                    self.outgoing.extend_from_slice(&RawFrame::encode(FrameType::Ping, flags::ACK, 0, &raw.payload));
                }
            }
            FrameType::GoAway => {
                let payload = frame::parse_goaway_payload(&raw.payload)?;
                self.goaway = Some((payload.last_stream_id, payload.error_code));
                conn_events.push(ConnectionEvent::GoAway {
                    last_stream_id: payload.last_stream_id,
                    error_code: payload.error_code,
                });
            }
            FrameType::RstStream => {
                let error_code = frame::parse_rst_stream_payload(&raw.payload)?;
                stream_events.push((raw.stream_id, StreamEvent::StreamReset { error_code }));
            }
            FrameType::Headers => {
                let payload = frame::strip_padding(raw.flags, raw.payload)?;
                let payload = strip_priority(raw.flags, payload);
                self.handle_header_frame(raw.stream_id, raw.flags, payload, stream_events)?;
            }
            FrameType::Continuation => {
                self.handle_continuation_frame(raw.stream_id, raw.flags, raw.payload, stream_events)?;
            }
            FrameType::Data => {
                let payload = frame::strip_padding(raw.flags, raw.payload)?;
                let len = payload.len();
                if let Some(stream) = self.streams.get_mut(&raw.stream_id) {
                    stream.recv_window -= len as i64;
                }
                self.conn_recv_window -= len as i64;
                stream_events.push((
                    raw.stream_id,
                    StreamEvent::Data { data: payload, flow_controlled_length: len },
                ));
                if raw.flags & flags::END_STREAM != 0 {
                    if let Some(stream) = self.streams.get_mut(&raw.stream_id) {
                        stream.end_stream_received = true;
                    }
                    stream_events.push((raw.stream_id, StreamEvent::StreamEnded));
                }
            }
            FrameType::Priority | FrameType::PushPromise | FrameType::Unknown => {}
        }
        Ok(())
    }

    fn handle_header_frame(
        &mut self,
        stream_id: u32,
        frame_flags: u8,
        payload: Bytes,
        stream_events: &mut Vec<(u32, StreamEvent)>,
    ) -> Result<()> {
        let end_stream = frame_flags & flags::END_STREAM != 0;
        if frame_flags & flags::END_HEADERS != 0 {
            self.finish_header_block(stream_id, &payload, end_stream, stream_events)
        } else {
            self.pending_header_block = Some(PendingHeaderBlock {
                stream_id,
                buffer: BytesMut::from(&payload[..]),
                end_stream,
            });
            Ok(())
        }
    }

    fn handle_continuation_frame(
        &mut self,
        stream_id: u32,
        frame_flags: u8,
        payload: Bytes,
        stream_events: &mut Vec<(u32, StreamEvent)>,
    ) -> Result<()> {
        let Some(pending) = self.pending_header_block.as_mut() else {
            return Err(Error::RemoteProtocolError("CONTINUATION frame with no preceding HEADERS".into()));
        };
        if pending.stream_id != stream_id {
            return Err(Error::RemoteProtocolError("CONTINUATION frame stream id mismatch".into()));
        }
        pending.buffer.extend_from_slice(&payload);

        if frame_flags & flags::END_HEADERS != 0 {
            let pending = self.pending_header_block.take().unwrap();
            let block = pending.buffer.freeze();
            self.finish_header_block(pending.stream_id, &block, pending.end_stream, stream_events)
        } else {
            Ok(())
        }
    }

    fn finish_header_block(
        &mut self,
        stream_id: u32,
        block: &[u8],
        end_stream: bool,
        stream_events: &mut Vec<(u32, StreamEvent)>,
    ) -> Result<()> {
        let raw_headers = self.hpack_decoder.decode(block)?;
        let first_header = self.streams.get(&stream_id).map_or(true, |s| !s.header_received);

        if first_header {
            let mut status_code = 200;
            let mut headers = Headers::new();
            for (name, value) in raw_headers {
                if name.as_ref() == b":status" {
                    status_code = std::str::from_utf8(&value).ok().and_then(|s| s.parse().ok()).unwrap_or(200);
                } else if !name.starts_with(b":") {
                    headers.push(name, value);
                }
            }
            if let Some(stream) = self.streams.get_mut(&stream_id) {
                stream.header_received = true;
            }
            stream_events.push((stream_id, StreamEvent::ResponseReceived(ResponseReceived { status_code, headers })));
        } else {
            let headers: Headers = raw_headers.into_iter().filter(|(n, _)| !n.starts_with(b":")).collect();
            stream_events.push((stream_id, StreamEvent::TrailingHeaders(headers)));
        }

        if end_stream {
            if let Some(stream) = self.streams.get_mut(&stream_id) {
                stream.end_stream_received = true;
            }
            stream_events.push((stream_id, StreamEvent::StreamEnded));
        }
        Ok(())
    }
}

fn has_body_headers(headers: &Headers) -> bool {
    headers.contains("content-length") || headers.contains("transfer-encoding")
}

fn strip_priority(frame_flags: u8, mut payload: Bytes) -> Bytes {
    use bytes::Buf;
    if frame_flags & flags::PRIORITY != 0 && payload.len() >= 5 {
        payload.advance(5);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use wireclient_types::{Headers as H, Url};

    fn sample_request() -> Request {
        let mut headers = H::new();
        headers.push("Host", "example.com");
        Request::new("GET", Url::parse("https://example.com/").unwrap(), headers, Bytes::new())
    }

    #[test]
    fn connection_init_includes_preface_and_settings() {
        let mut conn = Http2Connection::new();
        let bytes = conn.send_connection_init();
        assert!(bytes.starts_with(frame::CLIENT_PREFACE));
    }

    #[test]
    fn stream_ids_are_odd_and_increasing() {
        let mut conn = Http2Connection::new();
        let a = conn.get_next_available_stream_id().unwrap();
        let b = conn.get_next_available_stream_id().unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 3);
    }

    #[test]
    fn send_request_headers_registers_stream_flow_state() {
        let mut conn = Http2Connection::new();
        let bytes = conn.send_request_headers(1, &sample_request()).unwrap();
        assert!(!bytes.is_empty());
        assert!(conn.streams.contains_key(&1));
    }

    #[test]
    fn settings_frame_updates_remote_max_concurrent_streams() {
        let mut conn = Http2Connection::new();
        let payload = frame::encode_settings_payload(&[(settings::MAX_CONCURRENT_STREAMS, 42)]);
        let frame_bytes = RawFrame::encode(FrameType::Settings, 0, 0, &payload);
        let (_, conn_events) = conn.receive_data(&frame_bytes).unwrap();
        assert_eq!(conn.remote_max_concurrent_streams(), Some(42));
        assert!(matches!(conn_events[0], ConnectionEvent::RemoteMaxConcurrentStreamsChanged(42)));
    }

    #[test]
    fn goaway_frame_is_reported() {
        let mut conn = Http2Connection::new();
        let payload = {
            let mut b = BytesMut::new();
            b.extend_from_slice(&1u32.to_be_bytes());
            b.extend_from_slice(&0u32.to_be_bytes());
            b.freeze()
        };
        let frame_bytes = RawFrame::encode(FrameType::GoAway, 0, 0, &payload);
        let (_, conn_events) = conn.receive_data(&frame_bytes).unwrap();
        assert!(matches!(conn_events[0], ConnectionEvent::GoAway { last_stream_id: 1, error_code: 0 }));
        assert_eq!(conn.goaway(), Some((1, 0)));
    }
}
