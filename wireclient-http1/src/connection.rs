//! The sans-I/O HTTP/1.1 engine: bytes in (`receive_data`), events out
//! (`next_event`); request serialization produces bytes the caller writes
//! to its own stream. The engine never touches a socket.

use crate::event::{Event, InformationalResponse, NeedData, NextEvent, Paused, ResponseHead};
use crate::state::ConnectionState;
use bytes::{BufMut, Bytes, BytesMut};
use wireclient_common::constants::HTTP1_MAX_HEADER_SIZE;
use wireclient_common::{Error, Result};
use wireclient_types::{Headers, Request};

/// Bytes the connection façade should request per network read while this
/// engine is active.
pub const READ_CHUNK_HINT: usize = 4096;
const MAX_HEADERS: usize = 64;

#[derive(Debug)]
enum BodyDecoder {
    ContentLength(u64),
    Chunked { remaining_in_chunk: u64, seen_final: bool },
    UntilClose,
    None,
}

/// Client-role HTTP/1.1 sans-I/O connection.
pub struct Http11Connection {
    state: ConnectionState,
    read_buffer: BytesMut,
    decoder: BodyDecoder,
    have_response_head: bool,
    response_keep_alive: bool,
    request_keep_alive: bool,
    paused: bool,
    request_count: u64,
    request_chunked: bool,
}

impl Default for Http11Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Http11Connection {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
            read_buffer: BytesMut::new(),
            decoder: BodyDecoder::None,
            have_response_head: false,
            response_keep_alive: true,
            request_keep_alive: true,
            paused: false,
            request_count: 0,
            request_chunked: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// True once both sides have signalled the connection may be reused.
    #[must_use]
    pub fn is_keep_alive(&self) -> bool {
        self.request_keep_alive && self.response_keep_alive
    }

    /// Serialize the request line and headers. Must be called before any
    /// body chunk. Transitions the engine to `Active`.
    pub fn send_request_headers(&mut self, request: &Request) -> Result<Bytes> {
        if self.state == ConnectionState::Closed {
            return Err(Error::LocalProtocolError("connection is closed".into()));
        }
        self.state = ConnectionState::Active;
        self.request_count += 1;
        self.have_response_head = false;
        self.decoder = BodyDecoder::None;
        self.request_keep_alive = !connection_header_says_close(&request.headers);
        self.request_chunked = request
            .headers
            .get("transfer-encoding")
            .map(|v| v.eq_ignore_ascii_case(b"chunked"))
            .unwrap_or(false);

        let target = request.extensions.target_override.as_deref().unwrap_or(&request.url.target);

        let mut buf = BytesMut::with_capacity(256);
        buf.put_slice(&request.method);
        buf.put_u8(b' ');
        buf.put_slice(target);
        buf.put_slice(b" HTTP/1.1\r\n");
        for (name, value) in request.headers.iter() {
            buf.put_slice(name);
            buf.put_slice(b": ");
            buf.put_slice(value);
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"\r\n");
        Ok(buf.freeze())
    }

    /// Frame one outgoing body chunk (chunked-encodes it if the request
    /// used `Transfer-Encoding: chunked`; otherwise passes it through).
    #[must_use]
    pub fn send_request_body_chunk(&self, chunk: &[u8]) -> Bytes {
        if !self.request_chunked {
            return Bytes::copy_from_slice(chunk);
        }
        let mut buf = BytesMut::with_capacity(chunk.len() + 16);
        buf.put_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        buf.put_slice(chunk);
        buf.put_slice(b"\r\n");
        buf.freeze()
    }

    #[must_use]
    pub fn end_request_body(&self) -> Bytes {
        if self.request_chunked {
            Bytes::from_static(b"0\r\n\r\n")
        } else {
            Bytes::new()
        }
    }

    /// Feed bytes read off the network into the engine.
    pub fn receive_data(&mut self, data: &[u8]) {
        self.read_buffer.extend_from_slice(data);
    }

    /// Signal that the peer closed the connection (a zero-length read).
    pub fn receive_eof(&mut self) {
        if matches!(self.decoder, BodyDecoder::UntilClose) {
            // The EOF itself is the end-of-body marker for a
            // close-delimited response; handled on the next `next_event`.
        }
        self.response_keep_alive = false;
    }

    /// Pull the next parseable event out of whatever bytes have been fed
    /// in so far.
    pub fn next_event(&mut self) -> Result<NextEvent> {
        if self.paused {
            return Ok(NextEvent::Paused(Paused));
        }
        if !self.have_response_head {
            return self.parse_response_head();
        }
        self.parse_body()
    }

    fn parse_response_head(&mut self) -> Result<NextEvent> {
        if self.read_buffer.len() > HTTP1_MAX_HEADER_SIZE {
            return Err(Error::RemoteProtocolError(
                "response header block exceeds the 100 KiB limit".into(),
            ));
        }

        let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Response::new(&mut header_storage);
        let status = match parsed.parse(&self.read_buffer) {
            Ok(status) => status,
            Err(err) => return Err(Error::RemoteProtocolError(err.to_string())),
        };

        let consumed = match status {
            httparse::Status::Complete(n) => n,
            httparse::Status::Partial => return Ok(NextEvent::NeedData(NeedData)),
        };

        let status_code = parsed.code.unwrap_or(0);
        let reason = Bytes::copy_from_slice(parsed.reason.unwrap_or("").as_bytes());
        let version = parsed.version.unwrap_or(1);
        let mut headers = Headers::new();
        for h in parsed.headers.iter() {
            headers.push(Bytes::copy_from_slice(h.name.as_bytes()), Bytes::copy_from_slice(h.value));
        }

        self.read_buffer.split_to(consumed);

        if (100..200).contains(&status_code) && status_code != 101 {
            return Ok(NextEvent::Event(Event::InformationalResponse(InformationalResponse {
                status_code,
                headers,
            })));
        }

        self.response_keep_alive = !connection_header_says_close(&headers) && version == 1;
        self.decoder = decide_body_decoder(status_code, &headers);
        self.have_response_head = true;

        if status_code == 101 {
            self.paused = true;
        }

        Ok(NextEvent::Event(Event::Response(ResponseHead {
            http_version: (1, version),
            status_code,
            reason_phrase: reason,
            headers,
        })))
    }

    fn parse_body(&mut self) -> Result<NextEvent> {
        match &mut self.decoder {
            BodyDecoder::None => Ok(NextEvent::Event(Event::EndOfMessage)),
            BodyDecoder::ContentLength(remaining) => {
                if *remaining == 0 {
                    return Ok(NextEvent::Event(Event::EndOfMessage));
                }
                if self.read_buffer.is_empty() {
                    return Ok(NextEvent::NeedData(NeedData));
                }
                let take = (*remaining).min(self.read_buffer.len() as u64) as usize;
                let chunk = self.read_buffer.split_to(take).freeze();
                *remaining -= chunk.len() as u64;
                Ok(NextEvent::Event(Event::Data(chunk)))
            }
            BodyDecoder::UntilClose => {
                if self.read_buffer.is_empty() {
                    return if self.response_keep_alive {
                        Ok(NextEvent::NeedData(NeedData))
                    } else {
                        Ok(NextEvent::Event(Event::EndOfMessage))
                    };
                }
                let chunk = self.read_buffer.split().freeze();
                Ok(NextEvent::Event(Event::Data(chunk)))
            }
            BodyDecoder::Chunked { remaining_in_chunk, seen_final } => {
                if *seen_final {
                    return Ok(NextEvent::Event(Event::EndOfMessage));
                }
                if *remaining_in_chunk == 0 {
                    // Look for the next chunk-size line.
                    match httparse::parse_chunk_size(&self.read_buffer) {
                        Ok(httparse::Status::Complete((consumed, size))) => {
                            self.read_buffer.split_to(consumed);
                            if size == 0 {
                                *seen_final = true;
                                // Trailer section: consume up to the
                                // terminating CRLF if already buffered,
                                // otherwise wait for it.
                                if let Some(pos) = find_double_crlf(&self.read_buffer) {
                                    self.read_buffer.split_to(pos);
                                }
                                return Ok(NextEvent::Event(Event::EndOfMessage));
                            }
                            *remaining_in_chunk = size;
                            self.parse_body()
                        }
                        Ok(httparse::Status::Partial) => Ok(NextEvent::NeedData(NeedData)),
                        Err(_) => Err(Error::RemoteProtocolError("invalid chunk size".into())),
                    }
                } else {
                    if self.read_buffer.is_empty() {
                        return Ok(NextEvent::NeedData(NeedData));
                    }
                    let take = (*remaining_in_chunk).min(self.read_buffer.len() as u64) as usize;
                    let chunk = self.read_buffer.split_to(take).freeze();
                    *remaining_in_chunk -= chunk.len() as u64;
                    if *remaining_in_chunk == 0 && self.read_buffer.len() >= 2 {
                        // Trailing CRLF after the chunk data.
                        self.read_buffer.split_to(2);
                    }
                    Ok(NextEvent::Event(Event::Data(chunk)))
                }
            }
        }
    }

    /// Called once the response body stream has been fully drained and
    /// closed by the caller. Transitions the engine for reuse or close.
    pub fn response_closed(&mut self) {
        if self.is_keep_alive() && self.state != ConnectionState::Closed {
            self.state = ConnectionState::Idle;
        } else {
            self.close();
        }
    }

    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }
}

fn connection_header_says_close(headers: &Headers) -> bool {
    headers
        .get("connection")
        .map(|v| v.eq_ignore_ascii_case(b"close"))
        .unwrap_or(false)
}

fn decide_body_decoder(status_code: u16, headers: &Headers) -> BodyDecoder {
    if status_code == 204 || status_code == 304 || (100..200).contains(&status_code) {
        return BodyDecoder::None;
    }
    if let Some(te) = headers.get("transfer-encoding") {
        if te.eq_ignore_ascii_case(b"chunked") {
            return BodyDecoder::Chunked { remaining_in_chunk: 0, seen_final: false };
        }
    }
    if let Some(cl) = headers.get("content-length") {
        if let Ok(text) = std::str::from_utf8(cl) {
            if let Ok(n) = text.trim().parse::<u64>() {
                return BodyDecoder::ContentLength(n);
            }
        }
    }
    BodyDecoder::UntilClose
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wireclient_types::Url;

    fn get_request() -> Request {
        Request::new("GET", Url::parse("http://example.com/").unwrap(), Headers::new(), Bytes::new())
    }

    #[test]
    fn send_request_headers_serializes_request_line() {
        let mut conn = Http11Connection::new();
        let bytes = conn.send_request_headers(&get_request()).unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("GET / HTTP/1.1\r\n"));
        assert!(text.contains("host: example.com\r\n") || text.contains("Host: example.com\r\n"));
        assert_eq!(conn.state(), ConnectionState::Active);
    }

    #[test]
    fn content_length_response_round_trips_to_end_of_message() {
        let mut conn = Http11Connection::new();
        conn.send_request_headers(&get_request()).unwrap();
        conn.receive_data(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");

        let head = conn.next_event().unwrap();
        assert!(matches!(head, NextEvent::Event(Event::Response(_))));

        let data = conn.next_event().unwrap();
        match data {
            NextEvent::Event(Event::Data(d)) => assert_eq!(&d[..], b"hello"),
            other => panic!("expected Data, got {other:?}"),
        }

        let end = conn.next_event().unwrap();
        assert!(matches!(end, NextEvent::Event(Event::EndOfMessage)));
    }

    #[test]
    fn incomplete_head_requests_more_data() {
        let mut conn = Http11Connection::new();
        conn.send_request_headers(&get_request()).unwrap();
        conn.receive_data(b"HTTP/1.1 200 OK\r\n");
        assert!(matches!(conn.next_event().unwrap(), NextEvent::NeedData(_)));
    }

    #[test]
    fn connection_close_header_disables_keep_alive() {
        let mut conn = Http11Connection::new();
        conn.send_request_headers(&get_request()).unwrap();
        conn.receive_data(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        conn.next_event().unwrap();
        assert!(!conn.is_keep_alive());
    }

    #[test]
    fn chunked_body_decodes_to_data_then_end() {
        let mut conn = Http11Connection::new();
        conn.send_request_headers(&get_request()).unwrap();
        conn.receive_data(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n");
        conn.next_event().unwrap(); // Response
        let mut collected = Vec::new();
        loop {
            match conn.next_event().unwrap() {
                NextEvent::Event(Event::Data(d)) => collected.extend_from_slice(&d),
                NextEvent::Event(Event::EndOfMessage) => break,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(collected, b"hello");
    }

    #[test]
    fn response_closed_transitions_to_idle_when_keep_alive() {
        let mut conn = Http11Connection::new();
        conn.send_request_headers(&get_request()).unwrap();
        conn.receive_data(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        conn.next_event().unwrap();
        conn.next_event().unwrap();
        conn.response_closed();
        assert_eq!(conn.state(), ConnectionState::Idle);
    }

    #[test]
    fn header_block_over_limit_is_rejected() {
        let mut conn = Http11Connection::new();
        conn.send_request_headers(&get_request()).unwrap();
        let oversized = vec![b'a'; HTTP1_MAX_HEADER_SIZE + 1];
        conn.receive_data(&oversized);
        assert!(conn.next_event().is_err());
    }
}
