//! RFC 9113 frame header and frame-body parsing/encoding. No frame larger
//! than `SETTINGS_MAX_FRAME_SIZE` is expected; the caller is responsible
//! for not exceeding the peer's advertised value when sending.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use wireclient_common::{Error, Result};

pub const FRAME_HEADER_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Data = 0x0,
    Headers = 0x1,
    Priority = 0x2,
    RstStream = 0x3,
    Settings = 0x4,
    PushPromise = 0x5,
    Ping = 0x6,
    GoAway = 0x7,
    WindowUpdate = 0x8,
    Continuation = 0x9,
    Unknown = 0xff,
}

impl From<u8> for FrameType {
    fn from(v: u8) -> Self {
        match v {
            0x0 => FrameType::Data,
            0x1 => FrameType::Headers,
            0x2 => FrameType::Priority,
            0x3 => FrameType::RstStream,
            0x4 => FrameType::Settings,
            0x5 => FrameType::PushPromise,
            0x6 => FrameType::Ping,
            0x7 => FrameType::GoAway,
            0x8 => FrameType::WindowUpdate,
            0x9 => FrameType::Continuation,
            _ => FrameType::Unknown,
        }
    }
}

pub mod flags {
    pub const END_STREAM: u8 = 0x1;
    pub const ACK: u8 = 0x1;
    pub const END_HEADERS: u8 = 0x4;
    pub const PADDED: u8 = 0x8;
    pub const PRIORITY: u8 = 0x20;
}

/// A parsed frame header plus its raw payload. Header/continuation frames
/// are handed to the HPACK decoder by the caller; other payloads are
/// interpreted directly.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub frame_type: FrameType,
    pub flags: u8,
    pub stream_id: u32,
    pub payload: Bytes,
}

impl RawFrame {
    /// Try to parse one frame off the front of `buf`. Returns `None` if
    /// fewer than a full frame's worth of bytes are buffered.
    pub fn parse(buf: &mut BytesMut, max_frame_size: u32) -> Result<Option<Self>> {
        if buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let len = ((buf[0] as usize) << 16) | ((buf[1] as usize) << 8) | (buf[2] as usize);
        if len as u32 > max_frame_size {
            return Err(Error::RemoteProtocolError(format!(
                "frame length {len} exceeds max frame size {max_frame_size}"
            )));
        }
        if buf.len() < FRAME_HEADER_LEN + len {
            return Ok(None);
        }

        let frame_type = FrameType::from(buf[3]);
        let flags = buf[4];
        let stream_id = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]) & 0x7fff_ffff;

        buf.advance(FRAME_HEADER_LEN);
        let payload = buf.split_to(len).freeze();

        Ok(Some(Self { frame_type, flags, stream_id, payload }))
    }

    pub fn encode(frame_type: FrameType, flags: u8, stream_id: u32, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
        let len = payload.len() as u32;
        buf.put_u8((len >> 16) as u8);
        buf.put_u8((len >> 8) as u8);
        buf.put_u8(len as u8);
        buf.put_u8(frame_type as u8);
        buf.put_u8(flags);
        buf.put_u32(stream_id & 0x7fff_ffff);
        buf.put_slice(payload);
        buf.freeze()
    }
}

/// Parsed `SETTINGS` frame payload: a list of (id, value) pairs in wire
/// order, duplicates resolved last-wins by the caller.
pub fn parse_settings_payload(payload: &[u8]) -> Result<Vec<(u16, u32)>> {
    if payload.len() % 6 != 0 {
        return Err(Error::RemoteProtocolError(
            "SETTINGS frame payload is not a multiple of 6 bytes".into(),
        ));
    }
    Ok(payload
        .chunks_exact(6)
        .map(|chunk| {
            let id = u16::from_be_bytes([chunk[0], chunk[1]]);
            let value = u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]);
            (id, value)
        })
        .collect())
}

pub fn encode_settings_payload(settings: &[(u16, u32)]) -> Bytes {
    let mut buf = BytesMut::with_capacity(settings.len() * 6);
    for (id, value) in settings {
        buf.put_u16(*id);
        buf.put_u32(*value);
    }
    buf.freeze()
}

/// Parsed `WINDOW_UPDATE` payload.
pub fn parse_window_update_payload(payload: &[u8]) -> Result<u32> {
    if payload.len() != 4 {
        return Err(Error::RemoteProtocolError("malformed WINDOW_UPDATE frame".into()));
    }
    Ok(u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & 0x7fff_ffff)
}

pub fn encode_window_update_payload(increment: u32) -> Bytes {
    Bytes::copy_from_slice(&(increment & 0x7fff_ffff).to_be_bytes())
}

/// Parsed `GOAWAY` payload.
#[derive(Debug, Clone)]
pub struct GoAwayPayload {
    pub last_stream_id: u32,
    pub error_code: u32,
    pub debug_data: Bytes,
}

pub fn parse_goaway_payload(payload: &Bytes) -> Result<GoAwayPayload> {
    if payload.len() < 8 {
        return Err(Error::RemoteProtocolError("malformed GOAWAY frame".into()));
    }
    let last_stream_id = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & 0x7fff_ffff;
    let error_code = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    Ok(GoAwayPayload {
        last_stream_id,
        error_code,
        debug_data: payload.slice(8..),
    })
}

/// Parsed `RST_STREAM` payload.
pub fn parse_rst_stream_payload(payload: &[u8]) -> Result<u32> {
    if payload.len() != 4 {
        return Err(Error::RemoteProtocolError("malformed RST_STREAM frame".into()));
    }
    Ok(u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]))
}

pub fn encode_rst_stream_payload(error_code: u32) -> Bytes {
    Bytes::copy_from_slice(&error_code.to_be_bytes())
}

/// Strip the optional PADDED-flag pad length and padding bytes, returning
/// the usable portion of a HEADERS/DATA payload.
pub fn strip_padding(flags: u8, mut payload: Bytes) -> Result<Bytes> {
    if flags & self::flags::PADDED == 0 {
        return Ok(payload);
    }
    if payload.is_empty() {
        return Err(Error::RemoteProtocolError("PADDED flag set on empty payload".into()));
    }
    let pad_len = payload[0] as usize;
    payload.advance(1);
    if pad_len > payload.len() {
        return Err(Error::RemoteProtocolError("pad length exceeds frame payload".into()));
    }
    payload.truncate(payload.len() - pad_len);
    Ok(payload)
}

pub const CLIENT_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_parse_round_trips() {
        let encoded = RawFrame::encode(FrameType::Ping, 0, 0, &[0u8; 8]);
        let mut buf = BytesMut::from(&encoded[..]);
        let parsed = RawFrame::parse(&mut buf, 16384).unwrap().unwrap();
        assert_eq!(parsed.frame_type, FrameType::Ping);
        assert_eq!(parsed.payload.len(), 8);
    }

    #[test]
    fn parse_returns_none_on_partial_frame() {
        let mut buf = BytesMut::from(&b"\x00\x00\x08\x06\x00"[..]);
        assert!(RawFrame::parse(&mut buf, 16384).unwrap().is_none());
    }

    #[test]
    fn settings_payload_round_trips() {
        let settings = vec![(0x3u16, 100u32), (0x4u16, 65535u32)];
        let encoded = encode_settings_payload(&settings);
        let parsed = parse_settings_payload(&encoded).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(0xff);
        buf.put_u8(0xff);
        buf.put_u8(0xff);
        buf.put_u8(0);
        buf.put_u8(0);
        buf.put_u32(0);
        assert!(RawFrame::parse(&mut buf, 16384).is_err());
    }
}
