//! HPACK header block encoding. Always emits "literal header field
//! without indexing" (referencing a static-table name index when one
//! exists), identity-encoded (no Huffman) — simple, always RFC-valid, and
//! never grows a dynamic table we'd then have to size-manage on the
//! sending side.

use super::integer;
use super::static_table;
use bytes::{BufMut, Bytes, BytesMut};

#[derive(Debug, Default)]
pub struct HpackEncoder;

impl HpackEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&mut self, headers: &[(Bytes, Bytes)]) -> Bytes {
        let mut buf = BytesMut::new();
        for (name, value) in headers {
            self.encode_one(&mut buf, name, value);
        }
        buf.freeze()
    }

    fn encode_one(&self, buf: &mut BytesMut, name: &[u8], value: &[u8]) {
        let name_str = std::str::from_utf8(name).unwrap_or("");
        if let Some(index) = static_table::find_indexed(name_str, std::str::from_utf8(value).unwrap_or("")) {
            integer::encode(buf, 7, 0x80, index as u64);
            return;
        }
        match static_table::find_name(name_str) {
            Some(index) => integer::encode(buf, 4, 0x00, index as u64),
            None => {
                integer::encode(buf, 4, 0x00, 0);
                encode_string(buf, name);
            }
        }
        encode_string(buf, value);
    }
}

fn encode_string(buf: &mut BytesMut, data: &[u8]) {
    integer::encode(buf, 7, 0x00, data.len() as u64);
    buf.put_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_known_pseudo_header_by_exact_index() {
        let mut encoder = HpackEncoder::new();
        let block = encoder.encode(&[(Bytes::from_static(b":method"), Bytes::from_static(b"GET"))]);
        assert_eq!(block[0], 0x80 | 2);
    }

    #[test]
    fn encodes_unknown_header_as_literal_with_both_strings() {
        let mut encoder = HpackEncoder::new();
        let block = encoder.encode(&[(Bytes::from_static(b"x-custom"), Bytes::from_static(b"v"))]);
        assert_eq!(block[0] & 0xf0, 0x00);
    }
}
