//! HPACK header block decoding (RFC 7541 §6).
//!
//! Huffman-coded string literals are not decoded — see the `TODO` on
//! [`decode_string`]. Identity-encoded literals (the common case for
//! locally-controlled test servers and many intermediaries) decode fully,
//! including dynamic-table maintenance, so connection reuse and header
//! indexing both work end to end.

use super::dynamic_table::DynamicTable;
use super::integer;
use super::static_table::{self, STATIC_TABLE};
use bytes::Bytes;
use wireclient_common::{Error, Result};

pub struct HpackDecoder {
    dynamic: DynamicTable,
}

impl HpackDecoder {
    #[must_use]
    pub fn new(max_dynamic_table_size: usize) -> Self {
        Self { dynamic: DynamicTable::new(max_dynamic_table_size) }
    }

    pub fn set_max_dynamic_table_size(&mut self, size: usize) {
        self.dynamic.set_max_size(size);
    }

    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<(Bytes, Bytes)>> {
        let mut headers = Vec::new();
        let mut pos = 0;
        while pos < block.len() {
            let byte = block[pos];
            if byte & 0x80 != 0 {
                let (index, consumed) = integer::decode(&block[pos..], 7)?;
                pos += consumed;
                headers.push(self.lookup(index as usize)?);
            } else if byte & 0x40 != 0 {
                let (index, consumed) = integer::decode(&block[pos..], 6)?;
                pos += consumed;
                let (name, value, used) = self.decode_literal(index as usize, &block[pos..])?;
                pos += used;
                self.dynamic.insert(name.clone(), value.clone());
                headers.push((name, value));
            } else if byte & 0x20 != 0 {
                let (size, consumed) = integer::decode(&block[pos..], 5)?;
                pos += consumed;
                self.dynamic.set_max_size(size as usize);
            } else {
                // Literal without indexing (0000) and never-indexed
                // (0001) both use a 4-bit index prefix; this decoder does
                // not distinguish sensitive headers from ordinary ones.
                let (index, consumed) = integer::decode(&block[pos..], 4)?;
                pos += consumed;
                let (name, value, used) = self.decode_literal(index as usize, &block[pos..])?;
                pos += used;
                headers.push((name, value));
            }
        }
        Ok(headers)
    }

    fn decode_literal(&self, index: usize, rest: &[u8]) -> Result<(Bytes, Bytes, usize)> {
        let mut pos = 0;
        let name = if index == 0 {
            let (s, used) = decode_string(&rest[pos..])?;
            pos += used;
            s
        } else {
            self.lookup(index)?.0
        };
        let (value, used) = decode_string(&rest[pos..])?;
        pos += used;
        Ok((name, value, pos))
    }

    fn lookup(&self, index: usize) -> Result<(Bytes, Bytes)> {
        if index == 0 {
            return Err(Error::RemoteProtocolError("HPACK index 0 is invalid".into()));
        }
        if index <= static_table::len() {
            let (name, value) = STATIC_TABLE[index - 1];
            return Ok((Bytes::copy_from_slice(name.as_bytes()), Bytes::copy_from_slice(value.as_bytes())));
        }
        self.dynamic
            .get(index - static_table::len() - 1)
            .cloned()
            .ok_or_else(|| Error::RemoteProtocolError(format!("HPACK index {index} out of range")))
    }
}

fn decode_string(buf: &[u8]) -> Result<(Bytes, usize)> {
    if buf.is_empty() {
        return Err(Error::RemoteProtocolError("truncated HPACK string literal".into()));
    }
    let huffman = buf[0] & 0x80 != 0;
    let (len, consumed) = integer::decode(buf, 7)?;
    let len = len as usize;
    if consumed + len > buf.len() {
        return Err(Error::RemoteProtocolError("truncated HPACK string literal".into()));
    }
    if huffman {
        // TODO: implement RFC 7541 Appendix B Huffman decoding. Servers
        // that always Huffman-encode header values (most real-world
        // HTTP/2 servers) are not yet interoperable against this decoder.
        return Err(Error::RemoteProtocolError(
            "Huffman-coded HPACK string literals are not yet supported".into(),
        ));
    }
    let data = Bytes::copy_from_slice(&buf[consumed..consumed + len]);
    Ok((data, consumed + len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hpack::encoder::HpackEncoder;

    #[test]
    fn decodes_an_indexed_static_header() {
        let mut decoder = HpackDecoder::new(4096);
        // Index 2 = (":method", "GET")
        let block = [0x82u8];
        let headers = decoder.decode(&block).unwrap();
        assert_eq!(headers, vec![(Bytes::from_static(b":method"), Bytes::from_static(b"GET"))]);
    }

    #[test]
    fn round_trips_through_the_encoder() {
        let mut encoder = HpackEncoder::new();
        let input = vec![
            (Bytes::from_static(b":method"), Bytes::from_static(b"GET")),
            (Bytes::from_static(b"x-custom"), Bytes::from_static(b"value")),
        ];
        let block = encoder.encode(&input);
        let mut decoder = HpackDecoder::new(4096);
        let decoded = decoder.decode(&block).unwrap();
        assert_eq!(decoded, input);
    }
}
