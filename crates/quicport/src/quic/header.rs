// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream metadata header prepended to every stream frame inside a QUIC
//! packet.
//!
//! The header is a newline-terminated `key=value;key=value` run. The
//! `stream_id` field is mandatory on the send path and is how the manager
//! routes an incoming payload to its stream.

use super::packet::PacketError;

/// Upper bound on header size; anything longer is treated as malformed.
const MAX_HEADER_LEN: usize = 256;

/// Ordered key/value header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    fields: Vec<(String, String)>,
}

impl PacketHeader {
    /// Build a header from explicit fields.
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    /// Build a header carrying only a stream id.
    pub fn for_stream(stream_id: u64) -> Self {
        Self {
            fields: vec![("stream_id".to_string(), stream_id.to_string())],
        }
    }

    /// Set (or replace) the stream id field.
    pub fn set_stream_id(&mut self, stream_id: u64) {
        for (k, v) in &mut self.fields {
            if k == "stream_id" {
                *v = stream_id.to_string();
                return;
            }
        }
        self.fields
            .push(("stream_id".to_string(), stream_id.to_string()));
    }

    /// Stream id carried by the header, if present and numeric.
    pub fn stream_id(&self) -> Option<u64> {
        self.get("stream_id").and_then(|v| v.parse().ok())
    }

    /// Look up a field value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize as `key=value;key=value\n`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            out.push_str(k);
            out.push('=');
            out.push_str(v);
        }
        out.push('\n');
        out.into_bytes()
    }

    /// Parse a header from the front of `data`.
    ///
    /// Returns the header and the number of bytes consumed (terminator
    /// included).
    pub fn decode(data: &[u8]) -> Result<(Self, usize), PacketError> {
        let limit = data.len().min(MAX_HEADER_LEN);
        let newline = data[..limit]
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| PacketError::Malformed("missing header terminator".into()))?;
        let text = std::str::from_utf8(&data[..newline])
            .map_err(|_| PacketError::Malformed("header is not UTF-8".into()))?;

        let mut fields = Vec::new();
        for pair in text.split(';') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| PacketError::Malformed(format!("invalid header pair: {}", pair)))?;
            fields.push((key.to_string(), value.to_string()));
        }
        Ok((Self { fields }, newline + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let header = PacketHeader::new(vec![
            ("stream_id".into(), "7".into()),
            ("kind".into(), "data".into()),
        ]);
        let encoded = header.encode();
        let (decoded, consumed) = PacketHeader::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn test_stream_id_accessor() {
        let header = PacketHeader::for_stream(42);
        assert_eq!(header.stream_id(), Some(42));
    }

    #[test]
    fn test_set_stream_id_replaces() {
        let mut header = PacketHeader::for_stream(1);
        header.set_stream_id(9);
        assert_eq!(header.stream_id(), Some(9));
        assert_eq!(header.encode(), b"stream_id=9\n");
    }

    #[test]
    fn test_decode_leaves_remainder() {
        let mut data = PacketHeader::for_stream(3).encode();
        data.extend_from_slice(b"frame body");
        let (header, consumed) = PacketHeader::decode(&data).unwrap();
        assert_eq!(header.stream_id(), Some(3));
        assert_eq!(&data[consumed..], b"frame body");
    }

    #[test]
    fn test_decode_missing_terminator() {
        assert!(PacketHeader::decode(b"stream_id=1").is_err());
    }

    #[test]
    fn test_decode_invalid_pair() {
        assert!(PacketHeader::decode(b"stream_id\n").is_err());
    }
}
