// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QUIC packet codec.
//!
//! Wire layout (this project's variant, not RFC 9000):
//!
//! ```text
//! +------+----------------+----------------------+-----------+
//! | QUIC | length (4, BE) | sha256(payload)[0..8] | payload   |
//! +------+----------------+----------------------+-----------+
//! ```
//!
//! The checksum comparison is constant-time so a corrupted packet cannot
//! be distinguished from a forged one by timing.

use crate::config::{QUIC_CHECKSUM_LEN, QUIC_HEADER_LEN, QUIC_HEADER_MARKER};
use ring::constant_time::verify_slices_are_equal;
use ring::digest::{digest, SHA256};
use std::fmt;

/// Errors raised by the packet codec.
#[derive(Debug)]
pub enum PacketError {
    /// Encoding was asked to frame an empty payload.
    EmptyPayload,
    /// Missing marker, truncated header, or length mismatch.
    Malformed(String),
    /// Recomputed checksum differs from the carried one.
    ChecksumMismatch,
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "payload cannot be empty"),
            Self::Malformed(msg) => write!(f, "malformed packet: {}", msg),
            Self::ChecksumMismatch => write!(f, "checksum verification failed"),
        }
    }
}

impl std::error::Error for PacketError {}

/// Truncated SHA-256 over the payload.
fn payload_checksum(payload: &[u8]) -> [u8; QUIC_CHECKSUM_LEN] {
    let full = digest(&SHA256, payload);
    let mut checksum = [0u8; QUIC_CHECKSUM_LEN];
    checksum.copy_from_slice(&full.as_ref()[..QUIC_CHECKSUM_LEN]);
    checksum
}

/// Frame a payload into a QUIC packet.
pub fn encode_quic_packet(payload: &[u8]) -> Result<Vec<u8>, PacketError> {
    if payload.is_empty() {
        return Err(PacketError::EmptyPayload);
    }
    let mut packet = Vec::with_capacity(QUIC_HEADER_LEN + payload.len());
    packet.extend_from_slice(QUIC_HEADER_MARKER);
    packet.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    packet.extend_from_slice(&payload_checksum(payload));
    packet.extend_from_slice(payload);
    Ok(packet)
}

/// Parse a QUIC packet back into its payload, verifying the checksum.
pub fn decode_quic_packet(packet: &[u8]) -> Result<Vec<u8>, PacketError> {
    if !packet.starts_with(QUIC_HEADER_MARKER) {
        return Err(PacketError::Malformed("missing header marker".into()));
    }
    if packet.len() < QUIC_HEADER_LEN {
        return Err(PacketError::Malformed(format!(
            "packet too short for header: {} bytes",
            packet.len()
        )));
    }
    let payload_len = u32::from_be_bytes([packet[4], packet[5], packet[6], packet[7]]) as usize;
    if packet.len() < QUIC_HEADER_LEN + payload_len {
        return Err(PacketError::Malformed(format!(
            "payload length mismatch: declared {}, available {}",
            payload_len,
            packet.len() - QUIC_HEADER_LEN
        )));
    }
    let carried = &packet[8..QUIC_HEADER_LEN];
    let payload = &packet[QUIC_HEADER_LEN..QUIC_HEADER_LEN + payload_len];
    let computed = payload_checksum(payload);
    verify_slices_are_equal(carried, &computed).map_err(|_| PacketError::ChecksumMismatch)?;
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let payload = b"stream frame payload";
        let packet = encode_quic_packet(payload).unwrap();
        assert_eq!(decode_quic_packet(&packet).unwrap(), payload);
    }

    #[test]
    fn test_encode_empty_payload_rejected() {
        assert!(matches!(
            encode_quic_packet(b""),
            Err(PacketError::EmptyPayload)
        ));
    }

    #[test]
    fn test_packet_layout() {
        let packet = encode_quic_packet(b"abc").unwrap();
        assert_eq!(&packet[..4], b"QUIC");
        assert_eq!(u32::from_be_bytes(packet[4..8].try_into().unwrap()), 3);
        assert_eq!(packet.len(), 16 + 3);
    }

    #[test]
    fn test_decode_rejects_wrong_marker() {
        let mut packet = encode_quic_packet(b"abc").unwrap();
        packet[0] = b'X';
        assert!(matches!(
            decode_quic_packet(&packet),
            Err(PacketError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_short_packet() {
        assert!(matches!(
            decode_quic_packet(b"QUIC\x00\x00"),
            Err(PacketError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let mut packet = encode_quic_packet(b"abcdef").unwrap();
        packet.truncate(packet.len() - 2);
        assert!(matches!(
            decode_quic_packet(&packet),
            Err(PacketError::Malformed(_))
        ));
    }

    #[test]
    fn test_single_byte_mutation_in_checksum_fails() {
        let original = encode_quic_packet(b"payload under test").unwrap();
        for idx in 8..16 {
            let mut packet = original.clone();
            packet[idx] ^= 0x01;
            assert!(
                matches!(decode_quic_packet(&packet), Err(PacketError::ChecksumMismatch)),
                "mutation at checksum byte {} must fail",
                idx
            );
        }
    }

    #[test]
    fn test_single_byte_mutation_in_length_fails() {
        let original = encode_quic_packet(b"payload under test").unwrap();
        for idx in 4..8 {
            let mut packet = original.clone();
            packet[idx] ^= 0x01;
            assert!(
                decode_quic_packet(&packet).is_err(),
                "mutation at length byte {} must fail",
                idx
            );
        }
    }

    #[test]
    fn test_payload_mutation_fails_checksum() {
        let mut packet = encode_quic_packet(b"payload under test").unwrap();
        let last = packet.len() - 1;
        packet[last] ^= 0x01;
        assert!(matches!(
            decode_quic_packet(&packet),
            Err(PacketError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_random_payload_roundtrips() {
        for _ in 0..50 {
            let len = 1 + fastrand::usize(..512);
            let payload: Vec<u8> = (0..len).map(|_| fastrand::u8(..)).collect();
            let packet = encode_quic_packet(&payload).unwrap();
            assert_eq!(decode_quic_packet(&packet).unwrap(), payload);
        }
    }

    #[test]
    fn test_trailing_bytes_after_payload_are_ignored() {
        let mut packet = encode_quic_packet(b"abc").unwrap();
        packet.extend_from_slice(b"trailing");
        assert_eq!(decode_quic_packet(&packet).unwrap(), b"abc");
    }
}
