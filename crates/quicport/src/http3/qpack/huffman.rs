// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Huffman coding for QPACK string literals (RFC 7541 Appendix B).
//!
//! Codes are packed MSB-first; the final byte is padded with 1-bits (a
//! prefix of the EOS code). The decoder walks a binary trie built once at
//! first use and rejects invalid padding: more than seven trailing bits,
//! or trailing bits containing a zero.

use super::QpackError;
use std::sync::OnceLock;

/// Code words for symbols 0-255 plus EOS (index 256).
#[rustfmt::skip]
const CODES: [u32; 257] = [
    0x1ff8,0x7fffd8,0xfffffe2,0xfffffe3,0xfffffe4,0xfffffe5,0xfffffe6,0xfffffe7,0xfffffe8,0xffffea,0x3ffffffc,0xfffffe9,0xfffffea,0x3ffffffd,0xfffffeb,0xfffffec,
    0xfffffed,0xfffffee,0xfffffef,0xffffff0,0xffffff1,0xffffff2,0x3ffffffe,0xffffff3,0xffffff4,0xffffff5,0xffffff6,0xffffff7,0xffffff8,0xffffff9,0xffffffa,0xffffffb,
    0x14,0x3f8,0x3f9,0xffa,0x1ff9,0x15,0xf8,0x7fa,0x3fa,0x3fb,0xf9,0x7fb,0xfa,0x16,0x17,0x18,
    0x0,0x1,0x2,0x19,0x1a,0x1b,0x1c,0x1d,0x1e,0x1f,0x5c,0xfb,0x7ffc,0x20,0xffb,0x3fc,
    0x1ffa,0x21,0x5d,0x5e,0x5f,0x60,0x61,0x62,0x63,0x64,0x65,0x66,0x67,0x68,0x69,0x6a,
    0x6b,0x6c,0x6d,0x6e,0x6f,0x70,0x71,0x72,0xfc,0x73,0xfd,0x1ffb,0x7fff0,0x1ffc,0x3ffc,0x22,
    0x7ffd,0x3,0x23,0x4,0x24,0x5,0x25,0x26,0x27,0x6,0x74,0x75,0x28,0x29,0x2a,0x7,
    0x2b,0x76,0x2c,0x8,0x9,0x2d,0x77,0x78,0x79,0x7a,0x7b,0x7ffe,0x7fc,0x3ffd,0x1ffd,0xffffffc,
    0xfffe6,0x3fffd2,0xfffe7,0xfffe8,0x3fffd3,0x3fffd4,0x3fffd5,0x7fffd9,0x3fffd6,0x7fffda,0x7fffdb,0x7fffdc,0x7fffdd,0x7fffde,0xffffeb,0x7fffdf,
    0xffffec,0xffffed,0x3fffd7,0x7fffe0,0xffffee,0x7fffe1,0x7fffe2,0x7fffe3,0x7fffe4,0x1fffdc,0x3fffd8,0x7fffe5,0x3fffd9,0x7fffe6,0x7fffe7,0xffffef,
    0x3fffda,0x1fffdd,0xfffe9,0x3fffdb,0x3fffdc,0x7fffe8,0x7fffe9,0x1fffde,0x7fffea,0x3fffdd,0x3fffde,0xfffff0,0x1fffdf,0x3fffdf,0x7fffeb,0x7fffec,
    0x1fffe0,0x1fffe1,0x3fffe0,0x1fffe2,0x7fffed,0x3fffe1,0x7fffee,0x7fffef,0xfffea,0x3fffe2,0x3fffe3,0x3fffe4,0x7ffff0,0x3fffe5,0x3fffe6,0x7ffff1,
    0x3ffffe0,0x3ffffe1,0xfffeb,0x7fff1,0x3fffe7,0x7ffff2,0x3fffe8,0x1ffffec,0x3ffffe2,0x3ffffe3,0x3ffffe4,0x7ffffde,0x7ffffdf,0x3ffffe5,0xfffff1,0x1ffffed,
    0x7fff2,0x1fffe3,0x3ffffe6,0x7ffffe0,0x7ffffe1,0x3ffffe7,0x7ffffe2,0xfffff2,0x1fffe4,0x1fffe5,0x3ffffe8,0x3ffffe9,0xffffffd,0x7ffffe3,0x7ffffe4,0x7ffffe5,
    0xfffec,0xfffff3,0xfffed,0x1fffe6,0x3fffe9,0x1fffe7,0x1fffe8,0x7ffff3,0x3fffea,0x3fffeb,0x1ffffee,0x1ffffef,0xfffff4,0xfffff5,0x3ffffea,0x7ffff4,
    0x3ffffeb,0x7ffffe6,0x3ffffec,0x3ffffed,0x7ffffe7,0x7ffffe8,0x7ffffe9,0x7ffffea,0x7ffffeb,0xffffffe,0x7ffffec,0x7ffffed,0x7ffffee,0x7ffffef,0x7fffff0,0x3ffffee,
    0x3fffffff,
];

/// Bit lengths matching [`CODES`].
#[rustfmt::skip]
const CODE_BITS: [u8; 257] = [
    13,23,28,28,28,28,28,28,28,24,30,28,28,30,28,28,28,28,28,28,28,28,30,28,28,28,28,28,28,28,28,28,
    6,10,10,12,13,6,8,11,10,10,8,11,8,6,6,6,5,5,5,6,6,6,6,6,6,6,7,8,15,6,12,10,
    13,6,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,8,7,8,13,19,13,14,6,
    15,5,6,5,6,5,6,6,6,5,7,7,6,6,6,5,6,7,6,5,5,6,7,7,7,7,7,15,11,14,13,28,
    20,22,20,20,22,22,22,23,22,23,23,23,23,23,24,23,24,24,22,23,24,23,23,23,23,21,22,23,22,23,23,24,
    22,21,20,22,22,23,23,21,23,22,22,24,21,22,23,23,21,21,22,21,23,22,23,23,20,22,22,22,23,22,22,23,
    26,26,20,19,22,23,22,25,26,26,26,27,27,26,24,25,19,21,26,27,27,26,27,24,21,21,26,26,28,27,27,27,
    20,24,20,21,22,21,21,23,22,22,25,25,24,24,26,23,26,27,26,26,27,27,27,27,27,28,27,27,27,27,27,26,
    30,
];

const EOS_SYMBOL: u16 = 256;

/// Huffman-encode `data`, padding the final byte with 1-bits.
pub fn huffman_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut bit_buffer: u64 = 0;
    let mut bit_count: u32 = 0;
    for &byte in data {
        let code = CODES[byte as usize] as u64;
        let bits = CODE_BITS[byte as usize] as u32;
        bit_buffer = (bit_buffer << bits) | code;
        bit_count += bits;
        while bit_count >= 8 {
            bit_count -= 8;
            out.push((bit_buffer >> bit_count) as u8);
        }
    }
    if bit_count > 0 {
        // EOS-prefix padding: fill the remainder with 1-bits.
        let padding = 8 - bit_count;
        out.push(((bit_buffer << padding) as u8) | ((1u8 << padding) - 1));
    }
    out
}

struct TrieNode {
    /// Child index per bit value; -1 means absent.
    next: [i32; 2],
    /// Decoded symbol at this leaf; -1 for interior nodes.
    symbol: i16,
}

fn decode_trie() -> &'static Vec<TrieNode> {
    static TRIE: OnceLock<Vec<TrieNode>> = OnceLock::new();
    TRIE.get_or_init(|| {
        let mut nodes = vec![TrieNode {
            next: [-1, -1],
            symbol: -1,
        }];
        for symbol in 0u32..=256 {
            let code = CODES[symbol as usize];
            let bits = CODE_BITS[symbol as usize];
            if bits == 0 {
                continue;
            }
            let mut node = 0usize;
            for i in (0..bits).rev() {
                let bit = ((code >> i) & 1) as usize;
                let child = nodes[node].next[bit];
                if child < 0 {
                    nodes.push(TrieNode {
                        next: [-1, -1],
                        symbol: -1,
                    });
                    let idx = (nodes.len() - 1) as i32;
                    nodes[node].next[bit] = idx;
                    node = idx as usize;
                } else {
                    node = child as usize;
                }
            }
            nodes[node].symbol = symbol as i16;
        }
        nodes
    })
}

/// Decode a Huffman bit stream back into bytes.
pub fn huffman_decode(data: &[u8]) -> Result<Vec<u8>, QpackError> {
    let trie = decode_trie();
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut node = 0usize;
    let mut path_bits: u32 = 0;
    let mut path_all_ones = true;

    for &byte in data {
        for shift in (0..8).rev() {
            let bit = ((byte >> shift) & 1) as usize;
            let child = trie[node].next[bit];
            if child < 0 {
                return Err(QpackError::HuffmanDecode("invalid code prefix".into()));
            }
            node = child as usize;
            path_bits += 1;
            path_all_ones &= bit == 1;
            let symbol = trie[node].symbol;
            if symbol >= 0 {
                if symbol as u16 == EOS_SYMBOL {
                    return Err(QpackError::HuffmanDecode("EOS symbol in stream".into()));
                }
                out.push(symbol as u8);
                node = 0;
                path_bits = 0;
                path_all_ones = true;
            }
        }
    }

    if path_bits >= 8 {
        return Err(QpackError::HuffmanDecode("padding longer than 7 bits".into()));
    }
    if path_bits > 0 && !path_all_ones {
        return Err(QpackError::HuffmanDecode("padding contains zero bits".into()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc7541_wwwexample() {
        // RFC 7541 C.4.1: "www.example.com"
        let encoded = huffman_encode(b"www.example.com");
        assert_eq!(
            encoded,
            [0xf1, 0xe3, 0xc2, 0xe5, 0xf2, 0x3a, 0x6b, 0xa0, 0xab, 0x90, 0xf4, 0xff]
        );
        assert_eq!(huffman_decode(&encoded).unwrap(), b"www.example.com");
    }

    #[test]
    fn test_rfc7541_no_cache() {
        // RFC 7541 C.4.2: "no-cache"
        let encoded = huffman_encode(b"no-cache");
        assert_eq!(encoded, [0xa8, 0xeb, 0x10, 0x64, 0x9c, 0xbf]);
        assert_eq!(huffman_decode(&encoded).unwrap(), b"no-cache");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(huffman_encode(b""), Vec::<u8>::new());
        assert_eq!(huffman_decode(b"").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_all_byte_values_roundtrip() {
        let data: Vec<u8> = (0u8..=255).collect();
        let encoded = huffman_encode(&data);
        assert_eq!(huffman_decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_random_roundtrip() {
        for _ in 0..100 {
            let len = fastrand::usize(..256);
            let data: Vec<u8> = (0..len).map(|_| fastrand::u8(..)).collect();
            let encoded = huffman_encode(&data);
            assert_eq!(huffman_decode(&encoded).unwrap(), data, "input {:02x?}", data);
        }
    }

    #[test]
    fn test_invalid_padding_zero_bits() {
        // 'a' is 00011 (5 bits); pad with zeros instead of ones.
        let byte = 0b0001_1000u8;
        assert!(matches!(
            huffman_decode(&[byte]),
            Err(QpackError::HuffmanDecode(_))
        ));
    }

    #[test]
    fn test_full_byte_of_padding_rejected() {
        let mut encoded = huffman_encode(b"a");
        encoded.push(0xFF);
        assert!(matches!(
            huffman_decode(&encoded),
            Err(QpackError::HuffmanDecode(_))
        ));
    }

    #[test]
    fn test_compresses_ascii() {
        let text = b"content-type: text/html; charset=utf-8";
        assert!(huffman_encode(text).len() < text.len());
    }
}
