// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QPACK decoder.
//!
//! Walks a header block (without its 2-byte length framing): a set high
//! bit selects the indexed representation (static table first, dynamic
//! table past it); otherwise a literal follows, and literals flagged for
//! incremental indexing are inserted into the decoder's dynamic table.

use super::dynamic_table::DynamicTable;
use super::huffman::huffman_decode;
use super::varint::decode_integer;
use super::{static_table, QpackError};

/// Stateful QPACK header-block decoder.
pub struct QpackDecoder {
    dynamic_table: DynamicTable,
}

impl QpackDecoder {
    /// Decoder with the default dynamic-table budget.
    pub fn new() -> Self {
        Self {
            dynamic_table: DynamicTable::new(),
        }
    }

    /// The decoder's dynamic table.
    pub fn dynamic_table(&self) -> &DynamicTable {
        &self.dynamic_table
    }

    /// Decode a header block into an ordered header list.
    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<(String, String)>, QpackError> {
        let mut headers = Vec::new();
        let mut pos = 0;
        while pos < block.len() {
            let first = block[pos];
            if first & 0x80 != 0 {
                let (index, consumed) = decode_integer(&block[pos..], 6)?;
                pos += consumed;
                let (name, value) = self.resolve_index(index)?;
                log::debug!("[QPACK] decoded indexed {} -> [{}: {}]", index, name, value);
                headers.push((name, value));
            } else {
                let flag = first;
                pos += 1;
                let (name, value, consumed) = Self::decode_literal(&block[pos..])?;
                pos += consumed;
                log::debug!(
                    "[QPACK] decoded literal [{}: {}] flag=0x{:02x}",
                    name,
                    value,
                    flag
                );
                if flag & 0x30 == 0x00 {
                    self.dynamic_table.add(&name, &value)?;
                }
                headers.push((name, value));
            }
        }
        Ok(headers)
    }

    fn resolve_index(&self, index: usize) -> Result<(String, String), QpackError> {
        if let Some((name, value)) = static_table::get(index) {
            return Ok((name.to_string(), value.to_string()));
        }
        let dynamic_index = index.saturating_sub(static_table::STATIC_TABLE_LEN);
        match self.dynamic_table.get(dynamic_index) {
            Some((name, value)) => Ok((name.to_string(), value.to_string())),
            None => Err(QpackError::IndexOutOfRange(index)),
        }
    }

    /// Decode `varint5(len) huffman(name) varint7(len) huffman(value)`.
    fn decode_literal(data: &[u8]) -> Result<(String, String, usize), QpackError> {
        let mut pos = 0;
        let (name_len, consumed) = decode_integer(&data[pos..], 5)?;
        pos += consumed;
        let name_end = pos.checked_add(name_len).ok_or(QpackError::Truncated)?;
        let name_bytes = data.get(pos..name_end).ok_or(QpackError::Truncated)?;
        pos = name_end;
        let name = decode_string(name_bytes)?;

        let (value_len, consumed) = decode_integer(&data[pos..], 7)?;
        pos += consumed;
        let value_end = pos.checked_add(value_len).ok_or(QpackError::Truncated)?;
        let value_bytes = data.get(pos..value_end).ok_or(QpackError::Truncated)?;
        pos = value_end;
        let value = decode_string(value_bytes)?;

        Ok((name, value, pos))
    }
}

impl Default for QpackDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_string(encoded: &[u8]) -> Result<String, QpackError> {
    let bytes = huffman_decode(encoded)?;
    String::from_utf8(bytes)
        .map_err(|_| QpackError::HuffmanDecode("decoded literal is not UTF-8".into()))
}
