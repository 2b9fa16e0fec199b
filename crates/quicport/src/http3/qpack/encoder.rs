// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QPACK encoder.
//!
//! Emits one header block per call:
//! `u16_be(block_len) || representations...`. Representation selection:
//!
//! 1. Exact static-table match -> indexed (6-bit prefix, high bit set).
//! 2. Exact dynamic-table match -> indexed, index continuing past the
//!    static table.
//! 3. Literal. `authorization`/`cookie` are never indexed (0x10);
//!    pseudo-headers absent from the tables use without-indexing (0x20)
//!    so the dynamic table only learns regular headers; everything else
//!    uses incremental indexing (0x00) and is inserted.
//!
//! An encoder instance is single-owner: callers must not share one
//! across threads without external synchronization.

use super::decoder::QpackDecoder;
use super::dynamic_table::DynamicTable;
use super::huffman::huffman_encode;
use super::varint::encode_integer;
use super::{static_table, QpackError};
use crate::config::DEFAULT_MAX_DYNAMIC_TABLE_SIZE;

/// Indexed-representation marker bit.
const INDEXED_BIT: u8 = 0x80;
/// Literal with incremental indexing.
const FLAG_INCREMENTAL: u8 = 0x00;
/// Literal, never indexed.
const FLAG_NEVER_INDEXED: u8 = 0x10;
/// Literal without indexing.
const FLAG_WITHOUT_INDEXING: u8 = 0x20;

/// Configuration for [`QpackEncoder`].
#[derive(Debug, Clone, Copy)]
pub struct QpackEncoderConfig {
    /// Dynamic-table octet budget.
    pub max_dynamic_table_size: usize,
    /// Round-trip every block through a fresh decoder and compare.
    pub auditing: bool,
}

impl Default for QpackEncoderConfig {
    fn default() -> Self {
        Self {
            max_dynamic_table_size: DEFAULT_MAX_DYNAMIC_TABLE_SIZE,
            auditing: false,
        }
    }
}

impl QpackEncoderConfig {
    /// Enable round-trip auditing.
    pub fn with_auditing(mut self) -> Self {
        self.auditing = true;
        self
    }

    /// Set the dynamic-table budget.
    pub fn with_max_dynamic_table_size(mut self, size: usize) -> Self {
        self.max_dynamic_table_size = size;
        self
    }
}

/// Header names that must never enter any table.
fn is_sensitive(name: &str) -> bool {
    name.eq_ignore_ascii_case("authorization") || name.eq_ignore_ascii_case("cookie")
}

/// Stateful QPACK header-block encoder.
pub struct QpackEncoder {
    dynamic_table: DynamicTable,
    auditing: bool,
}

impl QpackEncoder {
    /// Encoder with default configuration.
    pub fn new() -> Self {
        Self::with_config(QpackEncoderConfig::default())
    }

    /// Encoder with explicit configuration.
    pub fn with_config(config: QpackEncoderConfig) -> Self {
        if config.auditing {
            log::info!("[QPACK] encoder auditing is ENABLED");
        }
        Self {
            dynamic_table: DynamicTable::with_max_size(config.max_dynamic_table_size),
            auditing: config.auditing,
        }
    }

    /// The encoder's dynamic table.
    pub fn dynamic_table(&self) -> &DynamicTable {
        &self.dynamic_table
    }

    /// Encode headers into a length-prefixed block.
    pub fn encode(&mut self, headers: &[(String, String)]) -> Result<Vec<u8>, QpackError> {
        let mut block = Vec::new();
        for (name, value) in headers {
            if let Some(index) = static_table::find(name, value) {
                Self::write_indexed(&mut block, index);
                log::debug!(
                    "[QPACK] encoded [{}: {}] as static indexed (index={})",
                    name,
                    value,
                    index
                );
            } else if let Some(index) = self.dynamic_table.find(name, value) {
                let absolute = static_table::STATIC_TABLE_LEN + index;
                Self::write_indexed(&mut block, absolute);
                log::debug!(
                    "[QPACK] encoded [{}: {}] as dynamic indexed (index={})",
                    name,
                    value,
                    absolute
                );
            } else {
                let flag = if is_sensitive(name) {
                    FLAG_NEVER_INDEXED
                } else if name.starts_with(':') {
                    FLAG_WITHOUT_INDEXING
                } else {
                    FLAG_INCREMENTAL
                };
                Self::write_literal(&mut block, flag, name, value);
                if flag == FLAG_INCREMENTAL {
                    self.dynamic_table.add(name, value)?;
                }
            }
        }

        if self.auditing {
            self.audit(headers, &block)?;
        }

        if block.len() > u16::MAX as usize {
            return Err(QpackError::BlockTooLarge(block.len()));
        }
        let mut out = Vec::with_capacity(2 + block.len());
        out.extend_from_slice(&(block.len() as u16).to_be_bytes());
        out.extend_from_slice(&block);
        log::info!("[QPACK] header block generated (length={})", block.len());
        Ok(out)
    }

    fn write_indexed(block: &mut Vec<u8>, index: usize) {
        let mut bytes = encode_integer(index, 6);
        bytes[0] |= INDEXED_BIT;
        block.extend_from_slice(&bytes);
    }

    fn write_literal(block: &mut Vec<u8>, flag: u8, name: &str, value: &str) {
        block.push(flag);
        let encoded_name = huffman_encode(name.as_bytes());
        block.extend_from_slice(&encode_integer(encoded_name.len(), 5));
        block.extend_from_slice(&encoded_name);
        let encoded_value = huffman_encode(value.as_bytes());
        block.extend_from_slice(&encode_integer(encoded_value.len(), 7));
        block.extend_from_slice(&encoded_value);
        log::debug!(
            "[QPACK] encoded literal [{}: {}] flag=0x{:02x} (name {} bytes, value {} bytes)",
            name,
            value,
            flag,
            encoded_name.len(),
            encoded_value.len()
        );
    }

    /// Round-trip the block through a fresh decoder and compare.
    ///
    /// Names compare case-insensitively because indexed representations
    /// resolve to the tables' lowercase spelling.
    fn audit(&self, headers: &[(String, String)], block: &[u8]) -> Result<(), QpackError> {
        let mut decoder = QpackDecoder::new();
        let decoded = decoder.decode(block)?;
        if decoded.len() != headers.len() {
            return Err(QpackError::AuditMismatch(format!(
                "expected {} headers, decoded {}",
                headers.len(),
                decoded.len()
            )));
        }
        for ((name, value), (decoded_name, decoded_value)) in headers.iter().zip(&decoded) {
            if !name.eq_ignore_ascii_case(decoded_name) || value != decoded_value {
                return Err(QpackError::AuditMismatch(format!(
                    "header '{}' decoded as [{}: {}]",
                    name, decoded_name, decoded_value
                )));
            }
        }
        log::info!("[QPACK] round-trip verification succeeded");
        Ok(())
    }
}

impl Default for QpackEncoder {
    fn default() -> Self {
        Self::new()
    }
}
