// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # quicport - Client-side QUIC + HTTP/3 protocol stack
//!
//! A pure Rust implementation of a client-side QUIC and HTTP/3 pipeline:
//! stream multiplexing, CUBIC-style congestion control, retransmission,
//! QPACK header compression with Huffman coding, and an AEAD-protected
//! record layer over plain UDP datagrams.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quicport::{Client, ClientConfig, Result};
//!
//! fn main() -> Result<()> {
//!     let mut client = Client::new(ClientConfig::default())?;
//!     let response = client.request("GET", "https://example.com", None)?;
//!     println!("status={} body={}", response.status, response.content);
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Application Layer                           |
//! |        Client -> request()/Response | Message producers            |
//! +--------------------------------------------------------------------+
//! |                          HTTP/3 Layer                              |
//! |  Frame dispatch | Stream lifecycle + priority | QPACK + Huffman    |
//! +--------------------------------------------------------------------+
//! |                           QUIC Layer                               |
//! |  Packet codec | Connection queues | Congestion | RTX | Handshake   |
//! +--------------------------------------------------------------------+
//! |                       Record / Transport                           |
//! |        AES-256-GCM records (seq-derived nonce) | UDP datagrams     |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Entry point: composes the full send/receive pipeline |
//! | [`QuicManager`] | QUIC composition root (connection, congestion, RTX) |
//! | [`Http3Connection`] | Frame routing, request emission, QPACK state |
//! | [`RecordProtection`] | AEAD record layer with scheduled key rotation |
//! | [`StreamManager`] | Thread-safe stream table with monotonic IDs |
//!
//! ## Modules Overview
//!
//! - [`client`] - High-level request/response facade (start here)
//! - [`http3`] - Frames, streams, connection, QPACK compression
//! - [`quic`] - Packet codec, connection, congestion, retransmission
//! - [`tls`] - AEAD record protection and the handshake stub
//! - [`transport`] - Abstract datagram transport and the UDP binding
//! - [`pipeline`] - Encoder/sender and receiver/decoder adapter chains
//! - [`engine`] - Cooperative worker pool driving timers and I/O

/// High-level request/response client facade.
pub mod client;
/// Protocol constants and default configuration values.
pub mod config;
/// Cooperative worker pool (task scheduling, background runner).
pub mod engine;
/// Crate-level error aggregation.
pub mod error;
/// HTTP/3 layer: frames, streams, connection, QPACK.
pub mod http3;
/// Application message and response models.
pub mod model;
/// Pipeline adapters gluing encoder/sender and receiver/decoder chains.
pub mod pipeline;
/// QUIC layer: packet codec, connection, congestion control, RTX, handshake.
pub mod quic;
/// TLS record protection (AEAD) and handshake stub.
pub mod tls;
/// Datagram transport abstraction and UDP implementation.
pub mod transport;

pub use client::{Client, ClientConfig};
pub use error::{Error, Result};
pub use http3::connection::Http3Connection;
pub use http3::stream::{Stream, StreamPriority, StreamState};
pub use http3::stream_manager::StreamManager;
pub use model::{Content, Message, Response};
pub use quic::manager::{QuicManager, QuicManagerConfig};
pub use tls::record::{RecordCipher, RecordProtection, TlsConfig};
