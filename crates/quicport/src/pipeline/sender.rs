// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Send-side pipeline adapters.
//!
//! `FrameEncoder` turns a [`Message`] into its `Frame(<content>)` wire
//! form; `Http3Sender` maps the frame onto an HTTP/3 stream and hands it
//! to the QUIC manager; `TlsEncryptor` seals finished QUIC packets into
//! records and emits them as datagrams.

use super::PipelineError;
use crate::model::Message;
use crate::quic::manager::QuicManager;
use crate::tls::record::{RecordCipher, RecordProtection};
use crate::transport::DatagramTransport;
use std::sync::Arc;

/// Downstream hop accepting encoded frames.
pub trait FrameSink: Send + Sync {
    /// Forward one encoded frame.
    fn send_frame(&self, frame: &[u8]) -> Result<(), PipelineError>;
}

/// Encodes messages into frames and forwards them.
pub struct FrameEncoder<S: FrameSink> {
    sink: S,
}

impl<S: FrameSink> FrameEncoder<S> {
    /// Chain onto a frame sink.
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Encode one message and forward it.
    pub fn encode(&self, message: &Message) -> Result<(), PipelineError> {
        let frame = format!("Frame({})", message.content()).into_bytes();
        log::info!("[PIPE] encoder produced frame ({} bytes)", frame.len());
        self.sink.send_frame(&frame)
    }
}

/// Maps frames onto an HTTP/3 stream via the QUIC manager.
pub struct Http3Sender {
    manager: Arc<QuicManager>,
    stream_id: u64,
}

impl Http3Sender {
    /// Sender bound to one stream.
    pub fn new(manager: Arc<QuicManager>, stream_id: u64) -> Self {
        Self { manager, stream_id }
    }
}

impl FrameSink for Http3Sender {
    fn send_frame(&self, frame: &[u8]) -> Result<(), PipelineError> {
        let mut stream_frame =
            format!("HTTP3Stream(stream_id={}, payload=", self.stream_id).into_bytes();
        stream_frame.extend_from_slice(frame);
        stream_frame.push(b')');
        log::info!(
            "[PIPE] mapped frame onto stream {} ({} bytes)",
            self.stream_id,
            stream_frame.len()
        );
        self.manager
            .send_stream(self.stream_id, &stream_frame)
            .map(|_| ())
            .map_err(|e| PipelineError::Transmission(Box::new(e)))
    }
}

/// Seals QUIC packets into AEAD records and emits them as datagrams.
pub struct TlsEncryptor<T: DatagramTransport> {
    transport: T,
    record: Arc<RecordProtection>,
}

impl<T: DatagramTransport> TlsEncryptor<T> {
    /// Chain a record layer onto a datagram transport.
    pub fn new(transport: T, record: Arc<RecordProtection>) -> Self {
        Self { transport, record }
    }

    /// Seal and send one QUIC packet.
    pub fn send(&self, quic_packet: &[u8]) -> Result<(), PipelineError> {
        let record = self
            .record
            .encrypt(quic_packet)
            .map_err(|e| PipelineError::Encoding(Box::new(e)))?;
        self.transport
            .send(&record)
            .map_err(|e| PipelineError::Transmission(Box::new(e)))?;
        Ok(())
    }

    /// The transport backing this encryptor.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}
