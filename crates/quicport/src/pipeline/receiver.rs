// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receive-side pipeline adapters.
//!
//! `TlsDecryptor` opens records, `QuicReceiver` unwraps QUIC packets,
//! `Http3Receiver` extracts the (optionally length-prefixed) frame, and
//! `FrameDecoder` recovers the `Frame(<content>)` text for the consumer.

use super::PipelineError;
use crate::quic::packet::decode_quic_packet;
use crate::tls::record::{RecordCipher, RecordProtection};
use std::sync::Arc;

/// Application-side sink for decoded messages.
pub trait MessageConsumer: Send + Sync {
    /// Accept one decoded message.
    fn consume(&self, message: &str);
}

/// Pull the content out of a `Frame(<content>)` envelope.
///
/// Returns `None` when the prefix is absent; an unterminated envelope
/// yields `None` as well so callers can fall back.
pub fn extract_frame_content(payload: &[u8]) -> Option<String> {
    const PREFIX: &[u8] = b"Frame(";
    let start = payload
        .windows(PREFIX.len())
        .position(|w| w == PREFIX)?
        + PREFIX.len();
    let end = payload[start..].iter().position(|&b| b == b')')? + start;
    Some(String::from_utf8_lossy(&payload[start..end]).into_owned())
}

/// Terminal decoder: extracts the frame content and feeds the consumer.
pub struct FrameDecoder<C: MessageConsumer> {
    consumer: C,
}

impl<C: MessageConsumer> FrameDecoder<C> {
    /// Chain onto a consumer.
    pub fn new(consumer: C) -> Self {
        Self { consumer }
    }

    /// Decode one payload and deliver the message.
    ///
    /// Payloads without a well-formed envelope deliver `"Unknown"`, the
    /// way a lenient reader treats junk on a demo wire.
    pub fn decode(&self, payload: &[u8]) -> Result<(), PipelineError> {
        let message = match extract_frame_content(payload) {
            Some(content) => content,
            None => {
                log::warn!("[PIPE] frame envelope not found; delivering 'Unknown'");
                "Unknown".to_string()
            }
        };
        log::info!("[PIPE] decoder extracted message: {}", message);
        self.consumer.consume(&message);
        Ok(())
    }
}

/// Extracts the HTTP/3 frame from a decoded QUIC payload.
pub struct Http3Receiver<C: MessageConsumer> {
    decoder: FrameDecoder<C>,
}

impl<C: MessageConsumer> Http3Receiver<C> {
    /// Chain onto a frame decoder.
    pub fn new(decoder: FrameDecoder<C>) -> Self {
        Self { decoder }
    }

    /// Validate and unwrap one frame, then hand it down.
    ///
    /// When the payload leads with a 2-byte length prefix covering the
    /// remainder, the prefixed region is the frame; otherwise the whole
    /// payload is.
    pub fn receive(&self, payload: &[u8]) -> Result<(), PipelineError> {
        if payload.is_empty() {
            return Err(PipelineError::Decoding("empty HTTP/3 payload".into()));
        }
        let frame = if payload.len() >= 2 {
            let declared = u16::from_be_bytes([payload[0], payload[1]]) as usize;
            if payload.len() >= 2 + declared && declared > 0 {
                &payload[2..2 + declared]
            } else {
                payload
            }
        } else {
            payload
        };
        log::debug!("[PIPE] http3 receiver extracted {} byte frame", frame.len());
        self.decoder.decode(frame)
    }
}

/// Unwraps QUIC packets and delegates the stream frame.
pub struct QuicReceiver<C: MessageConsumer> {
    http3: Http3Receiver<C>,
}

impl<C: MessageConsumer> QuicReceiver<C> {
    /// Chain onto an HTTP/3 receiver.
    pub fn new(http3: Http3Receiver<C>) -> Self {
        Self { http3 }
    }

    /// Decode one QUIC packet and hand its payload down.
    pub fn receive(&self, packet: &[u8]) -> Result<(), PipelineError> {
        let payload = decode_quic_packet(packet)
            .map_err(|e| PipelineError::Decoding(Box::new(e)))?;
        self.http3.receive(&payload)
    }
}

/// Opens AEAD records and delegates the QUIC packet.
pub struct TlsDecryptor<C: MessageConsumer> {
    record: Arc<RecordProtection>,
    quic: QuicReceiver<C>,
}

impl<C: MessageConsumer> TlsDecryptor<C> {
    /// Chain a record layer onto a QUIC receiver.
    pub fn new(record: Arc<RecordProtection>, quic: QuicReceiver<C>) -> Self {
        Self { record, quic }
    }

    /// Open one record and hand the packet down.
    pub fn decrypt(&self, datagram: &[u8]) -> Result<(), PipelineError> {
        let packet = self
            .record
            .decrypt(datagram)
            .map_err(|e| PipelineError::Decoding(Box::new(e)))?;
        self.quic.receive(&packet)
    }
}
