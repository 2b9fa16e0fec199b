// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end send pipeline: a message entering the encoder must be
//! observable, decrypted and unwrapped, at the datagram boundary.

use parking_lot::Mutex;
use quicport::model::Message;
use quicport::pipeline::sender::{FrameEncoder, Http3Sender, TlsEncryptor};
use quicport::quic::manager::{QuicManager, QuicManagerConfig};
use quicport::quic::packet::decode_quic_packet;
use quicport::tls::record::{RecordCipher, RecordProtection, TlsConfig};
use quicport::transport::{DatagramTransport, TransportError};
use std::net::SocketAddr;
use std::sync::Arc;

/// Captures emitted datagrams in memory.
struct CaptureTransport {
    sent: Mutex<Vec<Vec<u8>>>,
}

impl CaptureTransport {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl DatagramTransport for CaptureTransport {
    fn send(&self, data: &[u8]) -> Result<usize, TransportError> {
        self.sent.lock().push(data.to_vec());
        Ok(data.len())
    }

    fn recv(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        Err(TransportError::TimedOut)
    }
}

#[test]
fn encoded_message_reaches_datagram_boundary_encrypted() {
    let manager = QuicManager::new(QuicManagerConfig::default()).unwrap();
    let record = Arc::new(RecordProtection::new(TlsConfig::zeroed()));

    // Application -> frame -> stream frame -> QUIC packet.
    let encoder = FrameEncoder::new(Http3Sender::new(Arc::clone(&manager), 1));
    encoder.encode(&Message::text("test")).unwrap();

    // Drain the connection and push through the record layer.
    let encryptor = TlsEncryptor::new(CaptureTransport::new(), Arc::clone(&record));
    for packet in manager.connection().drain_send_queue() {
        encryptor.send(&packet).unwrap();
    }

    let datagrams = encryptor.transport().sent.lock().clone();
    assert_eq!(datagrams.len(), 1);

    // The ciphertext itself must not leak the plaintext.
    let needle = b"Frame(test)";
    assert!(
        !datagrams[0]
            .windows(needle.len())
            .any(|w| w == needle),
        "plaintext visible in the encrypted datagram"
    );

    // Decrypt + unwrap: the frame text is present.
    let packet = record.decrypt(&datagrams[0]).unwrap();
    let payload = decode_quic_packet(&packet).unwrap();
    assert!(
        payload.windows(needle.len()).any(|w| w == needle),
        "decrypted payload missing Frame(test): {:?}",
        String::from_utf8_lossy(&payload)
    );

    manager.close();
}

#[test]
fn binary_and_structured_messages_format_deterministically() {
    let manager = QuicManager::new(QuicManagerConfig::default()).unwrap();
    let encoder = FrameEncoder::new(Http3Sender::new(Arc::clone(&manager), 1));

    encoder.encode(&Message::binary(vec![0xAB, 0xCD])).unwrap();
    encoder
        .encode(&Message::structured(vec![(
            "k".to_string(),
            "v".to_string(),
        )]))
        .unwrap();

    let sent = manager.connection().drain_send_queue();
    let first = decode_quic_packet(&sent[0]).unwrap();
    let second = decode_quic_packet(&sent[1]).unwrap();
    let first_text = String::from_utf8_lossy(&first);
    let second_text = String::from_utf8_lossy(&second);
    assert!(first_text.contains("Frame(abcd)"), "{}", first_text);
    assert!(second_text.contains("Frame({k=v})"), "{}", second_text);

    manager.close();
}
