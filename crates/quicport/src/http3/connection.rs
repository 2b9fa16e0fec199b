// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP/3 connection facade.
//!
//! Borrows the QUIC manager (never owns it), holds the QPACK encoder
//! state across requests, dispatches incoming frames to their handlers,
//! and remembers the last routed payload as the current response.
//!
//! A malformed frame fails the call; it does not tear the connection
//! down.

use super::frames::{FrameError, Http3Frame};
use super::qpack::{QpackEncoder, QpackEncoderConfig};
use super::stream::{StreamError, StreamPriority};
use crate::error::Error;
use crate::quic::manager::QuicManager;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Protocol violations raised while routing frames.
#[derive(Debug)]
pub enum Http3Error {
    /// Packet shorter than the 3-byte frame header.
    Truncated { got: usize },
    /// Declared payload length exceeds the packet.
    IncompletePayload { declared: usize, got: usize },
    /// Frame payload failed validation.
    Frame(FrameError),
    /// Routed payload could not be delivered to its stream.
    Delivery(StreamError),
}

impl fmt::Display for Http3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { got } => {
                write!(f, "packet too short for frame header: {} bytes", got)
            }
            Self::IncompletePayload { declared, got } => write!(
                f,
                "incomplete frame: declared payload {}, available {}",
                declared, got
            ),
            Self::Frame(e) => write!(f, "frame handling failed: {}", e),
            Self::Delivery(e) => write!(f, "stream delivery failed: {}", e),
        }
    }
}

impl std::error::Error for Http3Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Frame(e) => Some(e),
            Self::Delivery(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FrameError> for Http3Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

/// HTTP/3 connection over a QUIC manager.
pub struct Http3Connection {
    manager: Arc<QuicManager>,
    settings: Mutex<HashMap<String, String>>,
    encoder: Mutex<QpackEncoder>,
    response: Mutex<Option<Vec<u8>>>,
}

impl Http3Connection {
    /// Wrap a QUIC manager with default QPACK settings.
    pub fn new(manager: Arc<QuicManager>) -> Self {
        Self::with_encoder_config(manager, QpackEncoderConfig::default())
    }

    /// Wrap a QUIC manager with explicit QPACK encoder configuration.
    pub fn with_encoder_config(manager: Arc<QuicManager>, config: QpackEncoderConfig) -> Self {
        Self {
            manager,
            settings: Mutex::new(HashMap::new()),
            encoder: Mutex::new(QpackEncoder::with_config(config)),
            response: Mutex::new(None),
        }
    }

    /// The QUIC manager this connection routes through.
    pub fn manager(&self) -> &Arc<QuicManager> {
        &self.manager
    }

    /// Store negotiated settings.
    pub fn negotiate_settings(&self, settings: HashMap<String, String>) {
        log::info!("[HTTP3] negotiated settings: {:?}", settings);
        *self.settings.lock() = settings;
    }

    /// A negotiated setting by key.
    pub fn setting(&self, key: &str) -> Option<String> {
        self.settings.lock().get(key).cloned()
    }

    /// Build and send an HTTP/3 request.
    ///
    /// Allocates a stream (or reuses `stream_id`), QPACK-encodes the
    /// canonical request pseudo-headers, appends the body, and ships the
    /// frame through the manager. Returns the stream id used.
    pub fn send_request(
        &self,
        request_body: &[u8],
        priority: Option<StreamPriority>,
        stream_id: Option<u64>,
    ) -> Result<u64, Error> {
        let stream_manager = self.manager.stream_manager();
        let stream = match stream_id {
            Some(id) => stream_manager.create_stream_with_id(id, priority),
            None => stream_manager.create_stream(priority),
        };

        let headers = vec![
            (":method".to_string(), "GET".to_string()),
            (":path".to_string(), "/index.html".to_string()),
            (":scheme".to_string(), "https".to_string()),
            (":authority".to_string(), "example.com".to_string()),
        ];
        let encoded_headers = self.encoder.lock().encode(&headers)?;

        let mut frame_payload = encoded_headers;
        frame_payload.extend_from_slice(request_body);
        log::info!(
            "[HTTP3] sending request on stream {} ({} bytes)",
            stream.stream_id(),
            frame_payload.len()
        );
        self.manager.send_stream(stream.stream_id(), &frame_payload)?;
        Ok(stream.stream_id())
    }

    /// Parse and dispatch one incoming HTTP/3 packet.
    ///
    /// Layout: `type(1) || length(2, BE) || payload`. When the payload
    /// leads with a 4-byte stream id, the remainder is forwarded to that
    /// stream (created if absent) and remembered as the current
    /// response; otherwise the whole payload is remembered.
    pub fn route_incoming_frame(&self, packet: &[u8]) -> Result<Http3Frame, Http3Error> {
        if packet.len() < 3 {
            return Err(Http3Error::Truncated { got: packet.len() });
        }
        let frame_type = packet[0];
        let payload_length = u16::from_be_bytes([packet[1], packet[2]]) as usize;
        if packet.len() < 3 + payload_length {
            return Err(Http3Error::IncompletePayload {
                declared: payload_length,
                got: packet.len() - 3,
            });
        }
        let payload = &packet[3..3 + payload_length];

        let frame = Http3Frame::parse(frame_type, payload)?;
        log::debug!(
            "[HTTP3] frame type=0x{:02x} handled: {}",
            frame_type,
            String::from_utf8_lossy(&frame.canonical())
        );

        if payload.len() >= 4 {
            let stream_id =
                u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as u64;
            let stream_manager = self.manager.stream_manager();
            let stream = match stream_manager.get_stream(stream_id) {
                Some(stream) => stream,
                None => {
                    log::warn!("[HTTP3] stream {} not found; creating", stream_id);
                    stream_manager.create_stream_with_id(stream_id, None)
                }
            };
            let stream_payload = &payload[4..];
            stream
                .send_data(stream_payload)
                .map_err(Http3Error::Delivery)?;
            log::info!(
                "[HTTP3] dispatched {} bytes to stream {}",
                stream_payload.len(),
                stream_id
            );
            *self.response.lock() = Some(stream_payload.to_vec());
        } else {
            log::warn!("[HTTP3] payload missing stream identifier; kept as response");
            *self.response.lock() = Some(payload.to_vec());
        }
        Ok(frame)
    }

    /// Payload from the last successfully routed frame.
    pub fn receive_response(&self) -> Option<Vec<u8>> {
        self.response.lock().clone()
    }

    /// Close the underlying QUIC connection and every stream.
    pub fn close(&self) {
        self.manager.connection().close();
        self.manager.stream_manager().close_all();
        log::info!("[HTTP3] connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http3::qpack::QpackDecoder;
    use crate::quic::manager::QuicManagerConfig;
    use crate::quic::packet::decode_quic_packet;
    use crate::quic::header::PacketHeader;

    fn connection() -> Http3Connection {
        let manager = QuicManager::new(QuicManagerConfig::default()).unwrap();
        Http3Connection::new(manager)
    }

    #[test]
    fn test_send_request_allocates_stream_one() {
        let conn = connection();
        let stream_id = conn.send_request(b"GET /", None, None).unwrap();
        assert_eq!(stream_id, 1);
        assert!(conn.manager().stream_manager().get_stream(1).is_some());
        conn.manager().close();
    }

    #[test]
    fn test_send_request_with_priority() {
        let conn = connection();
        let priority = StreamPriority::new(1, 0).unwrap();
        let stream_id = conn.send_request(b"body", Some(priority), None).unwrap();
        let stream = conn.manager().stream_manager().get_stream(stream_id).unwrap();
        assert_eq!(stream.priority().unwrap().weight, 1);
        conn.manager().close();
    }

    #[test]
    fn test_request_packet_carries_qpack_block_and_body() {
        let conn = connection();
        conn.send_request(b"PAYLOAD", None, None).unwrap();
        let sent = conn.manager().connection().drain_send_queue();
        assert_eq!(sent.len(), 1);

        let payload = decode_quic_packet(&sent[0]).unwrap();
        let (_, consumed) = PacketHeader::decode(&payload).unwrap();
        let frame = &payload[consumed..];
        // 2-byte length prefix, then the header block, then the body.
        let block_len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
        let mut decoder = QpackDecoder::new();
        let headers = decoder.decode(&frame[2..2 + block_len]).unwrap();
        assert!(headers.contains(&(":method".to_string(), "GET".to_string())));
        assert!(headers.contains(&(":authority".to_string(), "example.com".to_string())));
        assert_eq!(&frame[2 + block_len..], b"PAYLOAD");
        conn.manager().close();
    }

    #[test]
    fn test_route_frame_delivers_to_stream() {
        let conn = connection();
        // DATA frame whose payload is stream id 2 plus bytes.
        let mut payload = 2u32.to_be_bytes().to_vec();
        payload.extend_from_slice(b"response body");
        let frame = Http3Frame::Data { payload }.encode();

        conn.route_incoming_frame(&frame).unwrap();
        let stream = conn.manager().stream_manager().get_stream(2).unwrap();
        assert_eq!(stream.receive_data(), b"response body");
        assert_eq!(conn.receive_response().unwrap(), b"response body");
        conn.manager().close();
    }

    #[test]
    fn test_route_short_payload_kept_as_response() {
        let conn = connection();
        let frame = Http3Frame::Ping { data: "ok".into() }.encode();
        conn.route_incoming_frame(&frame).unwrap();
        assert_eq!(conn.receive_response().unwrap(), b"ok");
        conn.manager().close();
    }

    #[test]
    fn test_route_rejects_truncated_header() {
        let conn = connection();
        assert!(matches!(
            conn.route_incoming_frame(&[0x0A]),
            Err(Http3Error::Truncated { got: 1 })
        ));
        conn.manager().close();
    }

    #[test]
    fn test_route_rejects_incomplete_payload() {
        let conn = connection();
        // Declares 100 bytes but carries 2.
        let packet = [0x0A, 0x00, 100, 1, 2];
        assert!(matches!(
            conn.route_incoming_frame(&packet),
            Err(Http3Error::IncompletePayload { declared: 100, got: 2 })
        ));
        conn.manager().close();
    }

    #[test]
    fn test_route_rejects_malformed_frame() {
        let conn = connection();
        // CLOSE frame with a 2-byte payload (needs >= 4).
        let packet = [0x08, 0x00, 0x02, 0xAA, 0xBB];
        assert!(matches!(
            conn.route_incoming_frame(&packet),
            Err(Http3Error::Frame(_))
        ));
        // The connection survives the malformed frame.
        assert!(conn.manager().connection().is_open());
        conn.manager().close();
    }

    #[test]
    fn test_negotiate_settings() {
        let conn = connection();
        let mut settings = HashMap::new();
        settings.insert("max_streams".to_string(), "16".to_string());
        conn.negotiate_settings(settings);
        assert_eq!(conn.setting("max_streams").unwrap(), "16");
        conn.manager().close();
    }

    #[test]
    fn test_close_closes_connection_and_streams() {
        let conn = connection();
        let stream_id = conn.send_request(b"x", None, None).unwrap();
        let stream = conn.manager().stream_manager().get_stream(stream_id).unwrap();
        conn.close();
        assert!(!conn.manager().connection().is_open());
        assert_eq!(stream.state(), crate::http3::stream::StreamState::Closed);
        conn.manager().close();
    }
}
