// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP/3 client facade.
//!
//! Composes the datagram transport, AEAD record layer, QUIC manager, and
//! HTTP/3 connection into a request/response API. A listener thread
//! decrypts inbound datagrams and routes them as HTTP/3 frames, falling
//! back to the legacy `Frame(<content>)` extraction for payloads that do
//! not carry a well-formed frame header; only the modern framed form is
//! ever emitted.

use crate::config::{
    DEFAULT_BIND_ADDR, DEFAULT_KEY_ROTATION_INTERVAL, DEFAULT_REQUEST_TIMEOUT,
    TRANSPORT_READ_TIMEOUT,
};
use crate::error::Error;
use crate::http3::connection::Http3Connection;
use crate::http3::stream::StreamPriority;
use crate::model::Response;
use crate::pipeline::receiver::extract_frame_content;
use crate::quic::manager::{QuicManager, QuicManagerConfig};
use crate::tls::record::{RecordCipher, RecordProtection, TlsConfig};
use crate::transport::{DatagramTransport, TransportError, UdpTransport};
use parking_lot::{Condvar, Mutex};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Client configuration.
pub struct ClientConfig {
    /// Local address the response listener binds to.
    pub bind_addr: SocketAddr,
    /// Peer address requests are sent to.
    pub remote_addr: SocketAddr,
    /// Wall-clock budget for one request/response exchange.
    pub timeout: Duration,
    /// Worker threads in the QUIC manager's pool.
    pub event_loop_max_workers: usize,
    /// Record-layer key material. The all-zero default suits loopback
    /// and test topologies only; production callers supply real keys.
    pub tls: TlsConfig,
    /// Record-layer key rotation interval.
    pub rotation_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let bind_addr: SocketAddr = DEFAULT_BIND_ADDR
            .parse()
            .expect("default bind address is valid");
        Self {
            bind_addr,
            remote_addr: bind_addr,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            event_loop_max_workers: 2,
            tls: TlsConfig::zeroed(),
            rotation_interval: DEFAULT_KEY_ROTATION_INTERVAL,
        }
    }
}

impl ClientConfig {
    /// Bind to a specific local address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Send requests to a specific peer.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = addr;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set explicit record-layer keys.
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }
}

struct ResponseSlot {
    value: Mutex<Option<String>>,
    arrived: Condvar,
}

impl ResponseSlot {
    fn new() -> Self {
        Self {
            value: Mutex::new(None),
            arrived: Condvar::new(),
        }
    }

    fn publish(&self, content: String) {
        *self.value.lock() = Some(content);
        self.arrived.notify_all();
    }

    fn clear(&self) {
        *self.value.lock() = None;
    }

    fn wait(&self, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.value.lock();
        while guard.is_none() {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let result = self.arrived.wait_for(&mut guard, deadline - now);
            if result.timed_out() && guard.is_none() {
                return None;
            }
        }
        guard.clone()
    }
}

/// HTTP/3 client over the full protocol pipeline.
pub struct Client {
    config: ClientConfig,
    transport: Arc<UdpTransport>,
    record: Arc<RecordProtection>,
    manager: Arc<QuicManager>,
    http3: Arc<Http3Connection>,
    response: Arc<ResponseSlot>,
    stop: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl Client {
    /// Build the client and start its response listener.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let transport = Arc::new(
            UdpTransport::bind(
                config.bind_addr,
                config.remote_addr,
                Some(TRANSPORT_READ_TIMEOUT),
            )
            .map_err(|e| Error::Transport(TransportError::Io(e)))?,
        );
        let record = Arc::new(RecordProtection::with_rotation_interval(
            config.tls.clone(),
            config.rotation_interval,
        ));
        let manager = QuicManager::new(QuicManagerConfig {
            connection_id: "default-conn".to_string(),
            event_loop_max_workers: config.event_loop_max_workers,
            ..Default::default()
        })?;
        let http3 = Arc::new(Http3Connection::new(Arc::clone(&manager)));
        let response = Arc::new(ResponseSlot::new());
        let stop = Arc::new(AtomicBool::new(false));

        let listener = {
            let transport = Arc::clone(&transport);
            let record = Arc::clone(&record);
            let http3 = Arc::clone(&http3);
            let response = Arc::clone(&response);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("client-listener".to_string())
                .spawn(move || listen_loop(&transport, &record, &http3, &response, &stop))
                .expect("spawning the client listener cannot fail")
        };

        log::info!(
            "[CLIENT] listening on {} peer {}",
            config.bind_addr,
            config.remote_addr
        );
        Ok(Self {
            config,
            transport,
            record,
            manager,
            http3,
            response,
            stop,
            listener: Some(listener),
        })
    }

    /// The QUIC manager backing this client.
    pub fn quic_manager(&self) -> &Arc<QuicManager> {
        &self.manager
    }

    /// The HTTP/3 connection backing this client.
    pub fn http3_connection(&self) -> &Arc<Http3Connection> {
        &self.http3
    }

    /// Issue a request and wait for the response.
    ///
    /// `params` are urlencoded into the query string. A `priority=high|
    /// medium|low` query parameter maps to stream weights 1/16/256.
    pub fn request(
        &mut self,
        method: &str,
        url: &str,
        params: Option<&[(&str, &str)]>,
    ) -> Result<Response, Error> {
        let url = match params {
            Some(params) if !params.is_empty() => append_params(url, params),
            _ => url.to_string(),
        };
        let priority = priority_from_url(&url);

        self.response.clear();
        let request_body = format!("{} {}", method, url);
        let stream_id = self
            .http3
            .send_request(request_body.as_bytes(), priority, None)?;
        log::info!("[CLIENT] {} {} on stream {}", method, url, stream_id);
        self.flush_outgoing();

        match self.response.wait(self.config.timeout) {
            Some(content) => Ok(Response::new(200, content)),
            None => Ok(Response::new(500, "")),
        }
    }

    /// Seal queued QUIC packets and emit them as datagrams.
    fn flush_outgoing(&self) {
        // Rotation is checked off the request path, on the manager's pool.
        let record = Arc::clone(&self.record);
        self.manager.pool().schedule_task(move || {
            match record.maybe_rotate() {
                Ok(true) => log::info!("[CLIENT] record keys rotated on schedule"),
                Ok(false) => {}
                Err(e) => log::error!("[CLIENT] scheduled key rotation failed: {}", e),
            }
        });
        for packet in self.manager.connection().drain_send_queue() {
            let record = match self.record.encrypt(&packet) {
                Ok(record) => record,
                Err(e) => {
                    log::error!("[CLIENT] record sealing failed: {}", e);
                    continue;
                }
            };
            if let Err(e) = self.transport.send(&record) {
                log::warn!("[CLIENT] datagram send failed: {}", e);
            }
        }
    }

    /// Stop the listener and close the HTTP/3 and QUIC layers.
    pub fn close(&mut self) {
        if self.stop.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(listener) = self.listener.take() {
            let _ = listener.join();
        }
        self.http3.close();
        self.manager.close();
        log::info!("[CLIENT] closed");
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

fn listen_loop(
    transport: &Arc<UdpTransport>,
    record: &Arc<RecordProtection>,
    http3: &Arc<Http3Connection>,
    response: &Arc<ResponseSlot>,
    stop: &Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Acquire) {
        let (datagram, peer) = match transport.recv() {
            Ok(received) => received,
            Err(TransportError::TimedOut) => continue,
            Err(e) => {
                log::warn!("[CLIENT] listener receive failed: {}", e);
                continue;
            }
        };
        log::debug!("[CLIENT] datagram from {} ({} bytes)", peer, datagram.len());

        let plaintext = match record.decrypt(&datagram) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                log::warn!("[CLIENT] dropping undecryptable datagram: {}", e);
                continue;
            }
        };

        match http3.route_incoming_frame(&plaintext) {
            Ok(_) => {
                if let Some(payload) = http3.receive_response() {
                    let content = extract_frame_content(&payload)
                        .unwrap_or_else(|| String::from_utf8_lossy(&payload).into_owned());
                    response.publish(content);
                }
            }
            Err(e) => {
                // Legacy-form payloads carry no frame header; recover the
                // message with the envelope extraction instead.
                if let Some(content) = extract_frame_content(&plaintext) {
                    log::debug!("[CLIENT] legacy payload accepted after: {}", e);
                    response.publish(content);
                } else {
                    log::debug!("[CLIENT] ignoring unroutable datagram: {}", e);
                }
            }
        }
    }
}

/// Append urlencoded parameters to a URL's query string.
fn append_params(url: &str, params: &[(&str, &str)]) -> String {
    let encoded: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect();
    let query = encoded.join("&");
    if url.contains('?') {
        format!("{}&{}", url, query)
    } else {
        format!("{}?{}", url, query)
    }
}

fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

/// Map a `priority=` query parameter onto a stream priority.
fn priority_from_url(url: &str) -> Option<StreamPriority> {
    let query = url.split_once('?')?.1;
    for pair in query.split('&') {
        if let Some(("priority", level)) = pair.split_once('=') {
            let weight = match level {
                "high" => 1,
                "medium" => 16,
                "low" => 256,
                _ => continue,
            };
            return StreamPriority::new(weight, 0).ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_from_url() {
        assert_eq!(
            priority_from_url("https://example.com?priority=high").unwrap().weight,
            1
        );
        assert_eq!(
            priority_from_url("https://example.com?a=b&priority=medium")
                .unwrap()
                .weight,
            16
        );
        assert_eq!(
            priority_from_url("https://example.com?priority=low").unwrap().weight,
            256
        );
        assert!(priority_from_url("https://example.com").is_none());
        assert!(priority_from_url("https://example.com?priority=bogus").is_none());
    }

    #[test]
    fn test_append_params() {
        assert_eq!(
            append_params("https://example.com", &[("a", "1"), ("b", "two words")]),
            "https://example.com?a=1&b=two%20words"
        );
        assert_eq!(
            append_params("https://example.com?x=y", &[("a", "1")]),
            "https://example.com?x=y&a=1"
        );
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("safe-chars_1.2~"), "safe-chars_1.2~");
        assert_eq!(percent_encode("a b/c"), "a%20b%2Fc");
    }
}
