// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QUIC composition root.
//!
//! Wires the connection, worker pool, congestion controller,
//! retransmission manager, and handshake FSM together, and owns the two
//! long-lived background threads: the pool runner and the 100 ms
//! retransmission loop.

use super::congestion::{CongestionConfig, CongestionController};
use super::connection::Connection;
use super::features::AdvancedFeatures;
use super::handshake::{HandshakeError, HandshakeFsm};
use super::header::PacketHeader;
use super::packet::{decode_quic_packet, encode_quic_packet, PacketError};
use super::retransmission::{RetransmissionConfig, RetransmissionManager};
use crate::config::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_QUIC_VERSION, DEFAULT_WORKER_THREADS,
    HANDSHAKE_POLL_INTERVAL, RTX_TICK_INTERVAL,
};
use crate::engine::worker_pool::{TaskScheduler, WorkerPool};
use crate::error::Error;
use crate::http3::stream_manager::StreamManager;
use crate::tls::manager::TlsManager;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How the manager drives the handshake at construction.
#[derive(Clone)]
pub struct HandshakeConfig {
    /// Wall-clock budget before aborting with `HandshakeTimeout`.
    pub timeout: Duration,
    /// Version offered in the initial packet.
    pub local_version: String,
    /// TLS manager enabling the TLS_HANDSHAKE branch.
    pub tls_manager: Option<Arc<TlsManager>>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            local_version: DEFAULT_QUIC_VERSION.to_string(),
            tls_manager: None,
        }
    }
}

/// Configuration for [`QuicManager`].
pub struct QuicManagerConfig {
    /// Connection identifier.
    pub connection_id: String,
    /// Header fields prepended to each stream frame (`stream_id` is
    /// overridden per send).
    pub header: PacketHeader,
    /// Worker threads in the pool.
    pub event_loop_max_workers: usize,
    /// `Some` drives the handshake to COMPLETED during construction;
    /// `None` skips it (loopback topologies with no answering peer).
    pub handshake: Option<HandshakeConfig>,
    /// Congestion-controller tuning.
    pub congestion: CongestionConfig,
    /// Retransmission tuning.
    pub retransmission: RetransmissionConfig,
    /// Optional validated feature set.
    pub advanced_features: Option<AdvancedFeatures>,
}

impl Default for QuicManagerConfig {
    fn default() -> Self {
        Self {
            connection_id: "default-conn".to_string(),
            header: PacketHeader::for_stream(1),
            event_loop_max_workers: DEFAULT_WORKER_THREADS,
            handshake: None,
            congestion: CongestionConfig::default(),
            retransmission: RetransmissionConfig::default(),
            advanced_features: None,
        }
    }
}

impl QuicManagerConfig {
    /// Set the connection id.
    pub fn with_connection_id(mut self, id: impl Into<String>) -> Self {
        self.connection_id = id.into();
        self
    }

    /// Enable the handshake drive.
    pub fn with_handshake(mut self, handshake: HandshakeConfig) -> Self {
        self.handshake = Some(handshake);
        self
    }

    /// Set retransmission tuning.
    pub fn with_retransmission(mut self, config: RetransmissionConfig) -> Self {
        self.retransmission = config;
        self
    }
}

/// Manages QUIC communications end to end.
pub struct QuicManager {
    connection: Arc<Connection>,
    pool: Arc<WorkerPool>,
    congestion: Arc<CongestionController>,
    rtx: Arc<RetransmissionManager>,
    header: Mutex<PacketHeader>,
    advanced_features: Option<AdvancedFeatures>,
    negotiated_version: Option<String>,
    pool_runner: Mutex<Option<JoinHandle<()>>>,
    rtx_runner: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl QuicManager {
    /// Build the manager: open the connection, start the pool runner,
    /// optionally drive the handshake, then start the RTX loop.
    pub fn new(config: QuicManagerConfig) -> Result<Arc<Self>, Error> {
        if let Some(features) = &config.advanced_features {
            features.validate()?;
        }

        let connection = Arc::new(Connection::new(config.connection_id.clone()));
        connection.open();

        let pool = Arc::new(WorkerPool::with_workers(config.event_loop_max_workers));
        let pool_for_runner = Arc::clone(&pool);
        let pool_runner = thread::Builder::new()
            .name("quic-pool-runner".to_string())
            .spawn(move || pool_for_runner.run_forever())
            .expect("spawning the pool runner cannot fail");

        let negotiated_version = match &config.handshake {
            Some(handshake_config) => {
                match drive_handshake(&connection, handshake_config) {
                    Ok(fsm) => fsm.negotiated_version().map(str::to_string),
                    Err(e) => {
                        // Construction failed: tear down what we started.
                        connection.close();
                        pool.stop();
                        let _ = pool_runner.join();
                        return Err(e.into());
                    }
                }
            }
            None => None,
        };

        let congestion = Arc::new(CongestionController::new(config.congestion));
        let rtx = Arc::new(RetransmissionManager::new(
            Arc::clone(&congestion),
            config.retransmission,
        ));

        let rtx_connection = Arc::clone(&connection);
        let rtx_manager = Arc::clone(&rtx);
        let rtx_runner = thread::Builder::new()
            .name("quic-rtx-loop".to_string())
            .spawn(move || retransmission_loop(&rtx_connection, &rtx_manager))
            .expect("spawning the rtx loop cannot fail");

        Ok(Arc::new(Self {
            connection,
            pool,
            congestion,
            rtx,
            header: Mutex::new(config.header),
            advanced_features: config.advanced_features,
            negotiated_version,
            pool_runner: Mutex::new(Some(pool_runner)),
            rtx_runner: Mutex::new(Some(rtx_runner)),
            closed: AtomicBool::new(false),
        }))
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// The connection's stream table.
    pub fn stream_manager(&self) -> &Arc<StreamManager> {
        self.connection.stream_manager()
    }

    /// The congestion controller.
    pub fn congestion(&self) -> &Arc<CongestionController> {
        &self.congestion
    }

    /// The retransmission manager.
    pub fn retransmission(&self) -> &Arc<RetransmissionManager> {
        &self.rtx
    }

    /// The worker pool.
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Advanced features carried from configuration.
    pub fn advanced_features(&self) -> Option<&AdvancedFeatures> {
        self.advanced_features.as_ref()
    }

    /// Version agreed during the handshake, if one ran and negotiated.
    pub fn negotiated_version(&self) -> Option<&str> {
        self.negotiated_version.as_deref()
    }

    /// Wrap a stream frame into a QUIC packet and send it.
    ///
    /// The packet is registered for retransmission first; when the
    /// congestion window is exhausted it stays pending and goes out via
    /// the RTX path instead.
    pub fn send_stream(&self, stream_id: u64, stream_frame: &[u8]) -> Result<u64, Error> {
        let mut header = self.header.lock().clone();
        header.set_stream_id(stream_id);
        let mut combined = header.encode();
        combined.extend_from_slice(stream_frame);
        let packet = encode_quic_packet(&combined)?;

        let packet_id = self.rtx.add_packet(packet.clone());
        if self.congestion.can_send(packet.len() as u64) {
            self.connection.send_packet(packet)?;
            log::debug!(
                "[QUIC] sent stream {} packet id={} len={}",
                stream_id,
                packet_id,
                combined.len()
            );
        } else {
            log::warn!(
                "[QUIC] congestion window exceeded; packet {} deferred to retransmission",
                packet_id
            );
        }
        Ok(packet_id)
    }

    /// Queue a raw, already framed packet on the connection.
    pub fn send_packet(&self, packet: Vec<u8>) -> Result<(), Error> {
        self.connection.send_packet(packet)?;
        Ok(())
    }

    /// Process an incoming QUIC packet: decode, parse the stream header,
    /// and deliver the remainder to the stream (created if absent).
    pub fn receive_packet(&self, raw: &[u8]) -> Result<u64, Error> {
        let payload = decode_quic_packet(raw)?;
        let (header, consumed) = PacketHeader::decode(&payload)?;
        let stream_id = header.stream_id().ok_or_else(|| {
            Error::from(PacketError::Malformed("header missing stream_id".into()))
        })?;
        let stream_manager = self.stream_manager();
        let stream = match stream_manager.get_stream(stream_id) {
            Some(stream) => stream,
            None => stream_manager.create_stream_with_id(stream_id, None),
        };
        stream.send_data(&payload[consumed..])?;
        log::debug!(
            "[QUIC] delivered {} bytes to stream {}",
            payload.len() - consumed,
            stream_id
        );
        Ok(stream_id)
    }

    /// Acknowledge a tracked packet and credit the congestion window.
    pub fn acknowledge_packet(&self, packet_id: u64, acked_bytes: u64) {
        self.rtx.mark_acknowledged(packet_id);
        self.congestion.on_ack(acked_bytes);
    }

    /// Close the connection, stop the pool, and join both background
    /// threads. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.connection.close();
        self.pool.stop();
        if let Some(runner) = self.rtx_runner.lock().take() {
            let _ = runner.join();
        }
        if let Some(runner) = self.pool_runner.lock().take() {
            let _ = runner.join();
        }
        log::info!("[QUIC] manager closed");
    }
}

impl Drop for QuicManager {
    fn drop(&mut self) {
        self.close();
    }
}

/// Poll the receive queue until the FSM completes or the budget runs out,
/// re-emitting the initial packet on every poll timeout.
fn drive_handshake(
    connection: &Arc<Connection>,
    config: &HandshakeConfig,
) -> Result<HandshakeFsm, HandshakeError> {
    let mut fsm = HandshakeFsm::with_version(&config.local_version);
    if let Some(tls) = &config.tls_manager {
        fsm = fsm.with_tls_manager(Arc::clone(tls));
    }
    let deadline = Instant::now() + config.timeout;
    fsm.send_initial_packet(connection)?;
    while !fsm.is_completed() {
        if Instant::now() > deadline {
            log::error!("[QUIC] handshake timed out");
            return Err(HandshakeError::Timeout);
        }
        match connection.receive_packet(HANDSHAKE_POLL_INTERVAL) {
            Some(packet) => fsm.process_incoming_packet(connection, &packet)?,
            None => fsm.send_initial_packet(connection)?,
        }
    }
    log::info!("[QUIC] handshake completed successfully");
    Ok(fsm)
}

/// Every 100 ms: expire timeouts and resend what the RTX manager queued.
fn retransmission_loop(connection: &Arc<Connection>, rtx: &Arc<RetransmissionManager>) {
    while connection.is_open() {
        thread::sleep(RTX_TICK_INTERVAL);
        rtx.process_timeouts();
        for (packet_id, packet) in rtx.get_retransmission_packets() {
            match connection.send_packet(packet) {
                Ok(()) => log::info!("[RTX] retransmitted packet {}", packet_id),
                Err(e) => {
                    log::warn!("[RTX] stopping, connection closed: {}", e);
                    return;
                }
            }
        }
    }
}
