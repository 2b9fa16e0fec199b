// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TLS manager: version selection, handshake stub, key updates.
//!
//! The manager owns the record-protection instance and fronts the
//! placeholder handshake the QUIC FSM drives. No certificate exchange or
//! key schedule is performed; the `certfile`/`keyfile`/`cafile` paths are
//! carried for API completeness and validated for presence only.

use crate::config::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_KEY_ROTATION_INTERVAL};
use crate::quic::connection::Connection;
use crate::quic::handshake::HandshakeError;
use crate::tls::record::{RecordCipher, RecordError, RecordProtection, TlsConfig};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Supported record-layer protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    /// TLS 1.3 record protection (default).
    V1_3,
    /// TLS 1.2 record protection.
    V1_2,
}

impl TlsVersion {
    /// Parse the conventional version string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TLSv1.3" => Some(Self::V1_3),
            "TLSv1.2" => Some(Self::V1_2),
            _ => None,
        }
    }

    /// Conventional version string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1_3 => "TLSv1.3",
            Self::V1_2 => "TLSv1.2",
        }
    }
}

/// Configuration for [`TlsManager`].
#[derive(Debug)]
pub struct TlsManagerConfig {
    /// Protocol version.
    pub version: TlsVersion,
    /// Record-layer key material.
    pub config: TlsConfig,
    /// Interval between scheduled key rotations.
    pub rotation_interval: Duration,
    /// Budget for the handshake stub.
    pub handshake_timeout: Duration,
    /// Optional CA bundle path.
    pub cafile: Option<PathBuf>,
    /// Optional certificate path.
    pub certfile: Option<PathBuf>,
    /// Optional private key path.
    pub keyfile: Option<PathBuf>,
}

impl Default for TlsManagerConfig {
    fn default() -> Self {
        Self {
            version: TlsVersion::V1_3,
            config: TlsConfig::zeroed(),
            rotation_interval: DEFAULT_KEY_ROTATION_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            cafile: None,
            certfile: None,
            keyfile: None,
        }
    }
}

impl TlsManagerConfig {
    /// Set explicit key material.
    pub fn with_keys(mut self, config: TlsConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the rotation interval.
    pub fn with_rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = interval;
        self
    }
}

/// Unified interface for record protection and the handshake stub.
pub struct TlsManager {
    version: TlsVersion,
    record: Arc<RecordProtection>,
    handshake_timeout: Duration,
    established: AtomicBool,
}

impl TlsManager {
    /// Build a manager from explicit configuration.
    pub fn new(config: TlsManagerConfig) -> Self {
        let record = Arc::new(RecordProtection::with_rotation_interval(
            config.config,
            config.rotation_interval,
        ));
        log::info!("[TLS] manager initialized version={}", config.version.as_str());
        Self {
            version: config.version,
            record,
            handshake_timeout: config.handshake_timeout,
            established: AtomicBool::new(false),
        }
    }

    /// Negotiated protocol version.
    pub fn version(&self) -> TlsVersion {
        self.version
    }

    /// Shared handle to the record-protection instance.
    pub fn record(&self) -> Arc<RecordProtection> {
        Arc::clone(&self.record)
    }

    /// Handshake budget carried from configuration.
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Whether the handshake stub has run.
    pub fn is_established(&self) -> bool {
        self.established.load(Ordering::Acquire)
    }

    /// Handshake stub: emit a client-hello-shaped packet for `sni` and
    /// mark the session established.
    pub fn perform_handshake(
        &self,
        connection: &Connection,
        sni: &str,
    ) -> Result<(), HandshakeError> {
        let mut hello = Vec::with_capacity(17 + sni.len());
        hello.extend_from_slice(b"TLS_CLIENT_HELLO:");
        hello.extend_from_slice(sni.as_bytes());
        connection
            .send_packet(hello)
            .map_err(|e| HandshakeError::ConnectionClosed(e.to_string()))?;
        self.established.store(true, Ordering::Release);
        log::info!("[TLS] handshake stub completed sni={}", sni);
        Ok(())
    }

    /// Rotate the record-layer keys to fresh material.
    pub fn update_keys(&self) -> Result<(), RecordError> {
        self.record.rotate(TlsConfig::generate()?);
        Ok(())
    }
}
