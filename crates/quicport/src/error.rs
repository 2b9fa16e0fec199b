// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-level error type.
//!
//! Each layer raises its own error enum; this aggregate carries any of
//! them across the public API and preserves the original as `source()`.

use crate::http3::connection::Http3Error;
use crate::http3::frames::FrameError;
use crate::http3::qpack::QpackError;
use crate::http3::stream::StreamError;
use crate::pipeline::PipelineError;
use crate::quic::connection::ConnectionError;
use crate::quic::features::FeatureError;
use crate::quic::handshake::HandshakeError;
use crate::quic::packet::PacketError;
use crate::tls::record::RecordError;
use crate::transport::TransportError;
use std::fmt;

/// Convenience result alias for the public API.
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure the stack can surface.
#[derive(Debug)]
pub enum Error {
    /// Datagram transport failure.
    Transport(TransportError),
    /// Connection lifecycle violation.
    Connection(ConnectionError),
    /// AEAD record layer failure.
    Record(RecordError),
    /// QUIC packet codec failure.
    Packet(PacketError),
    /// Stream state or lookup failure.
    Stream(StreamError),
    /// QPACK codec failure.
    Qpack(QpackError),
    /// HTTP/3 frame parse failure.
    Frame(FrameError),
    /// HTTP/3 connection protocol violation.
    Http3(Http3Error),
    /// Handshake failure; fatal to the connection.
    Handshake(HandshakeError),
    /// Advanced-feature validation failure.
    Feature(FeatureError),
    /// Pipeline adapter failure wrapping a lower-level cause.
    Pipeline(PipelineError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Connection(e) => write!(f, "connection error: {}", e),
            Self::Record(e) => write!(f, "record layer error: {}", e),
            Self::Packet(e) => write!(f, "packet codec error: {}", e),
            Self::Stream(e) => write!(f, "stream error: {}", e),
            Self::Qpack(e) => write!(f, "QPACK error: {}", e),
            Self::Frame(e) => write!(f, "frame error: {}", e),
            Self::Http3(e) => write!(f, "HTTP/3 error: {}", e),
            Self::Handshake(e) => write!(f, "handshake error: {}", e),
            Self::Feature(e) => write!(f, "feature error: {}", e),
            Self::Pipeline(e) => write!(f, "pipeline error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Connection(e) => Some(e),
            Self::Record(e) => Some(e),
            Self::Packet(e) => Some(e),
            Self::Stream(e) => Some(e),
            Self::Qpack(e) => Some(e),
            Self::Frame(e) => Some(e),
            Self::Http3(e) => Some(e),
            Self::Handshake(e) => Some(e),
            Self::Feature(e) => Some(e),
            Self::Pipeline(e) => Some(e),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

impl From<RecordError> for Error {
    fn from(e: RecordError) -> Self {
        Self::Record(e)
    }
}

impl From<PacketError> for Error {
    fn from(e: PacketError) -> Self {
        Self::Packet(e)
    }
}

impl From<StreamError> for Error {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

impl From<QpackError> for Error {
    fn from(e: QpackError) -> Self {
        Self::Qpack(e)
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

impl From<Http3Error> for Error {
    fn from(e: Http3Error) -> Self {
        Self::Http3(e)
    }
}

impl From<HandshakeError> for Error {
    fn from(e: HandshakeError) -> Self {
        Self::Handshake(e)
    }
}

impl From<FeatureError> for Error {
    fn from(e: FeatureError) -> Self {
        Self::Feature(e)
    }
}

impl From<PipelineError> for Error {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}
