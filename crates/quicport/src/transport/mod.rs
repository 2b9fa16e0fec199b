// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram transport abstraction.
//!
//! One datagram equals one AEAD record; no additional framing happens on
//! the UDP side. The concrete socket wrapper lives in [`udp`], everything
//! above it talks to the [`DatagramTransport`] trait.

mod udp;

pub use udp::UdpTransport;

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// Errors raised by the datagram layer.
#[derive(Debug)]
pub enum TransportError {
    /// No datagram arrived within the configured read timeout.
    TimedOut,
    /// Socket-level send/receive failure.
    Io(io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut => write!(f, "datagram receive timed out"),
            Self::Io(e) => write!(f, "datagram I/O error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::TimedOut => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::TimedOut,
            _ => Self::Io(e),
        }
    }
}

/// Abstract send/recv over raw datagrams.
pub trait DatagramTransport: Send + Sync {
    /// Send one datagram to the configured peer.
    fn send(&self, data: &[u8]) -> Result<usize, TransportError>;

    /// Receive one datagram, returning the bytes and the sender address.
    fn recv(&self) -> Result<(Vec<u8>, SocketAddr), TransportError>;
}
