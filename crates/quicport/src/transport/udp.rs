// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP datagram transport.
//!
//! Two sockets: a bound receive socket with a read timeout, and an
//! ephemeral send socket so outbound traffic never competes with the
//! listener for the bound port.

use super::{DatagramTransport, TransportError};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

/// Maximum datagram size accepted on the receive path.
const MAX_DATAGRAM_SIZE: usize = 65_536;

/// UDP transport bound to a local address, sending to one remote peer.
pub struct UdpTransport {
    /// Receive socket, bound to the local address.
    recv_socket: UdpSocket,
    /// Send socket, bound to an ephemeral port.
    send_socket: UdpSocket,
    /// Destination for `send`.
    remote_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind the receive socket and prepare an ephemeral send socket.
    ///
    /// `read_timeout` bounds every `recv` call; `None` blocks forever.
    pub fn bind(
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
        read_timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&local_addr.into())?;
        let recv_socket: UdpSocket = socket.into();
        recv_socket.set_read_timeout(read_timeout)?;
        log::debug!(
            "[UDP] transport bound local={} remote={} timeout={:?}",
            local_addr,
            remote_addr,
            read_timeout
        );

        let send_socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        send_socket2.set_reuse_address(true)?;
        let ephemeral: SocketAddr = "0.0.0.0:0".parse().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("bind address: {}", e))
        })?;
        send_socket2.bind(&ephemeral.into())?;
        let send_socket: UdpSocket = send_socket2.into();
        log::debug!(
            "[UDP] send socket bound to ephemeral port {}",
            send_socket.local_addr().map(|a| a.port()).unwrap_or(0)
        );

        Ok(Self {
            recv_socket,
            send_socket,
            remote_addr,
        })
    }

    /// Local address of the receive socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.recv_socket.local_addr()
    }

    /// Configured peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}

impl DatagramTransport for UdpTransport {
    fn send(&self, data: &[u8]) -> Result<usize, TransportError> {
        let sent = self.send_socket.send_to(data, self.remote_addr)?;
        log::debug!("[UDP] sent {} bytes -> {}", sent, self.remote_addr);
        Ok(sent)
    }

    fn recv(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, peer) = self.recv_socket.recv_from(&mut buf)?;
        buf.truncate(len);
        log::debug!("[UDP] received {} bytes <- {}", len, peer);
        Ok((buf, peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[test]
    fn test_bind_and_local_addr() {
        let transport =
            UdpTransport::bind(loopback(19090), loopback(19091), None).expect("bind should work");
        assert_eq!(transport.local_addr().unwrap().port(), 19090);
        assert_eq!(transport.remote_addr().port(), 19091);
    }

    #[test]
    fn test_send_and_recv_roundtrip() {
        let a = UdpTransport::bind(
            loopback(19092),
            loopback(19093),
            Some(Duration::from_millis(500)),
        )
        .unwrap();
        let b = UdpTransport::bind(
            loopback(19093),
            loopback(19092),
            Some(Duration::from_millis(500)),
        )
        .unwrap();

        a.send(b"hello").unwrap();
        let (data, _peer) = b.recv().unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn test_recv_timeout_maps_to_timed_out() {
        let t = UdpTransport::bind(
            loopback(19094),
            loopback(19095),
            Some(Duration::from_millis(20)),
        )
        .unwrap();
        match t.recv() {
            Err(TransportError::TimedOut) => {}
            other => panic!("expected TimedOut, got {:?}", other.map(|(d, _)| d.len())),
        }
    }
}
