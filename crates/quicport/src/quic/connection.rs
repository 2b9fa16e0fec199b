// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QUIC connection core.
//!
//! Owns the outbound send queue (bytes destined for the datagram layer)
//! and a condvar-guarded inbound queue. FIFO in both directions; the
//! connection itself never reorders. `close()` is the sole cancellation
//! mechanism: it wakes every blocked receiver, which then drain the
//! remaining queue and observe end-of-stream.

use crate::http3::stream_manager::StreamManager;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Errors raised by connection operations.
#[derive(Debug)]
pub enum ConnectionError {
    /// Operation requires an open connection.
    NotOpen(String),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOpen(id) => write!(f, "connection {} is not open", id),
        }
    }
}

impl std::error::Error for ConnectionError {}

struct ConnectionState {
    is_open: bool,
    send_queue: VecDeque<Vec<u8>>,
    recv_queue: VecDeque<Vec<u8>>,
}

/// A QUIC connection: lifecycle, send/receive queues, stream table.
pub struct Connection {
    connection_id: String,
    state: Mutex<ConnectionState>,
    recv_cv: Condvar,
    stream_manager: Arc<StreamManager>,
}

impl Connection {
    /// Create a connection in the closed state.
    pub fn new(connection_id: impl Into<String>) -> Self {
        let connection_id = connection_id.into();
        log::info!("[QUIC] connection {} initialized", connection_id);
        Self {
            connection_id,
            state: Mutex::new(ConnectionState {
                is_open: false,
                send_queue: VecDeque::new(),
                recv_queue: VecDeque::new(),
            }),
            recv_cv: Condvar::new(),
            stream_manager: Arc::new(StreamManager::new()),
        }
    }

    /// Connection identifier.
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Stream table owned by this connection.
    pub fn stream_manager(&self) -> &Arc<StreamManager> {
        &self.stream_manager
    }

    /// Transition closed -> open. Idempotent.
    pub fn open(&self) {
        let mut state = self.state.lock();
        if !state.is_open {
            state.is_open = true;
            log::info!("[QUIC] connection {} opened", self.connection_id);
        }
    }

    /// Whether the connection is currently open.
    pub fn is_open(&self) -> bool {
        self.state.lock().is_open
    }

    /// Close the connection and wake every blocked receiver. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if !state.is_open {
            return;
        }
        state.is_open = false;
        drop(state);
        self.recv_cv.notify_all();
        log::info!("[QUIC] connection {} closed", self.connection_id);
    }

    /// Append a packet to the outbound queue.
    pub fn send_packet(&self, packet: Vec<u8>) -> Result<(), ConnectionError> {
        let mut state = self.state.lock();
        if !state.is_open {
            return Err(ConnectionError::NotOpen(self.connection_id.clone()));
        }
        log::debug!(
            "[QUIC] connection {} queued outbound packet len={}",
            self.connection_id,
            packet.len()
        );
        state.send_queue.push_back(packet);
        Ok(())
    }

    /// Enqueue an inbound packet and signal waiters.
    pub fn process_packet(&self, packet: Vec<u8>) -> Result<(), ConnectionError> {
        let mut state = self.state.lock();
        if !state.is_open {
            return Err(ConnectionError::NotOpen(self.connection_id.clone()));
        }
        log::debug!(
            "[QUIC] connection {} queued inbound packet len={}",
            self.connection_id,
            packet.len()
        );
        state.recv_queue.push_back(packet);
        drop(state);
        self.recv_cv.notify_all();
        Ok(())
    }

    /// Wait up to `timeout` for an inbound packet.
    ///
    /// Returns `None` when the timeout elapses, or immediately after the
    /// remaining queue drains on a closed connection.
    pub fn receive_packet(&self, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(packet) = state.recv_queue.pop_front() {
                return Some(packet);
            }
            if !state.is_open {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                log::debug!(
                    "[QUIC] connection {} receive_packet timed out",
                    self.connection_id
                );
                return None;
            }
            let result = self.recv_cv.wait_for(&mut state, deadline - now);
            if result.timed_out() && state.recv_queue.is_empty() {
                return None;
            }
        }
    }

    /// Drain the outbound queue, FIFO order.
    pub fn drain_send_queue(&self) -> Vec<Vec<u8>> {
        let mut state = self.state.lock();
        state.send_queue.drain(..).collect()
    }

    /// Number of packets waiting on the outbound queue.
    pub fn pending_send_count(&self) -> usize {
        self.state.lock().send_queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn open_connection() -> Connection {
        let c = Connection::new("test-conn");
        c.open();
        c
    }

    #[test]
    fn test_starts_closed() {
        let c = Connection::new("closed");
        assert!(!c.is_open());
        assert!(c.send_packet(b"x".to_vec()).is_err());
    }

    #[test]
    fn test_open_close_idempotent() {
        let c = open_connection();
        c.open();
        assert!(c.is_open());
        c.close();
        c.close();
        assert!(!c.is_open());
    }

    #[test]
    fn test_send_after_close_fails() {
        let c = open_connection();
        c.close();
        assert!(matches!(
            c.send_packet(b"late".to_vec()),
            Err(ConnectionError::NotOpen(_))
        ));
    }

    #[test]
    fn test_send_queue_fifo() {
        let c = open_connection();
        c.send_packet(b"first".to_vec()).unwrap();
        c.send_packet(b"second".to_vec()).unwrap();
        let drained = c.drain_send_queue();
        assert_eq!(drained, vec![b"first".to_vec(), b"second".to_vec()]);
        assert_eq!(c.pending_send_count(), 0);
    }

    #[test]
    fn test_receive_returns_queued_packet() {
        let c = open_connection();
        c.process_packet(b"ping".to_vec()).unwrap();
        let got = c.receive_packet(Duration::from_millis(10));
        assert_eq!(got, Some(b"ping".to_vec()));
    }

    #[test]
    fn test_receive_fifo_order() {
        let c = open_connection();
        c.process_packet(b"a".to_vec()).unwrap();
        c.process_packet(b"b".to_vec()).unwrap();
        assert_eq!(c.receive_packet(Duration::from_millis(10)), Some(b"a".to_vec()));
        assert_eq!(c.receive_packet(Duration::from_millis(10)), Some(b"b".to_vec()));
    }

    #[test]
    fn test_receive_times_out_empty() {
        let c = open_connection();
        let start = Instant::now();
        assert_eq!(c.receive_packet(Duration::from_millis(50)), None);
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn test_receive_unblocked_by_sender() {
        let c = Arc::new(open_connection());
        let producer = Arc::clone(&c);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.process_packet(b"wakeup".to_vec()).unwrap();
        });
        let got = c.receive_packet(Duration::from_secs(2));
        assert_eq!(got, Some(b"wakeup".to_vec()));
        handle.join().unwrap();
    }

    #[test]
    fn test_close_unblocks_receiver() {
        let c = Arc::new(open_connection());
        let closer = Arc::clone(&c);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            closer.close();
        });
        let start = Instant::now();
        let got = c.receive_packet(Duration::from_secs(5));
        assert_eq!(got, None);
        assert!(start.elapsed() < Duration::from_secs(1), "close must unblock early");
        handle.join().unwrap();
    }

    #[test]
    fn test_closed_connection_drains_remaining_queue() {
        let c = open_connection();
        c.process_packet(b"leftover".to_vec()).unwrap();
        c.close();
        assert_eq!(
            c.receive_packet(Duration::from_millis(10)),
            Some(b"leftover".to_vec())
        );
        assert_eq!(c.receive_packet(Duration::from_millis(10)), None);
    }
}
