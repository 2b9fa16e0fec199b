// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Individual HTTP/3 stream: state machine, buffer, priority.
//!
//! State transitions are monotonic:
//! `IDLE -> OPEN -> (HALF_CLOSED ->)? CLOSED`, never backwards. The
//! buffer is append-only until `receive_data` drains it atomically.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::fmt;

/// Errors raised by stream operations.
#[derive(Debug)]
pub enum StreamError {
    /// `send_data` outside the OPEN state.
    NotOpen(u64),
    /// Lookup for an unknown stream id.
    NotFound(u64),
    /// Priority weight outside `[1, 256]`.
    InvalidWeight(u16),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOpen(id) => write!(f, "stream {} is not open for sending data", id),
            Self::NotFound(id) => write!(f, "stream {} not found", id),
            Self::InvalidWeight(w) => write!(f, "priority weight {} outside [1, 256]", w),
        }
    }
}

impl std::error::Error for StreamError {}

/// Stream lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StreamState {
    Idle,
    Open,
    HalfClosed,
    Closed,
}

/// Transmission priority for a stream.
///
/// Weight 1 is the most urgent; sorting ascending by weight yields
/// descending urgency. The dependency takes no part in ordering or
/// equality, mirroring how schedulers compare priorities.
#[derive(Debug, Clone, Copy)]
pub struct StreamPriority {
    /// Urgency in `[1, 256]`; 1 is highest.
    pub weight: u16,
    /// Stream this one depends on; 0 means none.
    pub dependency: u64,
}

impl StreamPriority {
    /// Build a priority, validating the weight range.
    pub fn new(weight: u16, dependency: u64) -> Result<Self, StreamError> {
        if !(1..=256).contains(&weight) {
            return Err(StreamError::InvalidWeight(weight));
        }
        Ok(Self { weight, dependency })
    }
}

impl PartialEq for StreamPriority {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight
    }
}

impl Eq for StreamPriority {}

impl PartialOrd for StreamPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StreamPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight.cmp(&other.weight)
    }
}

struct StreamInner {
    state: StreamState,
    buffer: Vec<u8>,
    priority: Option<StreamPriority>,
}

/// A QUIC-level bidirectional byte stream.
pub struct Stream {
    stream_id: u64,
    inner: Mutex<StreamInner>,
}

impl Stream {
    /// Create a stream in the IDLE state.
    pub fn new(stream_id: u64) -> Self {
        Self {
            stream_id,
            inner: Mutex::new(StreamInner {
                state: StreamState::Idle,
                buffer: Vec::new(),
                priority: None,
            }),
        }
    }

    /// Stream identifier.
    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    /// Current state.
    pub fn state(&self) -> StreamState {
        self.inner.lock().state
    }

    /// IDLE -> OPEN. Any other starting state is left untouched.
    pub fn open(&self) {
        let mut inner = self.inner.lock();
        if inner.state != StreamState::Idle {
            log::warn!("[HTTP3] stream {} already opened or closed", self.stream_id);
            return;
        }
        inner.state = StreamState::Open;
        log::info!("[HTTP3] stream {} opened", self.stream_id);
    }

    /// OPEN -> HALF_CLOSED; ignored in any other state.
    pub fn half_close(&self) {
        let mut inner = self.inner.lock();
        if inner.state == StreamState::Open {
            inner.state = StreamState::HalfClosed;
            log::info!("[HTTP3] stream {} half-closed", self.stream_id);
        }
    }

    /// Transition to CLOSED. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.state == StreamState::Closed {
            return;
        }
        inner.state = StreamState::Closed;
        log::info!("[HTTP3] stream {} closed", self.stream_id);
    }

    /// Append data to the stream buffer; legal only while OPEN.
    pub fn send_data(&self, data: &[u8]) -> Result<(), StreamError> {
        let mut inner = self.inner.lock();
        if inner.state != StreamState::Open {
            return Err(StreamError::NotOpen(self.stream_id));
        }
        inner.buffer.extend_from_slice(data);
        log::debug!(
            "[HTTP3] stream {} buffered {} bytes (total {})",
            self.stream_id,
            data.len(),
            inner.buffer.len()
        );
        Ok(())
    }

    /// Atomically return and clear the buffered data.
    pub fn receive_data(&self) -> Vec<u8> {
        let mut inner = self.inner.lock();
        let data = std::mem::take(&mut inner.buffer);
        log::debug!(
            "[HTTP3] stream {} drained {} bytes",
            self.stream_id,
            data.len()
        );
        data
    }

    /// Bytes currently buffered.
    pub fn buffered_len(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    /// Assign a priority.
    pub fn set_priority(&self, priority: StreamPriority) {
        let mut inner = self.inner.lock();
        inner.priority = Some(priority);
        log::info!(
            "[HTTP3] stream {} assigned priority weight {}",
            self.stream_id,
            priority.weight
        );
    }

    /// Current priority, if any.
    pub fn priority(&self) -> Option<StreamPriority> {
        self.inner.lock().priority
    }
}
