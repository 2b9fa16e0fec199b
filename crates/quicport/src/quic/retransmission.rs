// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Retransmission manager.
//!
//! Tracks in-flight packets, detects timeouts, and queues resends. Each
//! expiry counts as one loss event against the congestion controller;
//! packets that exhaust their retry budget are dropped.

use super::congestion::CongestionController;
use crate::config::{DEFAULT_MAX_RETRIES, DEFAULT_RTX_TIMEOUT};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tunables for [`RetransmissionManager`].
#[derive(Debug, Clone, Copy)]
pub struct RetransmissionConfig {
    /// Age after which a pending packet times out.
    pub timeout_interval: Duration,
    /// Retries before a packet is abandoned.
    pub max_retries: u32,
}

impl Default for RetransmissionConfig {
    fn default() -> Self {
        Self {
            timeout_interval: DEFAULT_RTX_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetransmissionConfig {
    /// Set the timeout interval.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_interval = timeout;
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

struct PendingPacket {
    data: Vec<u8>,
    sent_at: Instant,
    retries: u32,
}

struct RtxState {
    pending: HashMap<u64, PendingPacket>,
    rtx_queue: VecDeque<u64>,
    next_packet_id: u64,
}

/// Tracks unacknowledged packets and produces resend batches.
pub struct RetransmissionManager {
    congestion: Arc<CongestionController>,
    config: RetransmissionConfig,
    state: Mutex<RtxState>,
}

impl RetransmissionManager {
    /// Create a manager wired to a congestion controller.
    pub fn new(congestion: Arc<CongestionController>, config: RetransmissionConfig) -> Self {
        Self {
            congestion,
            config,
            state: Mutex::new(RtxState {
                pending: HashMap::new(),
                rtx_queue: VecDeque::new(),
                next_packet_id: 0,
            }),
        }
    }

    /// Track a freshly sent packet; returns its id.
    pub fn add_packet(&self, packet: Vec<u8>) -> u64 {
        let mut state = self.state.lock();
        let packet_id = state.next_packet_id;
        state.next_packet_id += 1;
        state.pending.insert(
            packet_id,
            PendingPacket {
                data: packet,
                sent_at: Instant::now(),
                retries: 0,
            },
        );
        packet_id
    }

    /// Stop tracking an acknowledged packet. No-op for unknown ids.
    pub fn mark_acknowledged(&self, packet_id: u64) {
        let mut state = self.state.lock();
        if state.pending.remove(&packet_id).is_some() {
            log::debug!("[RTX] packet {} acknowledged", packet_id);
        }
    }

    /// Scan pending packets for timeouts.
    ///
    /// Timed-out packets within budget are queued for resend and reported
    /// to the congestion controller as loss events; exhausted packets are
    /// dropped.
    pub fn process_timeouts(&self) {
        let mut losses: Vec<u64> = Vec::new();
        {
            let mut state = self.state.lock();
            let now = Instant::now();
            let timeout = self.config.timeout_interval;
            let max_retries = self.config.max_retries;

            enum Action {
                Resend(u64),
                Drop,
                Keep,
            }

            let ids: Vec<u64> = state.pending.keys().copied().collect();
            for packet_id in ids {
                let action = {
                    let packet = state
                        .pending
                        .get_mut(&packet_id)
                        .expect("id was just collected");
                    if now.duration_since(packet.sent_at) > timeout && packet.retries < max_retries
                    {
                        packet.retries += 1;
                        packet.sent_at = now;
                        Action::Resend(packet.data.len() as u64)
                    } else if packet.retries >= max_retries {
                        Action::Drop
                    } else {
                        Action::Keep
                    }
                };
                match action {
                    Action::Resend(len) => {
                        state.rtx_queue.push_back(packet_id);
                        losses.push(len);
                        log::debug!("[RTX] packet {} timed out; queued for resend", packet_id);
                    }
                    Action::Drop => {
                        state.pending.remove(&packet_id);
                        log::warn!(
                            "[RTX] packet {} exceeded {} retries; dropped",
                            packet_id,
                            max_retries
                        );
                    }
                    Action::Keep => {}
                }
            }
        }
        // Loss accounting happens outside the state lock so congestion
        // callbacks cannot deadlock against add/ack paths.
        for loss_bytes in losses {
            self.congestion.on_loss(loss_bytes);
        }
    }

    /// Drain the resend queue, returning `(id, bytes)` for packets still
    /// pending.
    pub fn get_retransmission_packets(&self) -> Vec<(u64, Vec<u8>)> {
        let mut state = self.state.lock();
        let mut packets = Vec::new();
        while let Some(packet_id) = state.rtx_queue.pop_front() {
            if let Some(packet) = state.pending.get(&packet_id) {
                packets.push((packet_id, packet.data.clone()));
            }
        }
        packets
    }

    /// Number of packets currently tracked.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Clear all tracking state.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.pending.clear();
        state.rtx_queue.clear();
        state.next_packet_id = 0;
    }
}
