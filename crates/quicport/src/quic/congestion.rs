// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CUBIC-style congestion control.
//!
//! Slow start grows the window by the acknowledged byte count; congestion
//! avoidance follows the cubic target `origin + C * t^3` anchored at the
//! last loss event. On loss: `ssthresh = max(cwnd * beta, min_cwnd)` and
//! the window collapses to `ssthresh`. The window never drops below
//! `2 * mss`.

use crate::config::{CUBIC_CONSTANT, DEFAULT_BETA, DEFAULT_MSS, INITIAL_CWND_MSS, MIN_CWND_MSS};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

/// Tunables for [`CongestionController`].
#[derive(Debug, Clone, Copy)]
pub struct CongestionConfig {
    /// Maximum segment size in octets.
    pub mss: u64,
    /// Multiplicative decrease factor on loss.
    pub beta: f64,
    /// Cubic growth constant.
    pub cubic_constant: f64,
    /// Window floor; defaults to `2 * mss`.
    pub min_cwnd: Option<u64>,
    /// Initial window; defaults to `10 * mss`.
    pub initial_cwnd: Option<u64>,
    /// Initial slow-start threshold; defaults to unbounded.
    pub initial_ssthresh: Option<u64>,
}

impl Default for CongestionConfig {
    fn default() -> Self {
        Self {
            mss: DEFAULT_MSS,
            beta: DEFAULT_BETA,
            cubic_constant: CUBIC_CONSTANT,
            min_cwnd: None,
            initial_cwnd: None,
            initial_ssthresh: None,
        }
    }
}

impl CongestionConfig {
    /// Set the segment size.
    pub fn with_mss(mut self, mss: u64) -> Self {
        self.mss = mss;
        self
    }

    /// Set an explicit initial window.
    pub fn with_initial_cwnd(mut self, cwnd: u64) -> Self {
        self.initial_cwnd = Some(cwnd);
        self
    }
}

/// Callback invoked after each loss event with `(new_cwnd, loss_bytes)`.
type LossCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

struct WindowState {
    cwnd: u64,
    ssthresh: u64,
    origin_point: u64,
    last_congestion_time: Instant,
}

/// Thread-safe CUBIC-style congestion controller.
pub struct CongestionController {
    mss: u64,
    beta: f64,
    cubic_constant: f64,
    min_cwnd: u64,
    initial_cwnd: u64,
    initial_ssthresh: u64,
    state: Mutex<WindowState>,
    loss_callbacks: Mutex<Vec<LossCallback>>,
}

impl CongestionController {
    /// Create a controller from configuration.
    pub fn new(config: CongestionConfig) -> Self {
        let min_cwnd = config.min_cwnd.unwrap_or(MIN_CWND_MSS * config.mss);
        let initial_cwnd = config.initial_cwnd.unwrap_or(INITIAL_CWND_MSS * config.mss);
        let initial_ssthresh = config.initial_ssthresh.unwrap_or(u64::MAX);
        Self {
            mss: config.mss,
            beta: config.beta,
            cubic_constant: config.cubic_constant,
            min_cwnd,
            initial_cwnd,
            initial_ssthresh,
            state: Mutex::new(WindowState {
                cwnd: initial_cwnd,
                ssthresh: initial_ssthresh,
                origin_point: initial_cwnd,
                last_congestion_time: Instant::now(),
            }),
            loss_callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Segment size the controller was built with.
    pub fn mss(&self) -> u64 {
        self.mss
    }

    /// Current congestion window in octets.
    pub fn cwnd(&self) -> u64 {
        self.state.lock().cwnd
    }

    /// Current slow-start threshold in octets.
    pub fn ssthresh(&self) -> u64 {
        self.state.lock().ssthresh
    }

    /// Whether `packet_size` octets fit in the current window.
    pub fn can_send(&self, packet_size: u64) -> bool {
        packet_size <= self.state.lock().cwnd
    }

    /// Account for `acked_bytes` octets leaving the network.
    pub fn on_ack(&self, acked_bytes: u64) {
        let mut state = self.state.lock();
        if state.cwnd < state.ssthresh {
            state.cwnd = state.cwnd.saturating_add(acked_bytes);
        } else {
            let t = state.last_congestion_time.elapsed().as_secs_f64();
            let target = state.origin_point as f64 + self.cubic_constant * t.powi(3);
            let target = if target >= u64::MAX as f64 {
                u64::MAX
            } else {
                target as u64
            };
            state.cwnd = state.cwnd.max(target);
        }
        if state.cwnd < self.min_cwnd {
            state.cwnd = self.min_cwnd;
        }
        log::debug!("[CC] ack {} bytes cwnd={}", acked_bytes, state.cwnd);
    }

    /// Register a loss event of `loss_bytes` octets.
    pub fn on_loss(&self, loss_bytes: u64) {
        let new_cwnd = {
            let mut state = self.state.lock();
            let reduced = (state.cwnd as f64 * self.beta) as u64;
            state.ssthresh = reduced.max(self.min_cwnd);
            state.origin_point = state.cwnd;
            state.last_congestion_time = Instant::now();
            state.cwnd = state.ssthresh;
            state.cwnd
        };
        log::debug!("[CC] loss {} bytes cwnd={}", loss_bytes, new_cwnd);

        // Callbacks run outside the window lock; a panicking callback
        // must not take the controller down with it.
        let callbacks = self.loss_callbacks.lock();
        for callback in callbacks.iter() {
            if catch_unwind(AssertUnwindSafe(|| callback(new_cwnd, loss_bytes))).is_err() {
                log::error!("[CC] loss callback panicked; continuing");
            }
        }
    }

    /// Register a callback invoked after each loss event.
    pub fn register_loss_callback<F>(&self, callback: F)
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        self.loss_callbacks.lock().push(Box::new(callback));
    }

    /// Restore the initial window state.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.cwnd = self.initial_cwnd;
        state.ssthresh = self.initial_ssthresh;
        state.origin_point = self.initial_cwnd;
        state.last_congestion_time = Instant::now();
    }
}

impl Default for CongestionController {
    fn default() -> Self {
        Self::new(CongestionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_initial_window() {
        let cc = CongestionController::default();
        assert_eq!(cc.cwnd(), 10 * DEFAULT_MSS);
        assert_eq!(cc.ssthresh(), u64::MAX);
    }

    #[test]
    fn test_slow_start_adds_acked_bytes() {
        let cc = CongestionController::default();
        let before = cc.cwnd();
        cc.on_ack(1000);
        assert_eq!(cc.cwnd(), before + 1000);
    }

    #[test]
    fn test_loss_applies_beta_and_floor() {
        let cc = CongestionController::default();
        let before = cc.cwnd();
        cc.on_loss(1460);
        let expected = ((before as f64 * 0.7) as u64).max(2 * DEFAULT_MSS);
        assert_eq!(cc.cwnd(), expected);
        assert_eq!(cc.ssthresh(), expected);
    }

    #[test]
    fn test_repeated_loss_never_below_min_cwnd() {
        let cc = CongestionController::default();
        for _ in 0..64 {
            cc.on_loss(100);
            assert!(cc.cwnd() >= 2 * DEFAULT_MSS);
        }
        assert_eq!(cc.cwnd(), 2 * DEFAULT_MSS);
    }

    #[test]
    fn test_mixed_ack_loss_keeps_invariant() {
        let cc = CongestionController::default();
        for i in 0..200 {
            if i % 3 == 0 {
                cc.on_loss(50);
            } else {
                cc.on_ack(fastrand::u64(..4096));
            }
            assert!(cc.cwnd() >= 2 * DEFAULT_MSS, "cwnd fell below the floor");
        }
    }

    #[test]
    fn test_congestion_avoidance_never_shrinks_window() {
        let cc = CongestionController::default();
        cc.on_loss(0); // enter congestion avoidance (cwnd == ssthresh)
        let before = cc.cwnd();
        cc.on_ack(1);
        assert!(cc.cwnd() >= before);
    }

    #[test]
    fn test_can_send_respects_window() {
        let cc = CongestionController::default();
        assert!(cc.can_send(cc.cwnd()));
        assert!(!cc.can_send(cc.cwnd() + 1));
    }

    #[test]
    fn test_loss_callback_receives_new_window() {
        let cc = CongestionController::default();
        let seen_cwnd = Arc::new(AtomicU64::new(0));
        let seen_bytes = Arc::new(AtomicU64::new(0));
        let (c1, b1) = (Arc::clone(&seen_cwnd), Arc::clone(&seen_bytes));
        cc.register_loss_callback(move |cwnd, bytes| {
            c1.store(cwnd, Ordering::SeqCst);
            b1.store(bytes, Ordering::SeqCst);
        });

        cc.on_loss(777);
        assert_eq!(seen_cwnd.load(Ordering::SeqCst), cc.cwnd());
        assert_eq!(seen_bytes.load(Ordering::SeqCst), 777);
    }

    #[test]
    fn test_loss_callback_panic_is_isolated() {
        let cc = CongestionController::default();
        let fired = Arc::new(AtomicU64::new(0));
        let fired2 = Arc::clone(&fired);
        cc.register_loss_callback(|_, _| panic!("callback bug"));
        cc.register_loss_callback(move |_, _| {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        cc.on_loss(10);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let cc = CongestionController::default();
        cc.on_loss(100);
        cc.reset();
        assert_eq!(cc.cwnd(), 10 * DEFAULT_MSS);
        assert_eq!(cc.ssthresh(), u64::MAX);
    }

    #[test]
    fn test_custom_mss_scales_floor() {
        let cc = CongestionController::new(CongestionConfig::default().with_mss(500));
        for _ in 0..32 {
            cc.on_loss(0);
        }
        assert_eq!(cc.cwnd(), 1000);
    }
}
