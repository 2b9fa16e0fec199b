// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP/3 layer: stream lifecycle and priority, frame type dispatch, the
//! connection facade, and QPACK header compression.

pub mod connection;
pub mod frames;
pub mod qpack;
pub mod stream;
pub mod stream_manager;

pub use connection::{Http3Connection, Http3Error};
pub use frames::{FrameError, Http3Frame};
pub use stream::{Stream, StreamError, StreamPriority, StreamState};
pub use stream_manager::StreamManager;
