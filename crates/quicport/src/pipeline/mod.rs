// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pipeline adapters.
//!
//! Two mirror-image chains glue the layers together:
//!
//! ```text
//! send:    Message -> FrameEncoder -> Http3Sender -> QuicManager
//!                  -> TlsEncryptor -> datagram transport
//! receive: datagram -> TlsDecryptor -> QuicReceiver -> Http3Receiver
//!                   -> FrameDecoder -> consumer
//! ```
//!
//! Adapter failures wrap the lower-level error as their cause.

pub mod receiver;
pub mod sender;

pub use receiver::{
    extract_frame_content, FrameDecoder, Http3Receiver, MessageConsumer, QuicReceiver,
    TlsDecryptor,
};
pub use sender::{FrameEncoder, FrameSink, Http3Sender, TlsEncryptor};

use std::fmt;

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the pipeline adapters.
#[derive(Debug)]
pub enum PipelineError {
    /// Failure while building or encrypting an outbound frame.
    Encoding(Cause),
    /// Failure while decoding an inbound record, packet, or frame.
    Decoding(Cause),
    /// Failure while handing bytes to the next hop.
    Transmission(Cause),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encoding(e) => write!(f, "encoding failed: {}", e),
            Self::Decoding(e) => write!(f, "decoding failed: {}", e),
            Self::Transmission(e) => write!(f, "transmission failed: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Encoding(e) | Self::Decoding(e) | Self::Transmission(e) => {
                Some(e.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}
