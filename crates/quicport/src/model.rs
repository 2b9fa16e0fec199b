// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Application-level message and response models.
//!
//! A [`Message`] is produced by the application, consumed exactly once by
//! the frame encoder, and never mutated after construction. Its content is
//! a closed sum over the payload shapes the encoder knows how to format
//! deterministically.

use std::fmt;

/// Payload carried by a [`Message`].
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// UTF-8 text payload.
    Text(String),
    /// Opaque binary payload, formatted as lowercase hex.
    Binary(Vec<u8>),
    /// Ordered key/value pairs, formatted in insertion order.
    Structured(Vec<(String, String)>),
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Text(s) => f.write_str(s),
            Content::Binary(bytes) => {
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Content::Structured(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Message handed to the send pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    content: Content,
}

impl Message {
    /// Build a text message.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Content::Text(content.into()),
        }
    }

    /// Build a binary message.
    pub fn binary(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: Content::Binary(content.into()),
        }
    }

    /// Build a structured key/value message.
    pub fn structured(pairs: Vec<(String, String)>) -> Self {
        Self {
            content: Content::Structured(pairs),
        }
    }

    /// Borrow the payload.
    pub fn content(&self) -> &Content {
        &self.content
    }
}

/// Response returned by [`Client::request`](crate::Client::request).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP-style status code (200 on success, 500 when no payload arrived).
    pub status: u16,
    /// Decoded response content.
    pub content: String,
}

impl Response {
    /// Construct a response.
    pub fn new(status: u16, content: impl Into<String>) -> Self {
        Self {
            status,
            content: content.into(),
        }
    }

    /// Whether the exchange produced a payload.
    pub fn ok(&self) -> bool {
        self.status == 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_display() {
        let msg = Message::text("test");
        assert_eq!(msg.content().to_string(), "test");
    }

    #[test]
    fn test_binary_display_is_hex() {
        let msg = Message::binary(vec![0xde, 0xad, 0x01]);
        assert_eq!(msg.content().to_string(), "dead01");
    }

    #[test]
    fn test_structured_display_preserves_order() {
        let msg = Message::structured(vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ]);
        assert_eq!(msg.content().to_string(), "{b=2, a=1}");
    }

    #[test]
    fn test_response_ok() {
        assert!(Response::new(200, "body").ok());
        assert!(!Response::new(500, "").ok());
    }
}
