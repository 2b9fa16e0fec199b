// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP/3 frame types.
//!
//! Wire layout: `type(1) || length(2, BE) || payload`. Each known type
//! validates its payload shape and canonicalizes to a stable textual
//! form (`CLOSE(code,reason)` and friends); unknown types are preserved
//! verbatim.

use std::fmt;

/// Frame type octets.
pub const FRAME_TYPE_CANCEL: u8 = 0x07;
pub const FRAME_TYPE_CLOSE: u8 = 0x08;
pub const FRAME_TYPE_CONTROL: u8 = 0x09;
pub const FRAME_TYPE_DATA: u8 = 0x0A;
pub const FRAME_TYPE_ERROR: u8 = 0x0B;
pub const FRAME_TYPE_GOAWAY: u8 = 0x0C;
pub const FRAME_TYPE_PING: u8 = 0x0D;
pub const FRAME_TYPE_PRIORITY: u8 = 0x0E;
pub const FRAME_TYPE_PRIORITY_UPDATE: u8 = 0x0F;
pub const FRAME_TYPE_RESET: u8 = 0x10;
pub const FRAME_TYPE_SETTINGS: u8 = 0x11;

/// Errors raised while parsing a frame payload.
#[derive(Debug)]
pub enum FrameError {
    /// Payload shorter than the type requires.
    Truncated { frame_type: u8, needed: usize, got: usize },
    /// A textual field was not valid UTF-8.
    InvalidUtf8(u8),
    /// Field-level validation failed.
    Malformed(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated {
                frame_type,
                needed,
                got,
            } => write!(
                f,
                "payload too short for frame type 0x{:02x}: need {}, got {}",
                frame_type, needed, got
            ),
            Self::InvalidUtf8(frame_type) => {
                write!(f, "invalid UTF-8 in frame type 0x{:02x}", frame_type)
            }
            Self::Malformed(msg) => write!(f, "malformed frame: {}", msg),
        }
    }
}

impl std::error::Error for FrameError {}

/// A parsed HTTP/3 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Http3Frame {
    Cancel { stream_id: u32 },
    Close { error_code: u32, reason: String },
    Control { control_code: u8, data: String },
    Data { payload: Vec<u8> },
    Error { error_code: u32, message: String },
    GoAway { last_stream_id: u32, error_code: u32, reason: String },
    Ping { data: String },
    Priority { stream_id: u32, weight: u8, dependency: u32 },
    PriorityUpdate { stream_id: u32, weight: u8 },
    Reset { stream_id: u32, error_code: u32 },
    Settings { entries: Vec<(String, String)> },
    Unknown { frame_type: u8, payload: Vec<u8> },
}

fn require(frame_type: u8, payload: &[u8], needed: usize) -> Result<(), FrameError> {
    if payload.len() < needed {
        return Err(FrameError::Truncated {
            frame_type,
            needed,
            got: payload.len(),
        });
    }
    Ok(())
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn utf8(frame_type: u8, bytes: &[u8]) -> Result<String, FrameError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| FrameError::InvalidUtf8(frame_type))
}

fn parse_settings(payload_str: &str) -> Result<Vec<(String, String)>, FrameError> {
    let mut entries = Vec::new();
    for pair in payload_str.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| FrameError::Malformed(format!("invalid settings pair: {}", pair)))?;
        entries.push((key.trim().to_string(), value.trim().to_string()));
    }
    Ok(entries)
}

impl Http3Frame {
    /// Parse a payload for the given frame type.
    pub fn parse(frame_type: u8, payload: &[u8]) -> Result<Self, FrameError> {
        match frame_type {
            FRAME_TYPE_CANCEL => {
                require(frame_type, payload, 4)?;
                let stream_id = be_u32(payload);
                if stream_id == 0 {
                    return Err(FrameError::Malformed(
                        "CANCEL stream_id must be positive".into(),
                    ));
                }
                Ok(Self::Cancel { stream_id })
            }
            FRAME_TYPE_CLOSE => {
                require(frame_type, payload, 4)?;
                Ok(Self::Close {
                    error_code: be_u32(payload),
                    reason: utf8(frame_type, &payload[4..])?,
                })
            }
            FRAME_TYPE_CONTROL => {
                require(frame_type, payload, 1)?;
                Ok(Self::Control {
                    control_code: payload[0],
                    data: utf8(frame_type, &payload[1..])?,
                })
            }
            FRAME_TYPE_DATA => Ok(Self::Data {
                payload: payload.to_vec(),
            }),
            FRAME_TYPE_ERROR => {
                require(frame_type, payload, 4)?;
                Ok(Self::Error {
                    error_code: be_u32(payload),
                    message: utf8(frame_type, &payload[4..])?,
                })
            }
            FRAME_TYPE_GOAWAY => {
                require(frame_type, payload, 8)?;
                Ok(Self::GoAway {
                    last_stream_id: be_u32(payload),
                    error_code: be_u32(&payload[4..]),
                    reason: utf8(frame_type, &payload[8..])?,
                })
            }
            FRAME_TYPE_PING => Ok(Self::Ping {
                data: utf8(frame_type, payload)?,
            }),
            FRAME_TYPE_PRIORITY => {
                require(frame_type, payload, 9)?;
                let weight = payload[4];
                if weight == 0 {
                    return Err(FrameError::Malformed("PRIORITY weight must be >= 1".into()));
                }
                Ok(Self::Priority {
                    stream_id: be_u32(payload),
                    weight,
                    dependency: be_u32(&payload[5..]),
                })
            }
            FRAME_TYPE_PRIORITY_UPDATE => {
                require(frame_type, payload, 5)?;
                Ok(Self::PriorityUpdate {
                    stream_id: be_u32(payload),
                    weight: payload[4],
                })
            }
            FRAME_TYPE_RESET => {
                require(frame_type, payload, 8)?;
                Ok(Self::Reset {
                    stream_id: be_u32(payload),
                    error_code: be_u32(&payload[4..]),
                })
            }
            FRAME_TYPE_SETTINGS => {
                if payload.is_empty() {
                    return Err(FrameError::Malformed("empty SETTINGS payload".into()));
                }
                let text = utf8(frame_type, payload)?;
                Ok(Self::Settings {
                    entries: parse_settings(&text)?,
                })
            }
            other => Ok(Self::Unknown {
                frame_type: other,
                payload: payload.to_vec(),
            }),
        }
    }

    /// Frame type octet.
    pub fn frame_type(&self) -> u8 {
        match self {
            Self::Cancel { .. } => FRAME_TYPE_CANCEL,
            Self::Close { .. } => FRAME_TYPE_CLOSE,
            Self::Control { .. } => FRAME_TYPE_CONTROL,
            Self::Data { .. } => FRAME_TYPE_DATA,
            Self::Error { .. } => FRAME_TYPE_ERROR,
            Self::GoAway { .. } => FRAME_TYPE_GOAWAY,
            Self::Ping { .. } => FRAME_TYPE_PING,
            Self::Priority { .. } => FRAME_TYPE_PRIORITY,
            Self::PriorityUpdate { .. } => FRAME_TYPE_PRIORITY_UPDATE,
            Self::Reset { .. } => FRAME_TYPE_RESET,
            Self::Settings { .. } => FRAME_TYPE_SETTINGS,
            Self::Unknown { frame_type, .. } => *frame_type,
        }
    }

    /// Serialize the payload (without the type/length header).
    fn payload_bytes(&self) -> Vec<u8> {
        match self {
            Self::Cancel { stream_id } => stream_id.to_be_bytes().to_vec(),
            Self::Close { error_code, reason } => {
                let mut out = error_code.to_be_bytes().to_vec();
                out.extend_from_slice(reason.as_bytes());
                out
            }
            Self::Control { control_code, data } => {
                let mut out = vec![*control_code];
                out.extend_from_slice(data.as_bytes());
                out
            }
            Self::Data { payload } => payload.clone(),
            Self::Error {
                error_code,
                message,
            } => {
                let mut out = error_code.to_be_bytes().to_vec();
                out.extend_from_slice(message.as_bytes());
                out
            }
            Self::GoAway {
                last_stream_id,
                error_code,
                reason,
            } => {
                let mut out = last_stream_id.to_be_bytes().to_vec();
                out.extend_from_slice(&error_code.to_be_bytes());
                out.extend_from_slice(reason.as_bytes());
                out
            }
            Self::Ping { data } => data.as_bytes().to_vec(),
            Self::Priority {
                stream_id,
                weight,
                dependency,
            } => {
                let mut out = stream_id.to_be_bytes().to_vec();
                out.push(*weight);
                out.extend_from_slice(&dependency.to_be_bytes());
                out
            }
            Self::PriorityUpdate { stream_id, weight } => {
                let mut out = stream_id.to_be_bytes().to_vec();
                out.push(*weight);
                out
            }
            Self::Reset {
                stream_id,
                error_code,
            } => {
                let mut out = stream_id.to_be_bytes().to_vec();
                out.extend_from_slice(&error_code.to_be_bytes());
                out
            }
            Self::Settings { entries } => {
                let text: Vec<String> =
                    entries.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                text.join(";").into_bytes()
            }
            Self::Unknown { payload, .. } => payload.clone(),
        }
    }

    /// Serialize as `type(1) || length(2, BE) || payload`.
    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload_bytes();
        let mut out = Vec::with_capacity(3 + payload.len());
        out.push(self.frame_type());
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(&payload);
        out
    }

    /// Stable textual form, e.g. `CLOSE(code,reason)`.
    pub fn canonical(&self) -> Vec<u8> {
        let text = match self {
            Self::Cancel { stream_id } => format!("CANCEL({})", stream_id),
            Self::Close { error_code, reason } => format!("CLOSE({},{})", error_code, reason),
            Self::Control { control_code, data } => format!("CONTROL({},{})", control_code, data),
            Self::Data { payload } => format!("DATA({})", hex(payload)),
            Self::Error {
                error_code,
                message,
            } => format!("ERROR({},{})", error_code, message),
            Self::GoAway {
                last_stream_id,
                error_code,
                reason,
            } => format!("GOAWAY({},{},{})", last_stream_id, error_code, reason),
            Self::Ping { data } => format!("PING({})", data),
            Self::Priority {
                stream_id,
                weight,
                dependency,
            } => format!("PRIORITY({},{},{})", stream_id, weight, dependency),
            Self::PriorityUpdate { stream_id, weight } => {
                format!("PRIORITY_UPDATE({},{})", stream_id, weight)
            }
            Self::Reset {
                stream_id,
                error_code,
            } => format!("RESET({},{})", stream_id, error_code),
            Self::Settings { entries } => {
                let pairs: Vec<String> =
                    entries.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                format!("SETTINGS({})", pairs.join(";"))
            }
            Self::Unknown { payload, .. } => format!("UNKNOWN({})", hex(payload)),
        };
        text.into_bytes()
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_roundtrip() {
        let frame = Http3Frame::Cancel { stream_id: 7 };
        let encoded = frame.encode();
        assert_eq!(encoded[0], FRAME_TYPE_CANCEL);
        assert_eq!(u16::from_be_bytes([encoded[1], encoded[2]]), 4);
        let parsed = Http3Frame::parse(encoded[0], &encoded[3..]).unwrap();
        assert_eq!(parsed, frame);
        assert_eq!(parsed.canonical(), b"CANCEL(7)");
    }

    #[test]
    fn test_cancel_rejects_zero_stream() {
        assert!(matches!(
            Http3Frame::parse(FRAME_TYPE_CANCEL, &[0, 0, 0, 0]),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn test_close_canonical() {
        let frame = Http3Frame::parse(FRAME_TYPE_CLOSE, &[0, 0, 0, 9, b'b', b'y', b'e']).unwrap();
        assert_eq!(frame.canonical(), b"CLOSE(9,bye)");
    }

    #[test]
    fn test_close_underrun() {
        assert!(matches!(
            Http3Frame::parse(FRAME_TYPE_CLOSE, &[0, 0]),
            Err(FrameError::Truncated { needed: 4, got: 2, .. })
        ));
    }

    #[test]
    fn test_close_invalid_utf8() {
        assert!(matches!(
            Http3Frame::parse(FRAME_TYPE_CLOSE, &[0, 0, 0, 1, 0xFF, 0xFE]),
            Err(FrameError::InvalidUtf8(FRAME_TYPE_CLOSE))
        ));
    }

    #[test]
    fn test_control_frame() {
        let frame = Http3Frame::parse(FRAME_TYPE_CONTROL, b"\x02resume").unwrap();
        assert_eq!(frame.canonical(), b"CONTROL(2,resume)");
    }

    #[test]
    fn test_data_frame_is_opaque() {
        let frame = Http3Frame::parse(FRAME_TYPE_DATA, &[0xde, 0xad]).unwrap();
        assert_eq!(frame.canonical(), b"DATA(dead)");
    }

    #[test]
    fn test_goaway_frame() {
        let mut payload = 5u32.to_be_bytes().to_vec();
        payload.extend_from_slice(&2u32.to_be_bytes());
        payload.extend_from_slice(b"shutting down");
        let frame = Http3Frame::parse(FRAME_TYPE_GOAWAY, &payload).unwrap();
        assert_eq!(frame.canonical(), b"GOAWAY(5,2,shutting down)");
    }

    #[test]
    fn test_ping_empty_and_text() {
        assert_eq!(
            Http3Frame::parse(FRAME_TYPE_PING, b"").unwrap().canonical(),
            b"PING()"
        );
        assert_eq!(
            Http3Frame::parse(FRAME_TYPE_PING, b"ka").unwrap().canonical(),
            b"PING(ka)"
        );
    }

    #[test]
    fn test_priority_frame_roundtrip() {
        let frame = Http3Frame::Priority {
            stream_id: 3,
            weight: 1,
            dependency: 0,
        };
        let encoded = frame.encode();
        let parsed = Http3Frame::parse(encoded[0], &encoded[3..]).unwrap();
        assert_eq!(parsed, frame);
        assert_eq!(parsed.canonical(), b"PRIORITY(3,1,0)");
    }

    #[test]
    fn test_priority_rejects_zero_weight() {
        let mut payload = 3u32.to_be_bytes().to_vec();
        payload.push(0);
        payload.extend_from_slice(&0u32.to_be_bytes());
        assert!(matches!(
            Http3Frame::parse(FRAME_TYPE_PRIORITY, &payload),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn test_priority_update_frame() {
        let frame = Http3Frame::parse(FRAME_TYPE_PRIORITY_UPDATE, &[0, 0, 0, 1, 32]).unwrap();
        assert_eq!(frame.canonical(), b"PRIORITY_UPDATE(1,32)");
    }

    #[test]
    fn test_reset_frame() {
        let mut payload = 4u32.to_be_bytes().to_vec();
        payload.extend_from_slice(&8u32.to_be_bytes());
        let frame = Http3Frame::parse(FRAME_TYPE_RESET, &payload).unwrap();
        assert_eq!(frame.canonical(), b"RESET(4,8)");
    }

    #[test]
    fn test_settings_parse_and_canonical() {
        let frame =
            Http3Frame::parse(FRAME_TYPE_SETTINGS, b"max_streams=10; qpack=1;").unwrap();
        assert_eq!(
            frame,
            Http3Frame::Settings {
                entries: vec![
                    ("max_streams".into(), "10".into()),
                    ("qpack".into(), "1".into()),
                ]
            }
        );
        assert_eq!(frame.canonical(), b"SETTINGS(max_streams=10;qpack=1)");
    }

    #[test]
    fn test_settings_rejects_empty_and_bad_pairs() {
        assert!(Http3Frame::parse(FRAME_TYPE_SETTINGS, b"").is_err());
        assert!(Http3Frame::parse(FRAME_TYPE_SETTINGS, b"novalue").is_err());
    }

    #[test]
    fn test_unknown_frame_preserved() {
        let frame = Http3Frame::parse(0x42, &[1, 2, 3]).unwrap();
        assert_eq!(
            frame,
            Http3Frame::Unknown {
                frame_type: 0x42,
                payload: vec![1, 2, 3]
            }
        );
        assert_eq!(frame.canonical(), b"UNKNOWN(010203)");
        assert_eq!(frame.encode()[0], 0x42);
    }

    #[test]
    fn test_all_known_frames_roundtrip_through_encode() {
        let frames = vec![
            Http3Frame::Cancel { stream_id: 1 },
            Http3Frame::Close { error_code: 0, reason: "done".into() },
            Http3Frame::Control { control_code: 9, data: "x".into() },
            Http3Frame::Data { payload: vec![1, 2] },
            Http3Frame::Error { error_code: 404, message: "nf".into() },
            Http3Frame::GoAway { last_stream_id: 9, error_code: 1, reason: String::new() },
            Http3Frame::Ping { data: String::new() },
            Http3Frame::Priority { stream_id: 2, weight: 16, dependency: 1 },
            Http3Frame::PriorityUpdate { stream_id: 2, weight: 1 },
            Http3Frame::Reset { stream_id: 3, error_code: 2 },
            Http3Frame::Settings { entries: vec![("k".into(), "v".into())] },
        ];
        for frame in frames {
            let encoded = frame.encode();
            let len = u16::from_be_bytes([encoded[1], encoded[2]]) as usize;
            assert_eq!(encoded.len(), 3 + len);
            let parsed = Http3Frame::parse(encoded[0], &encoded[3..]).unwrap();
            assert_eq!(parsed, frame);
        }
    }
}
