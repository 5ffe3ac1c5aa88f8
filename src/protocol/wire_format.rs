//! Wire format encoding and decoding.
//!
//! Implements the 8-byte header format:
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────┬──────────┐
//! │ Sentinel │ Msg Type │ Info     │ Reserved │ Length   │
//! │ 1 byte   │ 1 byte   │ 1 byte   │ 1 byte   │ 4 bytes  │
//! │ 0x03     │ 0-7      │ flags    │          │ u32 LE   │
//! └──────────┴──────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! The payload length is Little Endian. Bit 7 of the info byte marks the
//! length as an estimate that must be reconciled after parsing the payload.

use crate::error::{HomewireError, Result};

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Sentinel byte that starts every well-formed header.
pub const SENTINEL: u8 = 0x03;

/// Default maximum payload size (16 MiB).
///
/// Anything above this is treated as stream corruption, not a real frame.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Info byte flags.
pub mod info {
    /// Payload length is an estimate; the true length is derived from the
    /// records actually parsed.
    pub const ESTIMATED: u8 = 0b1000_0000;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(info: u8, flag: u8) -> bool {
        info & flag != 0
    }
}

/// Message type code from the frame header (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Plain text reply (commands, auth replies).
    Text = 0,
    /// Opaque binary payload.
    Binary = 1,
    /// Table of (UUID, f64 value) state updates.
    ValueStates = 2,
    /// Table of (UUID, icon UUID, text) state updates.
    TextStates = 3,
    /// Table of daytimer schedule updates.
    DaytimerStates = 4,
    /// Server is going out of service.
    OutOfService = 5,
    /// Keepalive acknowledgement.
    Keepalive = 6,
    /// Weather data (opaque to this crate).
    Weather = 7,
}

impl MessageType {
    /// All message types, in code order.
    pub const ALL: [MessageType; 8] = [
        MessageType::Text,
        MessageType::Binary,
        MessageType::ValueStates,
        MessageType::TextStates,
        MessageType::DaytimerStates,
        MessageType::OutOfService,
        MessageType::Keepalive,
        MessageType::Weather,
    ];

    /// Decode a type code. Returns `None` for codes outside the closed set.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// The wire code for this type.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the payload is a structured event table.
    #[inline]
    pub fn is_table(self) -> bool {
        matches!(
            self,
            MessageType::ValueStates | MessageType::TextStates | MessageType::DaytimerStates
        )
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Message type code.
    pub msg_type: MessageType,
    /// Info flags byte (see [`info`]).
    pub info: u8,
    /// Payload length in bytes (may be an estimate, see [`Header::is_estimated`]).
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(msg_type: MessageType, info: u8, payload_length: u32) -> Self {
        Self {
            msg_type,
            info,
            payload_length,
        }
    }

    /// Encode header to bytes.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = SENTINEL;
        buf[1] = self.msg_type.code();
        buf[2] = self.info;
        buf[4..8].copy_from_slice(&self.payload_length.to_le_bytes());
        buf
    }

    /// Decode a header from the start of `buf`.
    ///
    /// Returns `None` if the buffer is too short, the sentinel does not
    /// match, or the type code is outside the closed set. A `None` here
    /// means the caller should resynchronize, not fail.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        if buf[0] != SENTINEL {
            return None;
        }
        let msg_type = MessageType::from_code(buf[1])?;
        Some(Self {
            msg_type,
            info: buf[2],
            payload_length: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// Whether the declared payload length is an estimate.
    #[inline]
    pub fn is_estimated(&self) -> bool {
        info::has_flag(self.info, info::ESTIMATED)
    }

    /// Validate the declared length against the configured bound.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(HomewireError::Protocol(format!(
                "payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }
        Ok(())
    }
}

/// Encode an outbound text command as a complete frame.
///
/// Commands (keepalive probes, token auth, update subscription) travel as
/// text-typed frames with a UTF-8 payload.
pub fn encode_command(cmd: &str) -> Vec<u8> {
    let payload = cmd.as_bytes();
    let header = Header::new(MessageType::Text, 0, payload.len() as u32);
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
