//! Event-table payload parsing.
//!
//! Table-typed frames carry a repeating record structure instead of an opaque
//! payload. Three layouts exist (all integers Little Endian):
//!
//! - value states: 16-byte UUID + f64 value (fixed 24-byte stride)
//! - text states: 16-byte UUID + 16-byte icon UUID + u32 length + UTF-8
//!   text padded to a 4-byte boundary
//! - daytimer states: 16-byte UUID + f64 default value + i32 slot count +
//!   24-byte slots (mode, from, to, need-activate, value)
//!
//! The record layout is a protocol detail inferred from server behaviour;
//! confirm against a reference server before relying on it for new types.

use std::fmt;

use crate::error::{HomewireError, Result};
use crate::protocol::wire_format::MessageType;

/// Fixed stride of a value-state record.
pub const VALUE_RECORD_SIZE: usize = 24;

/// Fixed prefix of a text-state record (two UUIDs + length field).
const TEXT_RECORD_FIXED: usize = 36;

/// Fixed prefix of a daytimer record (UUID + default value + slot count).
const DAYTIMER_RECORD_FIXED: usize = 28;

/// Size of one daytimer schedule slot.
const DAYTIMER_SLOT_SIZE: usize = 24;

/// Upper bound on a single text field. Larger values are corruption.
const MAX_TEXT_LEN: usize = 1024 * 1024;

/// Upper bound on slots in one daytimer record.
const MAX_DAYTIMER_SLOTS: i32 = 1024;

/// Parsing strategy for the high-throughput value-state path.
///
/// Both variants must produce identical output for any input; the defensive
/// variant exists for debugging against misbehaving servers and is exercised
/// by the conformance suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Exact-chunk iteration, minimal branching.
    #[default]
    Fast,
    /// Per-field checked cursor reads.
    Strict,
}

/// 16-byte state identifier, formatted the way the server names controls.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uuid([u8; 16]);

impl Uuid {
    /// Build from raw wire bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Raw wire bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d1 = u32::from_le_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]);
        let d2 = u16::from_le_bytes([self.0[4], self.0[5]]);
        let d3 = u16::from_le_bytes([self.0[6], self.0[7]]);
        write!(f, "{:08x}-{:04x}-{:04x}-", d1, d2, d3)?;
        for b in &self.0[8..] {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uuid({})", self)
    }
}

/// One value-state update.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueEntry {
    pub uuid: Uuid,
    pub value: f64,
}

/// One text-state update.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEntry {
    pub uuid: Uuid,
    pub icon: Uuid,
    pub text: String,
}

/// One slot of a daytimer schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct DaytimerSlot {
    pub mode: i32,
    pub from_minutes: i32,
    pub to_minutes: i32,
    pub need_activate: bool,
    pub value: f64,
}

/// One daytimer-state update.
#[derive(Debug, Clone, PartialEq)]
pub struct DaytimerEntry {
    pub uuid: Uuid,
    pub default_value: f64,
    pub slots: Vec<DaytimerSlot>,
}

#[inline]
fn read_uuid(buf: &[u8], offset: usize) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&buf[offset..offset + 16]);
    Uuid::from_bytes(bytes)
}

#[inline]
fn read_f64(buf: &[u8], offset: usize) -> f64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    f64::from_le_bytes(bytes)
}

#[inline]
fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

#[inline]
fn read_i32(buf: &[u8], offset: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    i32::from_le_bytes(bytes)
}

/// Smallest possible record for a table type; a shorter window cannot start
/// a record.
pub fn min_record_size(msg_type: MessageType) -> usize {
    match msg_type {
        MessageType::ValueStates => VALUE_RECORD_SIZE,
        MessageType::TextStates => TEXT_RECORD_FIXED,
        MessageType::DaytimerStates => DAYTIMER_RECORD_FIXED,
        // Non-table types have no records; nothing fits.
        _ => usize::MAX,
    }
}

/// Byte span of the record starting at `offset`, for estimated-length
/// reconciliation.
///
/// Returns `Ok(None)` when more bytes are needed to size the record, and an
/// error when a length field is implausible (corruption).
pub fn record_span(msg_type: MessageType, buf: &[u8], offset: usize) -> Result<Option<usize>> {
    let available = buf.len().saturating_sub(offset);
    match msg_type {
        MessageType::ValueStates => Ok((available >= VALUE_RECORD_SIZE).then_some(VALUE_RECORD_SIZE)),
        MessageType::TextStates => {
            if available < TEXT_RECORD_FIXED {
                return Ok(None);
            }
            let len = read_u32(buf, offset + 32) as usize;
            if len > MAX_TEXT_LEN {
                return Err(HomewireError::Protocol(format!(
                    "text record length {} exceeds maximum {}",
                    len, MAX_TEXT_LEN
                )));
            }
            let padded = (len + 3) & !3;
            let total = TEXT_RECORD_FIXED + padded;
            Ok((available >= total).then_some(total))
        }
        MessageType::DaytimerStates => {
            if available < DAYTIMER_RECORD_FIXED {
                return Ok(None);
            }
            let slots = read_i32(buf, offset + 24);
            if !(0..=MAX_DAYTIMER_SLOTS).contains(&slots) {
                return Err(HomewireError::Protocol(format!(
                    "daytimer slot count {} out of range",
                    slots
                )));
            }
            let total = DAYTIMER_RECORD_FIXED + slots as usize * DAYTIMER_SLOT_SIZE;
            Ok((available >= total).then_some(total))
        }
        other => Err(HomewireError::Protocol(format!(
            "message type {:?} has no table layout",
            other
        ))),
    }
}

/// Parse a value-state table from an exact payload.
///
/// Trailing bytes shorter than one record are ignored in both modes.
pub fn parse_value_table(payload: &[u8], mode: DecodeMode) -> Vec<ValueEntry> {
    match mode {
        DecodeMode::Fast => payload
            .chunks_exact(VALUE_RECORD_SIZE)
            .map(|rec| ValueEntry {
                uuid: read_uuid(rec, 0),
                value: read_f64(rec, 16),
            })
            .collect(),
        DecodeMode::Strict => {
            let mut entries = Vec::with_capacity(payload.len() / VALUE_RECORD_SIZE);
            let mut offset = 0;
            while payload.len() - offset >= VALUE_RECORD_SIZE {
                let uuid = read_uuid(payload, offset);
                let value = read_f64(payload, offset + 16);
                entries.push(ValueEntry { uuid, value });
                offset += VALUE_RECORD_SIZE;
            }
            entries
        }
    }
}

/// Parse a text-state table from an exact payload.
///
/// Parsing stops at the first record that does not fit the remaining bytes
/// or carries an implausible length field.
pub fn parse_text_table(payload: &[u8]) -> Vec<TextEntry> {
    let mut entries = Vec::new();
    let mut offset = 0;
    loop {
        let span = match record_span(MessageType::TextStates, payload, offset) {
            Ok(Some(span)) => span,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("stopping text table parse: {}", e);
                break;
            }
        };
        let len = read_u32(payload, offset + 32) as usize;
        let text_start = offset + TEXT_RECORD_FIXED;
        let text = String::from_utf8_lossy(&payload[text_start..text_start + len]).into_owned();
        entries.push(TextEntry {
            uuid: read_uuid(payload, offset),
            icon: read_uuid(payload, offset + 16),
            text,
        });
        offset += span;
    }
    entries
}

/// Parse a daytimer-state table from an exact payload.
pub fn parse_daytimer_table(payload: &[u8]) -> Vec<DaytimerEntry> {
    let mut entries = Vec::new();
    let mut offset = 0;
    loop {
        let span = match record_span(MessageType::DaytimerStates, payload, offset) {
            Ok(Some(span)) => span,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("stopping daytimer table parse: {}", e);
                break;
            }
        };
        let slot_count = read_i32(payload, offset + 24) as usize;
        let mut slots = Vec::with_capacity(slot_count);
        let mut slot_offset = offset + DAYTIMER_RECORD_FIXED;
        for _ in 0..slot_count {
            slots.push(DaytimerSlot {
                mode: read_i32(payload, slot_offset),
                from_minutes: read_i32(payload, slot_offset + 4),
                to_minutes: read_i32(payload, slot_offset + 8),
                need_activate: read_i32(payload, slot_offset + 12) != 0,
                value: read_f64(payload, slot_offset + 16),
            });
            slot_offset += DAYTIMER_SLOT_SIZE;
        }
        entries.push(DaytimerEntry {
            uuid: read_uuid(payload, offset),
            default_value: read_f64(payload, offset + 8),
            slots,
        });
        offset += span;
    }
    entries
}
