//! Decoded message with typed payload accessors.
//!
//! A [`DecodedMessage`] is produced by the frame decoder once a complete
//! frame is buffered and is immutable after construction. Opaque payloads are
//! shared zero-copy via `bytes::Bytes`; table payloads are parsed into
//! ordered entry vectors.

use bytes::Bytes;

use super::table::{DaytimerEntry, TextEntry, ValueEntry};
use super::wire_format::MessageType;

/// Payload of a decoded message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// Unparsed payload bytes (text, binary, keepalive, out-of-service,
    /// weather).
    Raw(Bytes),
    /// Parsed value-state table.
    ValueTable(Vec<ValueEntry>),
    /// Parsed text-state table.
    TextTable(Vec<TextEntry>),
    /// Parsed daytimer-state table.
    DaytimerTable(Vec<DaytimerEntry>),
}

/// A complete decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// Message type from the frame header.
    pub msg_type: MessageType,
    /// Parsed or raw payload.
    pub body: MessageBody,
}

impl DecodedMessage {
    /// Create a message with an opaque payload.
    pub fn raw(msg_type: MessageType, payload: Bytes) -> Self {
        Self {
            msg_type,
            body: MessageBody::Raw(payload),
        }
    }

    /// Raw payload bytes, if this message was not table-typed.
    pub fn payload(&self) -> Option<&[u8]> {
        match &self.body {
            MessageBody::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Parsed value-state entries, if this is a type-2 message.
    pub fn value_entries(&self) -> Option<&[ValueEntry]> {
        match &self.body {
            MessageBody::ValueTable(entries) => Some(entries),
            _ => None,
        }
    }

    /// Parsed text-state entries, if this is a type-3 message.
    pub fn text_entries(&self) -> Option<&[TextEntry]> {
        match &self.body {
            MessageBody::TextTable(entries) => Some(entries),
            _ => None,
        }
    }

    /// Parsed daytimer entries, if this is a type-4 message.
    pub fn daytimer_entries(&self) -> Option<&[DaytimerEntry]> {
        match &self.body {
            MessageBody::DaytimerTable(entries) => Some(entries),
            _ => None,
        }
    }

    /// Number of parsed entries for table messages, payload length otherwise.
    pub fn len(&self) -> usize {
        match &self.body {
            MessageBody::Raw(bytes) => bytes.len(),
            MessageBody::ValueTable(entries) => entries.len(),
            MessageBody::TextTable(entries) => entries.len(),
            MessageBody::DaytimerTable(entries) => entries.len(),
        }
    }

    /// True for an empty payload or entry list.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_message_accessors() {
        let msg = DecodedMessage::raw(MessageType::Keepalive, Bytes::new());
        assert_eq!(msg.msg_type, MessageType::Keepalive);
        assert_eq!(msg.payload(), Some(&[][..]));
        assert!(msg.is_empty());
        assert!(msg.value_entries().is_none());
    }

    #[test]
    fn test_table_message_accessors() {
        let msg = DecodedMessage {
            msg_type: MessageType::ValueStates,
            body: MessageBody::ValueTable(Vec::new()),
        };
        assert!(msg.payload().is_none());
        assert_eq!(msg.value_entries(), Some(&[][..]));
        assert!(msg.text_entries().is_none());
    }
}
