//! Binary protocol: wire format, frame decoding, and table payloads.

mod decoder;
mod message;
pub mod table;
mod wire_format;

pub use decoder::{FrameDecoder, RESYNC_BUDGET};
pub use message::{DecodedMessage, MessageBody};
pub use table::{DaytimerEntry, DaytimerSlot, DecodeMode, TextEntry, Uuid, ValueEntry};
pub use wire_format::{
    encode_command, info, Header, MessageType, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, SENTINEL,
};
