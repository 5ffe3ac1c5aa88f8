//! Frame decoder for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management. The decoder is a
//! restartable state machine: each [`FrameDecoder::feed`] appends raw
//! transport bytes and extracts every complete frame, buffering any
//! remainder for the next call. Feeding a stream split at arbitrary
//! boundaries yields the same messages as feeding it whole.
//!
//! Recovery rules:
//! - a byte that cannot start a header is skipped and the buffer is scanned
//!   forward to the next sentinel candidate (resynchronization)
//! - an implausible declared length discards the buffered state entirely
//! - skipping more than [`RESYNC_BUDGET`] bytes without extracting a frame
//!   escalates to an error, which the session treats as a transport failure

use bytes::BytesMut;

use super::message::{DecodedMessage, MessageBody};
use super::table::{
    min_record_size, parse_daytimer_table, parse_text_table, parse_value_table, record_span,
    DecodeMode,
};
use super::wire_format::{Header, MessageType, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, SENTINEL};
use crate::error::{HomewireError, Result};

/// Bytes the decoder may skip between two good frames before giving up.
pub const RESYNC_BUDGET: usize = 4096;

/// Buffer for accumulating incoming bytes and extracting complete messages.
pub struct FrameDecoder {
    /// Accumulated bytes from transport reads.
    buffer: BytesMut,
    /// Value-table parsing strategy.
    mode: DecodeMode,
    /// Maximum allowed declared payload size.
    max_payload_size: u32,
    /// Bytes skipped by recovery since the last extracted frame.
    skipped: usize,
}

impl FrameDecoder {
    /// Create a decoder with default settings (fast mode, 16 MiB bound).
    pub fn new() -> Self {
        Self::with_mode(DecodeMode::Fast)
    }

    /// Create a decoder with an explicit parsing mode.
    pub fn with_mode(mode: DecodeMode) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            mode,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            skipped: 0,
        }
    }

    /// Create a decoder with a custom maximum payload size.
    pub fn with_max_payload(mode: DecodeMode, max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            mode,
            max_payload_size,
            skipped: 0,
        }
    }

    /// Push data into the buffer and extract all complete messages.
    ///
    /// Returns every message completed by this input, in stream order. An
    /// error means resynchronization exhausted its budget; the decoder
    /// should be discarded along with the connection.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<DecodedMessage>> {
        self.buffer.extend_from_slice(data);

        let mut messages = Vec::new();
        while let Some(msg) = self.try_extract_one()? {
            messages.push(msg);
        }
        Ok(messages)
    }

    /// Number of buffered bytes awaiting a complete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and recovery counters.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.skipped = 0;
    }

    /// Try to extract a single message from the buffer.
    ///
    /// Returns `Ok(None)` when more input is needed.
    fn try_extract_one(&mut self) -> Result<Option<DecodedMessage>> {
        loop {
            if self.buffer.len() < HEADER_SIZE {
                return Ok(None);
            }

            let header = match Header::decode(&self.buffer[..HEADER_SIZE]) {
                Some(h) => h,
                None => {
                    self.resync()?;
                    continue;
                }
            };

            if header.validate(self.max_payload_size).is_err() {
                // Corruption, not a real frame. Drop everything buffered and
                // resynchronize on whatever arrives next.
                let dropped = self.buffer.len();
                self.buffer.clear();
                tracing::warn!(
                    dropped,
                    declared = header.payload_length,
                    "discarding buffer: implausible payload length"
                );
                self.note_skipped(dropped)?;
                return Ok(None);
            }

            let declared = header.payload_length as usize;

            let msg = if header.msg_type.is_table() && header.is_estimated() {
                match self.try_extract_estimated(&header, declared)? {
                    Some(msg) => msg,
                    None => return Ok(None),
                }
            } else {
                if self.buffer.len() < HEADER_SIZE + declared {
                    return Ok(None);
                }
                let _ = self.buffer.split_to(HEADER_SIZE);
                let payload = self.buffer.split_to(declared).freeze();
                if header.msg_type.is_table() {
                    self.parse_table(header.msg_type, &payload)
                } else {
                    DecodedMessage::raw(header.msg_type, payload)
                }
            };

            self.skipped = 0;
            return Ok(Some(msg));
        }
    }

    /// Extract a table frame whose declared length is an estimate.
    ///
    /// Records are walked from the payload start. A record starts wherever
    /// the declared window still has room for a minimal record, and once
    /// started it is parsed to completion even past the declared boundary
    /// (excess, possible for variable-length records). A declared tail too
    /// short to start a record ends the frame there (deficit); the true
    /// consumed length is whatever the walk covered. The walk depends only
    /// on content and the declared length, never on read-boundary timing.
    fn try_extract_estimated(
        &mut self,
        header: &Header,
        declared: usize,
    ) -> Result<Option<DecodedMessage>> {
        let min_record = min_record_size(header.msg_type);
        let mut offset = 0;

        loop {
            if offset >= declared || declared - offset < min_record {
                break;
            }
            let payload_area = &self.buffer[HEADER_SIZE..];
            match record_span(header.msg_type, payload_area, offset) {
                Ok(Some(span)) => offset += span,
                Ok(None) => return Ok(None),
                Err(e) => {
                    let dropped = self.buffer.len();
                    self.buffer.clear();
                    tracing::warn!(dropped, "discarding buffer: {}", e);
                    self.note_skipped(dropped)?;
                    return Ok(None);
                }
            }
        }

        let _ = self.buffer.split_to(HEADER_SIZE);
        let payload = self.buffer.split_to(offset).freeze();
        Ok(Some(self.parse_table(header.msg_type, &payload)))
    }

    fn parse_table(&self, msg_type: MessageType, payload: &[u8]) -> DecodedMessage {
        let body = match msg_type {
            MessageType::ValueStates => {
                MessageBody::ValueTable(parse_value_table(payload, self.mode))
            }
            MessageType::TextStates => MessageBody::TextTable(parse_text_table(payload)),
            MessageType::DaytimerStates => {
                MessageBody::DaytimerTable(parse_daytimer_table(payload))
            }
            other => unreachable!("{:?} is not a table type", other),
        };
        DecodedMessage { msg_type, body }
    }

    /// Skip past a misaligned byte to the next sentinel candidate.
    fn resync(&mut self) -> Result<()> {
        let skip = self.buffer[1..]
            .iter()
            .position(|&b| b == SENTINEL)
            .map(|pos| pos + 1)
            .unwrap_or(self.buffer.len());

        let _ = self.buffer.split_to(skip);
        tracing::warn!(skipped = skip, "resynchronizing: skipped stray bytes");
        self.note_skipped(skip)
    }

    fn note_skipped(&mut self, n: usize) -> Result<()> {
        self.skipped += n;
        if self.skipped > RESYNC_BUDGET {
            return Err(HomewireError::Protocol(format!(
                "resynchronization failed after skipping {} bytes",
                self.skipped
            )));
        }
        Ok(())
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
