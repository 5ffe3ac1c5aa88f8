//! Decode-mode conformance: the fast and strict value-table paths must
//! produce identical output for any input, under any fragmentation.

use homewire_client::protocol::{info, FrameDecoder, Header, MessageType};
use homewire_client::{DecodeMode, DecodedMessage};

fn value_record(seed: u8, value: f64) -> Vec<u8> {
    let mut rec = vec![0u8; 16];
    for (i, b) in rec.iter_mut().enumerate() {
        *b = seed.wrapping_add(i as u8);
    }
    rec.extend_from_slice(&value.to_le_bytes());
    rec
}

fn frame(msg_type: MessageType, info_byte: u8, declared: u32, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Header::new(msg_type, info_byte, declared).encode().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

/// Decode `stream` in `chunk_size`-byte feeds under the given mode.
fn decode_chunked(stream: &[u8], mode: DecodeMode, chunk_size: usize) -> Vec<DecodedMessage> {
    let mut decoder = FrameDecoder::with_mode(mode);
    let mut messages = Vec::new();
    for chunk in stream.chunks(chunk_size) {
        messages.extend(decoder.feed(chunk).expect("stream within resync budget"));
    }
    messages
}

/// Assert both modes agree for every fragmentation granularity.
fn assert_modes_agree(stream: &[u8]) {
    let reference = decode_chunked(stream, DecodeMode::Fast, stream.len().max(1));
    for chunk_size in [1, 2, 3, 7, 24, stream.len().max(1)] {
        for mode in [DecodeMode::Fast, DecodeMode::Strict] {
            let got = decode_chunked(stream, mode, chunk_size);
            assert_eq!(
                got, reference,
                "mode {:?} chunk size {} diverged",
                mode, chunk_size
            );
        }
    }
}

#[test]
fn test_well_formed_value_tables() {
    let mut payload = value_record(1, 21.5);
    payload.extend(value_record(2, -3.25));
    payload.extend(value_record(3, f64::MAX));

    let mut stream = frame(
        MessageType::ValueStates,
        0,
        payload.len() as u32,
        &payload,
    );
    stream.extend(frame(MessageType::Keepalive, 0, 0, &[]));
    stream.extend(frame(MessageType::ValueStates, 0, 24, &value_record(9, 0.0)));

    assert_modes_agree(&stream);
}

#[test]
fn test_mixed_types_and_stray_bytes() {
    let mut stream = frame(MessageType::Keepalive, 0, 0, &[]);
    stream.extend_from_slice(&[0xDE, 0xAD, 0x42]); // noise between frames
    stream.extend(frame(MessageType::Text, 0, 4, b"jdev"));
    stream.extend(frame(MessageType::ValueStates, 0, 24, &value_record(5, 7.5)));

    assert_modes_agree(&stream);
}

#[test]
fn test_estimated_length_matching_content() {
    // An estimate that happens to be exact: the walk covers the declared
    // window record by record in both modes.
    let mut payload = value_record(1, 1.0);
    payload.extend(value_record(2, 2.0));
    payload.extend(value_record(3, 3.0));

    let mut stream = frame(MessageType::ValueStates, info::ESTIMATED, 72, &payload);
    stream.extend(frame(MessageType::Keepalive, 0, 0, &[]));

    assert_modes_agree(&stream);

    let messages = decode_chunked(&stream, DecodeMode::Strict, 1);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].value_entries().map(|e| e.len()), Some(3));
}

#[test]
fn test_estimated_length_with_deficit() {
    // Declared 58 but the records cover only 48 bytes; the walk stops at
    // the sub-record tail and the next frame begins right after the records,
    // in both modes.
    let mut payload = value_record(1, 1.0);
    payload.extend(value_record(2, 2.0));

    let mut stream = frame(MessageType::ValueStates, info::ESTIMATED, 58, &payload);
    stream.extend(frame(MessageType::Keepalive, 0, 0, &[]));

    assert_modes_agree(&stream);

    let messages = decode_chunked(&stream, DecodeMode::Fast, 1);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].value_entries().map(|e| e.len()), Some(2));
    assert_eq!(messages[1].msg_type, MessageType::Keepalive);
}

#[test]
fn test_exact_frame_with_truncated_trailing_record() {
    // An exact-length payload whose tail is not a whole record: the partial
    // record is dropped identically by both parsing strategies.
    let mut payload = value_record(1, 4.5);
    payload.extend_from_slice(&value_record(2, 9.0)[..13]);

    let stream = frame(
        MessageType::ValueStates,
        0,
        payload.len() as u32,
        &payload,
    );

    assert_modes_agree(&stream);

    let messages = decode_chunked(&stream, DecodeMode::Strict, 5);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].value_entries().map(|e| e.len()), Some(1));
}

#[test]
fn test_empty_tables() {
    let mut stream = frame(MessageType::ValueStates, 0, 0, &[]);
    stream.extend(frame(MessageType::ValueStates, info::ESTIMATED, 0, &[]));
    stream.extend(frame(MessageType::Keepalive, 0, 0, &[]));

    assert_modes_agree(&stream);

    let messages = decode_chunked(&stream, DecodeMode::Fast, 2);
    assert_eq!(messages.len(), 3);
    assert!(messages[0].is_empty());
}
