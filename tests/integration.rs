//! End-to-end pipeline tests: raw bytes through the frame decoder into the
//! dispatch plane.

use std::sync::{Arc, Mutex};

use homewire_client::dispatch::{spawn_dispatch_task, DispatchItem, EventNotifier, MessageRouter};
use homewire_client::protocol::{encode_command, info, FrameDecoder, Header, MessageType};
use homewire_client::SessionEvent;

fn value_record(uuid_byte: u8, value: f64) -> Vec<u8> {
    let mut record = vec![uuid_byte; 16];
    record.extend_from_slice(&value.to_le_bytes());
    record
}

fn frame(msg_type: MessageType, info_byte: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Header::new(msg_type, info_byte, payload.len() as u32)
        .encode()
        .to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

#[test]
fn test_command_frames_decode_back_to_text_messages() {
    // Outbound commands and inbound text replies share the frame format.
    let mut decoder = FrameDecoder::new();
    let bytes = encode_command("authwithtoken/abc123");

    let messages = decoder.feed(&bytes).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].msg_type, MessageType::Text);
    assert_eq!(messages[0].payload(), Some(&b"authwithtoken/abc123"[..]));
}

#[tokio::test]
async fn test_byte_stream_to_filtered_consumers() {
    // A burst of keepalive + value table + text reply, fed one byte at a
    // time, must reach exactly the consumers whose filters match, in
    // arrival order.
    let mut stream = Vec::new();
    stream.extend_from_slice(&frame(MessageType::Keepalive, 0, &[]));
    let mut table = value_record(0x11, 1.0);
    table.extend_from_slice(&value_record(0x22, 2.0));
    stream.extend_from_slice(&frame(MessageType::ValueStates, 0, &table));
    stream.extend_from_slice(&encode_command(r#"{"code": 200}"#));

    let mut decoder = FrameDecoder::new();
    let mut decoded = Vec::new();
    for byte in stream {
        decoded.extend(decoder.feed(&[byte]).unwrap());
    }
    assert_eq!(decoded.len(), 3);

    let log = Arc::new(Mutex::new(Vec::new()));

    let mut router = MessageRouter::new();
    let log_tables = Arc::clone(&log);
    router.register(&[MessageType::ValueStates], move |msg| {
        let log = Arc::clone(&log_tables);
        async move {
            log.lock()
                .unwrap()
                .push(format!("values:{}", msg.len()));
            Ok(())
        }
    });
    let log_text = Arc::clone(&log);
    router.register(&[MessageType::Text], move |msg| {
        let log = Arc::clone(&log_text);
        async move {
            log.lock()
                .unwrap()
                .push(format!("text:{}", msg.len()));
            Ok(())
        }
    });

    let (tx, task) = spawn_dispatch_task(router, EventNotifier::new());
    for msg in decoded {
        tx.send(DispatchItem::Message(msg)).await.unwrap();
    }
    drop(tx);
    task.await.unwrap();

    // The keepalive frame had no matching consumer and is dropped silently.
    assert_eq!(*log.lock().unwrap(), vec!["values:2", "text:13"]);
}

#[tokio::test]
async fn test_messages_and_events_interleave_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut router = MessageRouter::new();
    let log_m = Arc::clone(&log);
    router.register(&[MessageType::Keepalive], move |_msg| {
        let log = Arc::clone(&log_m);
        async move {
            log.lock().unwrap().push("keepalive".to_string());
            Ok(())
        }
    });
    let mut notifier = EventNotifier::new();
    let log_e = Arc::clone(&log);
    notifier.register(&SessionEvent::ALL, move |event| {
        log_e.lock().unwrap().push(format!("{:?}", event));
        Ok(())
    });

    let (tx, task) = spawn_dispatch_task(router, notifier);

    let mut decoder = FrameDecoder::new();
    tx.send(DispatchItem::Event(SessionEvent::Connected))
        .await
        .unwrap();
    for msg in decoder
        .feed(&frame(MessageType::Keepalive, 0, &[]))
        .unwrap()
    {
        tx.send(DispatchItem::Message(msg)).await.unwrap();
    }
    tx.send(DispatchItem::Event(SessionEvent::ConnectionClosed))
        .await
        .unwrap();

    drop(tx);
    task.await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["Connected", "keepalive", "ConnectionClosed"]
    );
}

#[test]
fn test_estimated_table_reconciles_against_parsed_records() {
    // The declared length is an estimate only: two records (48 bytes)
    // behind a declared 58, with the next frame packed right after the
    // records. The consumed length comes from the records, not the header.
    let mut payload = value_record(0x01, 1.0);
    payload.extend_from_slice(&value_record(0x02, 2.0));

    let mut bytes = Header::new(MessageType::ValueStates, info::ESTIMATED, 58)
        .encode()
        .to_vec();
    bytes.extend_from_slice(&payload);
    bytes.extend_from_slice(&frame(MessageType::Keepalive, 0, &[]));

    let mut decoder = FrameDecoder::new();
    let messages = decoder.feed(&bytes).unwrap();
    assert_eq!(messages.len(), 2);

    let entries = messages[0].value_entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].value, 2.0);
    assert_eq!(messages[1].msg_type, MessageType::Keepalive);
    assert!(decoder.is_empty());
}

#[test]
fn test_stream_recovers_after_garbage_between_frames() {
    let mut stream = frame(MessageType::Keepalive, 0, &[]);
    stream.extend_from_slice(&[0x00, 0xFF, 0x17]); // line noise
    stream.extend_from_slice(&frame(
        MessageType::ValueStates,
        0,
        &value_record(0x42, 19.5),
    ));

    let mut decoder = FrameDecoder::new();
    let messages = decoder.feed(&stream).unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].msg_type, MessageType::Keepalive);
    assert_eq!(messages[1].msg_type, MessageType::ValueStates);
    assert_eq!(messages[1].value_entries().unwrap()[0].value, 19.5);
}

#[test]
fn test_fragmented_frame_across_many_feeds() {
    let bytes = frame(MessageType::ValueStates, 0, &value_record(0x0A, -2.25));

    let mut decoder = FrameDecoder::new();
    let mut messages = Vec::new();
    for chunk in bytes.chunks(3) {
        messages.extend(decoder.feed(chunk).unwrap());
    }

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].value_entries().unwrap()[0].value, -2.25);
    assert!(decoder.is_empty());
}
