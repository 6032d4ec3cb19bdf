use crate::framer::{LineFramer, MAX_LINE_LENGTH};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

const STREAM: &[u8] = b"AT+CWMODE=1\r\n\r\nOK\r\nWIFI CONNECTED\r\nWIFI GOT IP\r\n+MQTTSUBRECV:0,\"t/1\",5,\"hello\"\r\nready";

fn lines(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn test_push_single_line() {
    let mut framer = LineFramer::new();
    assert_eq!(lines(&["ready"]), framer.push(b"ready\r\n"));
    assert_eq!(0, framer.pending());
}

#[test]
fn test_push_strips_line_feed_only() {
    let mut framer = LineFramer::new();
    assert_eq!(lines(&["OK", "ERROR"]), framer.push(b"OK\nERROR\r\n"));
}

#[test]
fn test_push_keeps_partial_line() {
    let mut framer = LineFramer::new();
    assert!(framer.push(b"WIFI GOT").is_empty());
    assert_eq!(8, framer.pending());

    assert_eq!(lines(&["WIFI GOT IP"]), framer.push(b" IP\r\nre"));
    assert_eq!(2, framer.pending());

    assert_eq!(lines(&["ready"]), framer.push(b"ady\r\n"));
    assert_eq!(0, framer.pending());
}

#[test]
fn test_push_terminator_split_between_reads() {
    let mut framer = LineFramer::new();
    assert!(framer.push(b"OK\r").is_empty());
    assert_eq!(lines(&["OK"]), framer.push(b"\n"));
}

#[test]
fn test_push_empty_chunk() {
    let mut framer = LineFramer::new();
    assert!(framer.push(b"").is_empty());

    framer.push(b"SEND");
    assert!(framer.push(b"").is_empty());
    assert_eq!(lines(&["SEND OK"]), framer.push(b" OK\r\n"));
}

#[test]
fn test_push_empty_lines() {
    let mut framer = LineFramer::new();
    assert_eq!(lines(&["", "OK", ""]), framer.push(b"\r\nOK\r\n\r\n"));
}

#[test]
fn test_push_multi_byte_character_split() {
    let mut framer = LineFramer::new();
    let data = "temp 21°C\r\n".as_bytes();
    let split = data.iter().position(|byte| *byte == 0xC2).unwrap() + 1;

    assert!(framer.push(&data[..split]).is_empty());
    assert_eq!(lines(&["temp 21°C"]), framer.push(&data[split..]));
}

#[test]
fn test_push_chunking_invariance() {
    let expected = LineFramer::new().push(STREAM);
    assert_eq!(6, expected.len());

    // Every single split point
    for split in 0..=STREAM.len() {
        let mut framer = LineFramer::new();
        let mut result = framer.push(&STREAM[..split]);
        result.extend(framer.push(&STREAM[split..]));
        assert_eq!(expected, result, "split at {}", split);
    }

    // Various fixed chunk sizes
    for size in 1..8 {
        let mut framer = LineFramer::new();
        let result: Vec<String> = STREAM.chunks(size).flat_map(|chunk| framer.push(chunk)).collect();
        assert_eq!(expected, result, "chunk size {}", size);
    }
}

#[test]
fn test_clear_drops_partial_line() {
    let mut framer = LineFramer::new();
    framer.push(b"garbage");
    framer.clear();

    assert_eq!(lines(&["ready"]), framer.push(b"ready\r\n"));
}

#[test]
fn test_push_max_line_length() {
    let mut framer = LineFramer::new();
    let mut data = vec![b'x'; MAX_LINE_LENGTH];
    data.extend_from_slice(b"\nOK\n");

    let result = framer.push(&data);
    assert_eq!(2, result.len());
    assert_eq!(MAX_LINE_LENGTH, result[0].len());
    assert_eq!("OK", result[1]);
}

#[test]
fn test_push_oversized_line_dropped() {
    let mut data = vec![b'x'; MAX_LINE_LENGTH + 1];
    data.extend_from_slice(b"\r\nready\r\n");

    // Single chunk
    let mut framer = LineFramer::new();
    assert_eq!(lines(&["ready"]), framer.push(&data));

    // Carried over several reads
    let mut framer = LineFramer::new();
    let result: Vec<String> = data.chunks(100).flat_map(|chunk| framer.push(chunk)).collect();
    assert_eq!(lines(&["ready"]), result);
    assert_eq!(0, framer.pending());
}

#[test]
fn test_push_unterminated_stream_bounded() {
    let mut framer = LineFramer::new();
    for _ in 0..100 {
        framer.push(&[b'x'; 512]);
        assert!(framer.pending() <= MAX_LINE_LENGTH);
    }

    assert!(framer.push(b"garbage\r\n").is_empty());
    assert_eq!(lines(&["OK"]), framer.push(b"OK\r\n"));
}
