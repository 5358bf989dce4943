// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::id::NodeId;
use crate::message::MessageKind;

fn request(src: u32, dest: u32, ts: u64) -> Message {
    Message::request(NodeId(src), NodeId(dest)).stamped(ts)
}

#[test]
fn encode_terminates_record_with_newline() {
    let bytes = encode(&request(0, 1, 3)).unwrap();
    assert_eq!(bytes.last(), Some(&b'\n'));
    assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);
    assert!(bytes.starts_with(b"{"));
}

#[test]
fn two_concatenated_requests_decode_to_two_messages() {
    let first = request(0, 2, 4);
    let second = request(1, 2, 7);
    let mut buffer = encode(&first).unwrap();
    buffer.extend(encode(&second).unwrap());

    let mut deframer = Deframer::new();
    let decoded: Vec<Message> = deframer
        .decode_read(&buffer)
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(decoded, vec![first, second]);
    assert_ne!(decoded[0], decoded[1]);
    assert_eq!(deframer.pending(), 0);
}

#[test]
fn record_split_across_reads_is_reassembled() {
    let msg = Message::greeting(NodeId(3), NodeId(1), "Hola, this is Node_3").stamped(11);
    let bytes = encode(&msg).unwrap();
    let (head, tail) = bytes.split_at(bytes.len() / 2);

    let mut deframer = Deframer::new();
    assert!(deframer.decode_read(head).is_empty());
    assert_eq!(deframer.pending(), head.len());

    let decoded = deframer.decode_read(tail);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].as_ref().unwrap(), &msg);
}

#[test]
fn malformed_record_does_not_poison_neighbours() {
    let good = request(2, 0, 9);
    let mut buffer = b"{\"msg_type\": \"request\", \"src\": \n".to_vec();
    buffer.extend(encode(&good).unwrap());

    let mut deframer = Deframer::new();
    let results = deframer.decode_read(&buffer);

    assert_eq!(results.len(), 2);
    assert!(matches!(results[0], Err(CodecError::Json(_))));
    assert_eq!(results[1].as_ref().unwrap(), &good);
}

#[test]
fn unknown_message_type_is_a_decode_error() {
    let record = br#"{"msg_type": "inquire", "src": 0, "dest": 1, "ts": 1, "data": "0"}"#;
    assert!(matches!(decode(record), Err(CodecError::Json(_))));
}

#[test]
fn blank_lines_are_skipped() {
    let msg = request(1, 0, 2);
    let mut buffer = b"\n  \n".to_vec();
    buffer.extend(encode(&msg).unwrap());

    let results = Deframer::new().decode_read(&buffer);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap().kind, MessageKind::Request);
}

#[test]
fn oversized_tail_is_discarded() {
    let mut deframer = Deframer::new();
    let junk = vec![b'x'; MAX_FRAME_LEN + 1];

    let results = deframer.decode_read(&junk);

    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(CodecError::FrameTooLong { .. })));
    assert_eq!(deframer.pending(), 0);

    // The stream recovers with the next well-formed record
    let msg = request(0, 0, 1);
    let results = deframer.decode_read(&encode(&msg).unwrap());
    assert_eq!(results[0].as_ref().unwrap(), &msg);
}

use proptest::prelude::*;

proptest! {
    #[test]
    fn arbitrary_read_boundaries_preserve_records(
        cuts in proptest::collection::vec(1usize..40, 0..20),
        count in 1usize..8,
    ) {
        let messages: Vec<Message> = (0..count)
            .map(|i| request(i as u32, (i as u32 + 1) % 3, i as u64 * 3))
            .collect();
        let stream: Vec<u8> = messages
            .iter()
            .flat_map(|m| encode(m).unwrap())
            .collect();

        let mut deframer = Deframer::new();
        let mut decoded = Vec::new();
        let mut rest = stream.as_slice();
        for cut in cuts {
            let cut = cut.min(rest.len());
            let (chunk, tail) = rest.split_at(cut);
            decoded.extend(deframer.decode_read(chunk).into_iter().map(|r| r.unwrap()));
            rest = tail;
        }
        decoded.extend(deframer.decode_read(rest).into_iter().map(|r| r.unwrap()));

        prop_assert_eq!(decoded, messages);
    }
}
