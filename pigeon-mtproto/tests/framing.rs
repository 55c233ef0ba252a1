use pigeon_mtproto::message::Message;
use pigeon_mtproto::msg_id::{MsgId, MsgIdGenerator};
use pigeon_mtproto::seq::SequenceCounter;

#[test]
fn msg_ids_strictly_increase() {
    let mut generator = MsgIdGenerator::new(0);
    let mut last = MsgId(0);
    for _ in 0..10_000 {
        let id = generator.next();
        assert!(id > last, "{id} must be greater than {last}");
        last = id;
    }
}

#[test]
fn msg_ids_have_client_low_bits() {
    let mut generator = MsgIdGenerator::new(0);
    for _ in 0..1_000 {
        let id = generator.next();
        assert_eq!(id.0 & 0b11, 0, "client msg_id must be divisible by 4");
    }
}

#[test]
fn msg_ids_track_wall_clock() {
    let mut generator = MsgIdGenerator::new(0);
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let id = generator.next();
    let secs = id.0 >> 32;
    assert!((secs - now).abs() <= 2, "upper 32 bits must be Unix seconds");
}

#[test]
fn seq_no_odd_for_content_related() {
    let mut seq = SequenceCounter::new();
    let a = seq.next(true);
    let b = seq.next(true);
    assert_eq!(a, 1);
    assert_eq!(b, 3);
}

#[test]
fn seq_no_even_and_sticky_for_unrelated() {
    let mut seq = SequenceCounter::new();
    assert_eq!(seq.next(false), 0);
    assert_eq!(seq.next(false), 0, "unrelated messages must not consume a slot");
    assert_eq!(seq.next(true), 1);
    assert_eq!(seq.next(false), 2);
}

#[test]
fn plaintext_frame_layout() {
    let body = vec![0xAA; 10];
    let msg = Message { id: MsgId(0x1122334455667700), seq_no: 0, body: body.clone() };
    let wire = msg.to_plaintext_bytes();

    assert_eq!(&wire[..8], &[0u8; 8], "auth_key_id must be zero");
    assert_eq!(i64::from_le_bytes(wire[8..16].try_into().unwrap()), 0x1122334455667700);
    assert_eq!(u32::from_le_bytes(wire[16..20].try_into().unwrap()), 10, "length covers the body only");
    assert_eq!(&wire[20..30], &body[..]);
}

#[test]
fn plaintext_padding_aligns_payload() {
    for body_len in [0usize, 1, 7, 10, 16, 33] {
        let msg = Message { id: MsgId(4), seq_no: 0, body: vec![0x55; body_len] };
        let wire = msg.to_plaintext_bytes();
        let pad = wire.len() - 20 - body_len;
        let align = body_len.wrapping_neg() & 15;
        assert_eq!(pad % 16, align, "padding must align the body to 16");
        assert!(pad >= align && pad <= align + 15 * 16, "0–15 extra blocks");
    }
}
