use pigeon_mtproto::message::Message;
use pigeon_mtproto::msg_id::MsgId;
use pigeon_mtproto::tl;

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn i64_at(buf: &[u8], offset: usize) -> i64 {
    i64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

#[test]
fn msgs_ack_layout() {
    let buf = tl::msgs_ack(&[MsgId(10), MsgId(-1)]);
    assert_eq!(u32_at(&buf, 0), tl::MSGS_ACK);
    assert_eq!(u32_at(&buf, 4), tl::VECTOR);
    assert_eq!(u32_at(&buf, 8), 2);
    assert_eq!(i64_at(&buf, 12), 10);
    assert_eq!(i64_at(&buf, 20), -1);
    assert_eq!(buf.len(), 28);
}

#[test]
fn http_wait_layout() {
    let buf = tl::http_wait(0, 0, 30_000);
    assert_eq!(u32_at(&buf, 0), tl::HTTP_WAIT);
    assert_eq!(u32_at(&buf, 4), 0);
    assert_eq!(u32_at(&buf, 8), 0);
    assert_eq!(u32_at(&buf, 12), 30_000);
    assert_eq!(buf.len(), 16);
}

#[test]
fn container_uses_bare_vector() {
    let parts = vec![
        Message { id: MsgId(8), seq_no: 1, body: vec![1, 2, 3, 4] },
        Message { id: MsgId(12), seq_no: 2, body: vec![9, 9] },
    ];
    let buf = tl::msg_container(&parts);
    assert_eq!(u32_at(&buf, 0), tl::MSG_CONTAINER);
    assert_eq!(u32_at(&buf, 4), 2, "bare vector: count follows the constructor directly");
    assert_eq!(i64_at(&buf, 8), 8);
    assert_eq!(u32_at(&buf, 16), 1);
    assert_eq!(u32_at(&buf, 20), 4, "bytes field covers the inner body");
    assert_eq!(&buf[24..28], &[1, 2, 3, 4]);
    assert_eq!(i64_at(&buf, 28), 12);
    assert_eq!(buf.len(), 28 + 16 + 2);
}

#[test]
fn invoke_after_msgs_prefixes_query() {
    let query = vec![0xDE, 0xAD, 0xBE, 0xEF];
    let buf = tl::invoke_after_msgs(&[MsgId(77)], &query);
    assert_eq!(u32_at(&buf, 0), tl::INVOKE_AFTER_MSGS);
    assert_eq!(u32_at(&buf, 4), tl::VECTOR);
    assert_eq!(u32_at(&buf, 8), 1);
    assert_eq!(i64_at(&buf, 12), 77);
    assert_eq!(&buf[20..], &query[..]);
}

#[test]
fn invoke_after_msgs_with_empty_chain() {
    let buf = tl::invoke_after_msgs(&[], &[0x42; 8]);
    assert_eq!(u32_at(&buf, 8), 0);
    assert_eq!(buf.len(), 12 + 8);
}

#[test]
fn init_connection_wraps_query_last() {
    let params = tl::InitParams {
        api_id: 6,
        device_model: "pc".into(),
        system_version: "linux".into(),
        app_version: "0.1".into(),
        system_lang_code: "en".into(),
        lang_pack: "".into(),
        lang_code: "en".into(),
    };
    let query = vec![0xCA, 0xFE, 0xBA, 0xBE];
    let buf = tl::init_connection(&params, &query);
    assert_eq!(u32_at(&buf, 0), tl::INIT_CONNECTION);
    assert_eq!(u32_at(&buf, 4), 0, "no proxy, no params: flags must be zero");
    assert_eq!(u32_at(&buf, 8), 6u32);
    // "pc": len byte + 2 bytes + 1 pad byte
    assert_eq!(&buf[12..16], &[2, b'p', b'c', 0]);
    assert_eq!(&buf[buf.len() - 4..], &query[..], "query is appended verbatim");
    assert_eq!(buf.len() % 4, 0, "TL strings keep 4-byte alignment");
}

#[test]
fn invoke_with_layer_layout() {
    let inner = tl::init_connection(&tl::InitParams::default(), &[1, 2, 3, 4]);
    let buf = tl::invoke_with_layer(195, &inner);
    assert_eq!(u32_at(&buf, 0), tl::INVOKE_WITH_LAYER);
    assert_eq!(u32_at(&buf, 4), 195);
    assert_eq!(&buf[8..], &inner[..]);
}

#[test]
fn cdn_masking_hides_device_info() {
    let params = tl::InitParams::default().cdn_masked();
    assert_eq!(params.device_model, "n/a");
    assert_eq!(params.system_version, "n/a");
}
