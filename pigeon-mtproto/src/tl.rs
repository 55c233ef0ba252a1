//! TL serialization for the protocol-control constructors the write
//! path emits itself.
//!
//! Application calls arrive already serialized by the schema layer;
//! only the handful of service constructors below are built here.
//! Encoding follows the [MTProto Binary Serialization] rules:
//! little-endian integers, 4-byte-aligned length-prefixed strings and
//! `vector#1cb5c415`.
//!
//! [MTProto Binary Serialization]: https://core.telegram.org/mtproto/serialize

use crate::message::Message;
use crate::msg_id::MsgId;

/// `msgs_ack#62d6b459 msg_ids:Vector<long>`
pub const MSGS_ACK: u32 = 0x62d6b459;
/// `http_wait#9299359f max_delay:int wait_after:int max_wait:int`
pub const HTTP_WAIT: u32 = 0x9299359f;
/// `msg_container#73f1f8dc messages:vector<%Message>`
pub const MSG_CONTAINER: u32 = 0x73f1f8dc;
/// `invokeAfterMsgs#3dc4b4f0 msg_ids:Vector<long> query:!X`
pub const INVOKE_AFTER_MSGS: u32 = 0x3dc4b4f0;
/// `invokeWithLayer#da9b0d0d layer:int query:!X`
pub const INVOKE_WITH_LAYER: u32 = 0xda9b0d0d;
/// `initConnection#c1cd5ea9 flags:# api_id:int … query:!X`
pub const INIT_CONNECTION: u32 = 0xc1cd5ea9;
/// `vector#1cb5c415 t:Type # [ t ]`
pub const VECTOR: u32 = 0x1cb5c415;

// ─── primitives ──────────────────────────────────────────────────────────────

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend(value.to_le_bytes());
}

fn put_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend(value.to_le_bytes());
}

fn put_i64(buf: &mut Vec<u8>, value: i64) {
    buf.extend(value.to_le_bytes());
}

/// TL string: `[len u8][data][pad to 4]`, or `[0xfe][len as 3 LE bytes]`
/// for strings of 254 bytes and longer.
fn put_str(buf: &mut Vec<u8>, value: &str) {
    let data = value.as_bytes();
    let len = data.len();
    let header_len = if len <= 253 {
        buf.push(len as u8);
        1
    } else {
        buf.push(0xfe);
        buf.push((len & 0xff) as u8);
        buf.push(((len >> 8) & 0xff) as u8);
        buf.push(((len >> 16) & 0xff) as u8);
        4
    };
    buf.extend(data);
    let padding = (4 - (header_len + len) % 4) % 4;
    buf.extend(std::iter::repeat(0u8).take(padding));
}

fn put_msg_id_vector(buf: &mut Vec<u8>, ids: &[MsgId]) {
    put_u32(buf, VECTOR);
    put_i32(buf, ids.len() as i32);
    for id in ids {
        put_i64(buf, id.0);
    }
}

// ─── service constructors ────────────────────────────────────────────────────

/// Serialize a `msgs_ack` acknowledging `ids`.
pub fn msgs_ack(ids: &[MsgId]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(12 + 8 * ids.len());
    put_u32(&mut buf, MSGS_ACK);
    put_msg_id_vector(&mut buf, ids);
    buf
}

/// Serialize an `http_wait` with the given parameters.
pub fn http_wait(max_delay: i32, wait_after: i32, max_wait: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16);
    put_u32(&mut buf, HTTP_WAIT);
    put_i32(&mut buf, max_delay);
    put_i32(&mut buf, wait_after);
    put_i32(&mut buf, max_wait);
    buf
}

/// Serialize a `msg_container` wrapping the given resolved messages.
///
/// Uses the *bare* vector form: a count followed by
/// `msg_id:long seqno:int bytes:int body` per message.
pub fn msg_container(messages: &[Message]) -> Vec<u8> {
    let inner: usize = messages.iter().map(|m| 16 + m.body.len()).sum();
    let mut buf = Vec::with_capacity(8 + inner);
    put_u32(&mut buf, MSG_CONTAINER);
    put_i32(&mut buf, messages.len() as i32);
    for message in messages {
        put_i64(&mut buf, message.id.0);
        put_i32(&mut buf, message.seq_no);
        put_i32(&mut buf, message.body.len() as i32);
        buf.extend(&message.body);
    }
    buf
}

/// Wrap `query` in `invokeAfterMsgs`, ordering it after `ids`.
pub fn invoke_after_msgs(ids: &[MsgId], query: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(12 + 8 * ids.len() + query.len());
    put_u32(&mut buf, INVOKE_AFTER_MSGS);
    put_msg_id_vector(&mut buf, ids);
    buf.extend(query);
    buf
}

/// Wrap `query` in `invokeWithLayer`.
pub fn invoke_with_layer(layer: i32, query: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + query.len());
    put_u32(&mut buf, INVOKE_WITH_LAYER);
    put_i32(&mut buf, layer);
    buf.extend(query);
    buf
}

// ─── initConnection ──────────────────────────────────────────────────────────

/// Client metadata sent in the `initConnection` envelope.
#[derive(Clone, Debug)]
pub struct InitParams {
    /// API ID issued for the application.
    pub api_id: i32,
    /// Device model string.
    pub device_model: String,
    /// OS / system version string.
    pub system_version: String,
    /// Application version string.
    pub app_version: String,
    /// System language code (e.g. `"en"`).
    pub system_lang_code: String,
    /// Language pack identifier (empty for none).
    pub lang_pack: String,
    /// User language code.
    pub lang_code: String,
}

impl InitParams {
    /// A copy with device and system strings masked out, as sent over
    /// CDN links.
    pub fn cdn_masked(&self) -> Self {
        Self {
            device_model: "n/a".into(),
            system_version: "n/a".into(),
            ..self.clone()
        }
    }
}

impl Default for InitParams {
    fn default() -> Self {
        Self {
            api_id: 0,
            device_model: "Unknown".into(),
            system_version: "1.0".into(),
            app_version: env!("CARGO_PKG_VERSION").into(),
            system_lang_code: "en".into(),
            lang_pack: String::new(),
            lang_code: "en".into(),
        }
    }
}

/// Wrap `query` in `initConnection` (no proxy, no params; flags = 0).
pub fn init_connection(params: &InitParams, query: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + query.len());
    put_u32(&mut buf, INIT_CONNECTION);
    put_u32(&mut buf, 0); // flags
    put_i32(&mut buf, params.api_id);
    put_str(&mut buf, &params.device_model);
    put_str(&mut buf, &params.system_version);
    put_str(&mut buf, &params.app_version);
    put_str(&mut buf, &params.system_lang_code);
    put_str(&mut buf, &params.lang_pack);
    put_str(&mut buf, &params.lang_code);
    buf.extend(query);
    buf
}
