//! Wire-level message framing.

use crate::msg_id::MsgId;

/// One resolved wire message: an assigned ID, a sequence number and a
/// fully serialized TL body.
///
/// This is what the batcher produces for each accepted outgoing
/// message; a batch of more than one is wrapped in a `msg_container`
/// (see [`crate::tl::msg_container`]) before framing.
#[derive(Clone, Debug)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: MsgId,
    /// Session-scoped sequence number (odd = content-related).
    pub seq_no: i32,
    /// The serialized TL body (constructor ID + fields).
    pub body: Vec<u8>,
}

impl Message {
    /// Per-message overhead inside a container: `msg_id` (8) + `seq_no`
    /// (4) + `bytes` (4), plus slack the batcher budgets for the outer
    /// envelope.
    pub const ENVELOPE_LEN: usize = 32;

    /// Serialize into the plaintext (pre-handshake) wire format:
    ///
    /// ```text
    /// auth_key_id:long   (0 for plaintext)
    /// message_id:long
    /// message_data_length:int
    /// message_data:bytes
    /// padding:bytes      (random; alignment to 16 plus 0–15 extra blocks)
    /// ```
    ///
    /// The length field covers the body only, never the padding.
    pub fn to_plaintext_bytes(&self) -> Vec<u8> {
        let len = self.body.len();
        let mut extra = [0u8; 1];
        getrandom::getrandom(&mut extra).expect("getrandom failed");
        let pad_len = (len.wrapping_neg() & 15) + 16 * usize::from(extra[0] & 15);
        let mut pad = vec![0u8; pad_len];
        getrandom::getrandom(&mut pad).expect("getrandom failed");

        let mut buf = Vec::with_capacity(8 + 8 + 4 + len + pad_len);
        buf.extend(0i64.to_le_bytes());
        buf.extend(self.id.0.to_le_bytes());
        buf.extend((len as u32).to_le_bytes());
        buf.extend(&self.body);
        buf.extend(pad);
        buf
    }
}
