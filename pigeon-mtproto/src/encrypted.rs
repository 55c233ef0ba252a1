//! MTProto 2.0 encrypted framing.
//!
//! The message key is derived here; executing the block cipher is the
//! job of an external [`Cipher`] implementation (AES-256-IGE in a real
//! client). Keeping the cipher behind a seam keeps this crate free of
//! cipher dependencies and lets tests substitute a reference
//! implementation.

use sha2::{Digest, Sha256};

use crate::auth_key::AuthKey;
use crate::msg_id::MsgId;

/// Block-cipher primitive used to seal outgoing frames.
///
/// `derive_key_iv` expands the 16-byte message key and the authorization
/// key into cipher parameters; `encrypt`/`decrypt` run the cipher
/// in-place over a 16-byte-aligned buffer.
pub trait Cipher {
    /// Derive the per-message cipher key and IV.
    fn derive_key_iv(&self, msg_key: &[u8; 16], auth_key: &AuthKey) -> ([u8; 32], [u8; 32]);

    /// Encrypt `buf` in place. `buf.len()` is a multiple of 16.
    fn encrypt(&self, buf: &mut [u8], key: &[u8; 32], iv: &[u8; 32]);

    /// Decrypt `buf` in place. `buf.len()` is a multiple of 16.
    fn decrypt(&self, buf: &mut [u8], key: &[u8; 32], iv: &[u8; 32]);
}

/// Errors from [`EncryptedFramer::decrypt_frame`].
#[derive(Clone, Debug, PartialEq)]
pub enum DecryptError {
    /// Ciphertext too short or not block-aligned.
    InvalidBuffer,
    /// The `auth_key_id` in the frame does not match our key.
    AuthKeyMismatch,
    /// The `msg_key` in the frame does not match our computed value.
    MessageKeyMismatch,
    /// The decrypted envelope was too short to contain a header.
    FrameTooShort,
}

impl std::fmt::Display for DecryptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBuffer => write!(f, "invalid ciphertext buffer length"),
            Self::AuthKeyMismatch => write!(f, "auth_key_id mismatch"),
            Self::MessageKeyMismatch => write!(f, "msg_key mismatch"),
            Self::FrameTooShort => write!(f, "inner plaintext too short"),
        }
    }
}
impl std::error::Error for DecryptError {}

/// The envelope recovered by [`EncryptedFramer::decrypt_frame`].
#[derive(Debug)]
pub struct Envelope {
    /// Server salt from the envelope.
    pub salt: i64,
    /// Session ID from the envelope.
    pub session_id: i64,
    /// Message ID of the (outer) message.
    pub msg_id: MsgId,
    /// Sequence number of the (outer) message.
    pub seq_no: i32,
    /// TL-serialized body.
    pub body: Vec<u8>,
    /// Number of random padding bytes that followed the body.
    pub padding_len: usize,
}

/// Seals resolved frames with MTProto 2.0 message encryption.
pub struct EncryptedFramer<C> {
    cipher: C,
}

impl<C: Cipher> EncryptedFramer<C> {
    /// Wrap a cipher implementation.
    pub fn new(cipher: C) -> Self {
        Self { cipher }
    }

    /// Build and seal one encrypted frame.
    ///
    /// Envelope layout before encryption:
    /// ```text
    /// salt:       i64
    /// session_id: i64
    /// msg_id:     i64
    /// seq_no:     i32
    /// body_len:   u32
    /// body:       [u8; body_len]
    /// padding:    12..=27 random bytes, total aligned to 16
    /// ```
    /// The output is `auth_key_id (8) ‖ msg_key (16) ‖ ciphertext`.
    pub fn encrypt_frame(
        &self,
        auth_key: &AuthKey,
        salt: i64,
        session_id: i64,
        msg_id: MsgId,
        seq_no: i32,
        body: &[u8],
    ) -> Vec<u8> {
        let envelope_len = 8 + 8 + 8 + 4 + 4 + body.len();
        let mut pad_len = envelope_len.wrapping_neg() & 15;
        if pad_len < 12 {
            pad_len += 16;
        }
        let mut padding = vec![0u8; pad_len];
        getrandom::getrandom(&mut padding).expect("getrandom failed");

        let mut plaintext = Vec::with_capacity(envelope_len + pad_len);
        plaintext.extend(salt.to_le_bytes());
        plaintext.extend(session_id.to_le_bytes());
        plaintext.extend(msg_id.0.to_le_bytes());
        plaintext.extend(seq_no.to_le_bytes());
        plaintext.extend((body.len() as u32).to_le_bytes());
        plaintext.extend(body);
        plaintext.extend(padding);

        let msg_key = derive_msg_key(auth_key, &plaintext);
        let (key, iv) = self.cipher.derive_key_iv(&msg_key, auth_key);
        self.cipher.encrypt(&mut plaintext, &key, &iv);

        let mut frame = Vec::with_capacity(24 + plaintext.len());
        frame.extend(auth_key.key_id());
        frame.extend(msg_key);
        frame.extend(plaintext);
        frame
    }

    /// Invert [`Self::encrypt_frame`]: open a frame sealed with the same
    /// key (client-side derivation; used by tests and loopbacks — the
    /// inbound path derives server-side parameters instead).
    pub fn decrypt_frame(&self, auth_key: &AuthKey, frame: &[u8]) -> Result<Envelope, DecryptError> {
        if frame.len() < 24 + 32 || (frame.len() - 24) % 16 != 0 {
            return Err(DecryptError::InvalidBuffer);
        }
        if frame[..8] != auth_key.key_id() {
            return Err(DecryptError::AuthKeyMismatch);
        }
        let mut msg_key = [0u8; 16];
        msg_key.copy_from_slice(&frame[8..24]);

        let (key, iv) = self.cipher.derive_key_iv(&msg_key, auth_key);
        let mut plaintext = frame[24..].to_vec();
        self.cipher.decrypt(&mut plaintext, &key, &iv);

        if derive_msg_key(auth_key, &plaintext) != msg_key {
            return Err(DecryptError::MessageKeyMismatch);
        }

        let salt = i64::from_le_bytes(plaintext[..8].try_into().unwrap());
        let session_id = i64::from_le_bytes(plaintext[8..16].try_into().unwrap());
        let msg_id = i64::from_le_bytes(plaintext[16..24].try_into().unwrap());
        let seq_no = i32::from_le_bytes(plaintext[24..28].try_into().unwrap());
        let body_len = u32::from_le_bytes(plaintext[28..32].try_into().unwrap()) as usize;
        if plaintext.len() - 32 < body_len {
            return Err(DecryptError::FrameTooShort);
        }

        Ok(Envelope {
            salt,
            session_id,
            msg_id: MsgId(msg_id),
            seq_no,
            body: plaintext[32..32 + body_len].to_vec(),
            padding_len: plaintext.len() - 32 - body_len,
        })
    }
}

/// `msg_key = SHA-256(auth_key[88..120] ‖ padded plaintext)[8..24]`.
fn derive_msg_key(auth_key: &AuthKey, padded_plaintext: &[u8]) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(auth_key.msg_key_material());
    hasher.update(padded_plaintext);
    let digest: [u8; 32] = hasher.finalize().into();
    let mut msg_key = [0u8; 16];
    msg_key.copy_from_slice(&digest[8..24]);
    msg_key
}
