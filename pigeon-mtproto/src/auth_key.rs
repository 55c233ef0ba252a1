//! The 256-byte authorization key shared with the server.

use sha1::{Digest, Sha1};

/// An MTProto authorization key plus its pre-computed identifier.
#[derive(Clone)]
pub struct AuthKey {
    pub(crate) data: [u8; 256],
    pub(crate) key_id: [u8; 8],
}

impl AuthKey {
    /// Construct from the raw 256-byte DH output.
    pub fn from_bytes(data: [u8; 256]) -> Self {
        let sha: [u8; 20] = Sha1::digest(data).into();
        let mut key_id = [0u8; 8];
        key_id.copy_from_slice(&sha[12..20]);
        Self { data, key_id }
    }

    /// Return the raw 256-byte representation.
    pub fn to_bytes(&self) -> [u8; 256] {
        self.data
    }

    /// The 8-byte key identifier (`SHA-1(key)[12..20]`), prepended to
    /// every encrypted frame.
    pub fn key_id(&self) -> [u8; 8] {
        self.key_id
    }

    /// The fixed key slice hashed together with the padded plaintext to
    /// derive the per-message key (client side: bytes `88..120`).
    pub(crate) fn msg_key_material(&self) -> &[u8] {
        &self.data[88..120]
    }
}

impl std::fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthKey(id={})", u64::from_le_bytes(self.key_id))
    }
}

impl PartialEq for AuthKey {
    fn eq(&self, other: &Self) -> bool {
        self.key_id == other.key_id
    }
}
