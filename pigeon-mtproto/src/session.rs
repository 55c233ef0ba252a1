//! Per-connection crypto state read by the write path.

use crate::auth_key::AuthKey;

/// Whether the active key is a PFS temporary key or the permanent one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyKind {
    /// The long-lived key from the initial handshake.
    Permanent,
    /// A short-lived key that must be bound before ordinary use.
    Temporary,
}

/// The active authorization key together with its handshake progress.
#[derive(Clone, Debug)]
pub struct SessionKey {
    /// The key material itself.
    pub auth_key: AuthKey,
    /// Temporary (PFS) or permanent.
    pub kind: KeyKind,
    /// Whether `initConnection` has completed on this key.
    pub inited: bool,
    /// Whether a temporary key has been bound to the permanent one.
    /// Always `true` for permanent keys.
    pub bound: bool,
}

impl SessionKey {
    /// Wrap a freshly negotiated permanent key.
    pub fn permanent(auth_key: AuthKey) -> Self {
        Self { auth_key, kind: KeyKind::Permanent, inited: false, bound: true }
    }

    /// Wrap a freshly negotiated temporary key (unbound, uninited).
    pub fn temporary(auth_key: AuthKey) -> Self {
        Self { auth_key, kind: KeyKind::Temporary, inited: false, bound: false }
    }
}

/// Session-scoped crypto state: the active key, the session ID and the
/// current server salt.
///
/// Owned by the connection; the write path only ever reads it. The
/// handshake path may replace it, but must first park the writer (the
/// scheduler observes the reconnect signal before the key changes).
#[derive(Clone, Debug)]
pub struct SessionCrypto {
    /// Random 64-bit session identifier.
    pub session_id: i64,
    /// The active authorization key.
    pub key: SessionKey,
    /// Current server salt, included in every encrypted envelope.
    pub salt: i64,
}

impl SessionCrypto {
    /// Create session state with a fresh random session ID.
    pub fn new(key: SessionKey, salt: i64) -> Self {
        let mut rnd = [0u8; 8];
        getrandom::getrandom(&mut rnd).expect("getrandom failed");
        Self { session_id: i64::from_le_bytes(rnd), key, salt }
    }
}
