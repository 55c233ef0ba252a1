//! MTProto session primitives for the outgoing half of a connection.
//!
//! This crate handles:
//! * Message-ID generation and per-session sequence numbers
//! * Plaintext framing (for the pre-handshake path)
//! * MTProto 2.0 message-key derivation and encrypted framing
//! * TL serialization of the protocol-control constructors the write
//!   path emits itself (`msgs_ack`, `http_wait`, `msg_container`, …)
//!
//! It is intentionally runtime-agnostic: the async queue and write loop
//! live in `pigeon-sender`, application call bodies arrive here already
//! serialized, and the block cipher is a seam ([`encrypted::Cipher`]).

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod auth_key;
pub mod encrypted;
pub mod message;
pub mod msg_id;
pub mod seq;
pub mod session;
pub mod tl;

pub use auth_key::AuthKey;
pub use encrypted::{Cipher, EncryptedFramer};
pub use message::Message;
pub use msg_id::{MsgId, MsgIdGenerator};
pub use seq::SequenceCounter;
pub use session::SessionCrypto;
