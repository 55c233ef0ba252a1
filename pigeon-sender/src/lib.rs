//! The outgoing half of an MTProto connection.
//!
//! Producers enqueue [`OutgoingMessage`]s through an [`Enqueuer`]; the
//! scheduler started by [`Sender::run`] drains them through batching
//! passes ([`batch`]) into encrypted or plaintext frames and hands the
//! bytes to a [`Transport`]. Sent messages move into an
//! outgoing-tracking map keyed by message ID, where the (external)
//! read path acknowledges, resolves or re-queues them.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod config;
pub mod message;
pub mod queue;
pub mod transport;
pub mod write_loop;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pigeon_mtproto::encrypted::{Cipher, EncryptedFramer};
use pigeon_mtproto::msg_id::{MsgId, MsgIdGenerator};
use pigeon_mtproto::seq::SequenceCounter;
use pigeon_mtproto::session::SessionCrypto;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

pub use batch::{BatchOutcome, Frame, MAX_FRAME_BYTES, MAX_MESSAGES_PER_FRAME};
pub use config::SenderConfig;
pub use message::{Method, OutgoingMessage, Payload, ReplyHandle, Slot, State};
pub use queue::PendingQueue;
pub use transport::Transport;
pub use write_loop::LoopExit;

/// Queue-side state guarded by one lock: passes take it briefly to
/// select/commit, producers to insert. Never held across transport I/O.
pub(crate) struct Inner {
    pub(crate) queue: PendingQueue,
    pub(crate) sent: HashMap<MsgId, OutgoingMessage>,
    pub(crate) crypto: Option<SessionCrypto>,
    pub(crate) msg_ids: MsgIdGenerator,
    pub(crate) seq: SequenceCounter,
}

pub(crate) struct Shared {
    pub(crate) inner: Mutex<Inner>,
    pub(crate) wake: Notify,
    pub(crate) writing: AtomicBool,
    pub(crate) config: SenderConfig,
}

/// Owns a connection's write path; [`Sender::run`] drives one
/// scheduler instance at a time.
pub struct Sender {
    shared: Arc<Shared>,
}

impl Sender {
    /// Create the write path for one connection.
    ///
    /// `crypto` is `None` until the handshake produces an auth key; the
    /// scheduler uses the plaintext path in the meantime.
    pub fn new(crypto: Option<SessionCrypto>, config: SenderConfig) -> (Self, Enqueuer) {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                queue: PendingQueue::new(),
                sent: HashMap::new(),
                crypto,
                msg_ids: MsgIdGenerator::new(0),
                seq: SequenceCounter::new(),
            }),
            wake: Notify::new(),
            writing: AtomicBool::new(false),
            config,
        });
        (Self { shared: Arc::clone(&shared) }, Enqueuer { shared })
    }

    /// Run one scheduler instance until it exits.
    ///
    /// Cancelling `cancel` pauses the write path cleanly (the queue is
    /// preserved); call `run` again with a fresh token to resume —
    /// after a reconnect, for instance.
    pub async fn run<T: Transport, C: Cipher>(
        &self,
        transport: T,
        cipher: C,
        cancel: CancellationToken,
    ) -> LoopExit {
        write_loop::WriteLoop {
            shared: Arc::clone(&self.shared),
            transport,
            framer: EncryptedFramer::new(cipher),
            cancel,
        }
        .run()
        .await
    }

    /// Whether a batching/framing pass is currently executing.
    pub fn is_writing(&self) -> bool {
        self.shared.writing.load(Ordering::SeqCst)
    }
}

/// Cloneable handle used by producers and by the connection's read
/// path.
#[derive(Clone)]
pub struct Enqueuer {
    shared: Arc<Shared>,
}

impl Enqueuer {
    /// Add a message to the pending queue and wake the scheduler.
    pub async fn enqueue(&self, message: OutgoingMessage) {
        self.shared.inner.lock().await.queue.push(message);
        self.shared.wake.notify_one();
    }

    /// Queue an incoming message ID for the next acknowledgment batch.
    pub async fn queue_ack(&self, id: MsgId) {
        self.shared.inner.lock().await.queue.queue_ack(id);
        self.shared.wake.notify_one();
    }

    /// Mark a message as replied, wherever it currently lives. A
    /// replied message still in the pending queue is dropped instead of
    /// re-sent on the next pass.
    pub async fn mark_replied(&self, id: MsgId) {
        let mut inner = self.shared.inner.lock().await;
        if let Some(message) = inner.sent.get_mut(&id) {
            message.mark_replied();
        }
        let key = inner
            .queue
            .iter()
            .find(|(_, message)| message.msg_id() == Some(id))
            .map(|(key, _)| key);
        if let Some(key) = key {
            if let Some(message) = inner.queue.get_mut(key) {
                message.mark_replied();
            }
        }
    }

    /// Remove a sent message from the outgoing-tracking map. The read
    /// path is the sole authority for this: it resolves the message's
    /// completion handle or re-queues it.
    pub async fn take_sent(&self, id: MsgId) -> Option<OutgoingMessage> {
        self.shared.inner.lock().await.sent.remove(&id)
    }

    /// Number of messages waiting in the pending queue.
    pub async fn pending_len(&self) -> usize {
        self.shared.inner.lock().await.queue.len()
    }

    /// Number of sent messages awaiting acknowledgment.
    pub async fn sent_len(&self) -> usize {
        self.shared.inner.lock().await.sent.len()
    }

    /// Wake the scheduler explicitly.
    pub fn wake(&self) {
        self.shared.wake.notify_one();
    }

    // ── handshake-path mutators ────────────────────────────────────────────
    //
    // The write path only reads crypto state; these are for the
    // handshake/read path, which must park the scheduler (stale
    // transport or cancellation) before swapping keys.

    /// Install or replace the session crypto state.
    pub async fn install_crypto(&self, crypto: SessionCrypto) {
        self.shared.inner.lock().await.crypto = Some(crypto);
        self.shared.wake.notify_one();
    }

    /// Update the server salt.
    pub async fn update_salt(&self, salt: i64) {
        if let Some(crypto) = &mut self.shared.inner.lock().await.crypto {
            crypto.salt = salt;
        }
    }

    /// Record that `initConnection` completed on the active key.
    pub async fn note_inited(&self) {
        if let Some(crypto) = &mut self.shared.inner.lock().await.crypto {
            crypto.key.inited = true;
        }
        self.shared.wake.notify_one();
    }

    /// Record that the temporary key was bound to the permanent one.
    pub async fn note_bound(&self) {
        if let Some(crypto) = &mut self.shared.inner.lock().await.crypto {
            crypto.key.bound = true;
        }
        self.shared.wake.notify_one();
    }

    /// Apply a server clock correction to future message IDs.
    pub async fn set_time_offset(&self, offset: i32) {
        self.shared.inner.lock().await.msg_ids.set_time_offset(offset);
    }
}
