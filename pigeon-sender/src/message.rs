//! The outgoing-message state object.

use pigeon_mtproto::msg_id::MsgId;
use pigeon_mtproto::tl;
use tokio::sync::oneshot;

/// How a method call interacts with connection gating.
///
/// Matching on this replaces the constructor-name string comparisons a
/// dynamic client would do.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    /// An ordinary API method: gated on both connection init and PFS
    /// key binding.
    Plain,
    /// `help.getConfig` / `upload.getCdnFile`: allowed to double as the
    /// init handshake (wrapped in the `initConnection` envelope) and
    /// exempt from PFS gating so a fresh connection can bootstrap.
    Bootstrap,
    /// `auth.bindTempAuthKey`: exempt from PFS gating (it *is* the
    /// binding) and from init wrapping.
    BindTempKey,
    /// `ping_delay_disconnect`: exempt from init wrapping only.
    Ping,
}

/// What an [`OutgoingMessage`] carries on the wire.
#[derive(Clone, Debug)]
pub enum Payload {
    /// A pre-serialized application RPC call.
    Call {
        /// Gating class of the call.
        method: Method,
        /// TL-serialized body from the schema layer.
        body: Vec<u8>,
    },
    /// `msgs_ack`: a batch of message IDs to acknowledge.
    Ack(Vec<MsgId>),
    /// `http_wait`: keeps a poll transport open.
    HttpWait,
    /// `msgs_state_req` (pre-serialized by the read path).
    StateRequest(Vec<u8>),
    /// `msg_resend_req` (pre-serialized by the read path).
    ResendRequest(Vec<u8>),
    /// A `msg_container` the batcher emitted earlier; records the IDs
    /// it wrapped. Never re-sent as-is — a stale one found in the queue
    /// is dropped and regenerated.
    Container(Vec<MsgId>),
}

impl Payload {
    /// Whether this message consumes a content-related sequence slot.
    pub fn content_related(&self) -> bool {
        match self {
            Self::Call { .. } | Self::StateRequest(_) | Self::ResendRequest(_) | Self::HttpWait => {
                true
            }
            Self::Ack(_) | Self::Container(_) => false,
        }
    }

    /// Serialized body length, before any wrapping.
    pub(crate) fn serialized_len(&self) -> usize {
        match self {
            Self::Call { body, .. } | Self::StateRequest(body) | Self::ResendRequest(body) => {
                body.len()
            }
            Self::Ack(ids) => 12 + 8 * ids.len(),
            Self::HttpWait => 16,
            Self::Container(_) => 0,
        }
    }

    /// Serialize the body (control constructors are built here,
    /// application calls are already bytes).
    pub(crate) fn serialize_body(&self) -> Vec<u8> {
        match self {
            Self::Call { body, .. } | Self::StateRequest(body) | Self::ResendRequest(body) => {
                body.clone()
            }
            Self::Ack(ids) => tl::msgs_ack(ids),
            Self::HttpWait => tl::http_wait(0, 0, 30_000),
            Self::Container(_) => {
                debug_assert!(false, "stale containers are dropped, never serialized");
                Vec::new()
            }
        }
    }
}

/// Delivery state of an outgoing message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    /// Waiting in the pending queue.
    Queued,
    /// Written to the transport, awaiting acknowledgment.
    Sent,
    /// The read path saw a reply; must never be transmitted again.
    Replied,
}

/// ID/sequence assignment. Messages are created unassigned; the
/// batcher assigns both exactly once, at acceptance, so a message that
/// skipped assignment cannot reach the framer.
#[derive(Clone, Copy, Debug)]
pub enum Slot {
    /// Not yet accepted by a batching pass.
    Unassigned,
    /// Accepted: carries its wire identity, kept across re-sends.
    Assigned {
        /// The message ID.
        id: MsgId,
        /// The sequence number.
        seq_no: i32,
    },
}

/// Completion handle: receives the raw reply body, or is dropped if
/// the message can never complete.
pub type ReplyHandle = oneshot::Sender<Vec<u8>>;

/// One queued unit of outgoing work.
#[derive(Debug)]
pub struct OutgoingMessage {
    payload: Payload,
    slot: Slot,
    state: State,
    queue_id: Option<u64>,
    reply: Option<ReplyHandle>,
    /// Pre-handshake message: framed without encryption.
    plain: bool,
}

impl OutgoingMessage {
    /// An encrypted application call.
    pub fn call(method: Method, body: Vec<u8>) -> Self {
        Self::new(Payload::Call { method, body })
    }

    /// A pre-handshake call, framed on the plaintext path.
    pub fn plain_call(body: Vec<u8>) -> Self {
        let mut message = Self::new(Payload::Call { method: Method::Plain, body });
        message.plain = true;
        message
    }

    /// An explicit acknowledgment batch.
    pub fn ack(ids: Vec<MsgId>) -> Self {
        Self::new(Payload::Ack(ids))
    }

    /// An `http_wait` control message.
    pub fn http_wait() -> Self {
        Self::new(Payload::HttpWait)
    }

    /// A `msgs_state_req` built by the read path.
    pub fn state_request(body: Vec<u8>) -> Self {
        Self::new(Payload::StateRequest(body))
    }

    /// A `msg_resend_req` built by the read path.
    pub fn resend_request(body: Vec<u8>) -> Self {
        Self::new(Payload::ResendRequest(body))
    }

    pub(crate) fn container(ids: Vec<MsgId>) -> Self {
        Self::new(Payload::Container(ids))
    }

    fn new(payload: Payload) -> Self {
        Self { payload, slot: Slot::Unassigned, state: State::Queued, queue_id: None, reply: None, plain: false }
    }

    /// Attach this call to an ordering chain: the server will process
    /// it only after the chain's currently pending calls.
    pub fn with_queue_id(mut self, queue_id: u64) -> Self {
        self.queue_id = Some(queue_id);
        self
    }

    /// Attach a completion handle.
    pub fn with_reply(mut self, reply: ReplyHandle) -> Self {
        self.reply = Some(reply);
        self
    }

    // ── accessors ──────────────────────────────────────────────────────────

    /// The wire payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Current delivery state.
    pub fn state(&self) -> State {
        self.state
    }

    /// ID/sequence assignment, if any.
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// The ordering-chain ID, if any.
    pub fn queue_id(&self) -> Option<u64> {
        self.queue_id
    }

    /// Whether this message uses the plaintext (pre-handshake) path.
    pub fn is_plain(&self) -> bool {
        self.plain
    }

    /// Whether the read path already saw a reply.
    pub fn is_replied(&self) -> bool {
        self.state == State::Replied
    }

    /// The assigned message ID, if the batcher accepted this message.
    pub fn msg_id(&self) -> Option<MsgId> {
        match self.slot {
            Slot::Assigned { id, .. } => Some(id),
            Slot::Unassigned => None,
        }
    }

    /// Take the completion handle (the read path resolves it).
    pub fn take_reply_handle(&mut self) -> Option<ReplyHandle> {
        self.reply.take()
    }

    // ── lifecycle (crate-internal + read path) ─────────────────────────────

    pub(crate) fn assign(&mut self, id: MsgId, seq_no: i32) {
        debug_assert!(
            matches!(self.slot, Slot::Unassigned),
            "message id assigned twice"
        );
        self.slot = Slot::Assigned { id, seq_no };
    }

    pub(crate) fn sent(&mut self) {
        if self.state == State::Queued {
            self.state = State::Sent;
        }
    }

    /// Mark as replied. Authoritative for removal: a replied message is
    /// dropped from the pending queue instead of being re-sent.
    pub fn mark_replied(&mut self) {
        self.state = State::Replied;
    }
}
