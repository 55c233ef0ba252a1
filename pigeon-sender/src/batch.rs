//! The batching pass: selects pending messages under the frame
//! budgets, applies gating and wrapping rules, and resolves a single
//! frame (bare or containerized) ready for the framer.

use std::collections::HashMap;

use pigeon_mtproto::message::Message;
use pigeon_mtproto::msg_id::{MsgId, MsgIdGenerator};
use pigeon_mtproto::seq::SequenceCounter;
use pigeon_mtproto::session::SessionCrypto;
use pigeon_mtproto::tl;

use crate::config::SenderConfig;
use crate::message::{Method, OutgoingMessage, Payload, Slot};
use crate::queue::PendingQueue;

/// Maximum serialized size of a frame's inner batch, with each
/// message's contribution counted as body length plus
/// [`Message::ENVELOPE_LEN`].
pub const MAX_FRAME_BYTES: usize = 32760;

/// Maximum number of messages in one frame; also caps the IDs in one
/// acknowledgment batch.
pub const MAX_MESSAGES_PER_FRAME: usize = 1020;

/// One frame resolved by a batching pass.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Outer message ID (the container's, for a containerized batch).
    pub msg_id: MsgId,
    /// Outer sequence number.
    pub seq_no: i32,
    /// Serialized frame body (container or lone message body).
    pub body: Vec<u8>,
}

/// Everything a pass decided, applied atomically by [`commit`] after a
/// successful transport write.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// The resolved frame, or `None` when nothing was eligible.
    pub frame: Option<Frame>,
    /// `(insertion key, assigned id)` of every transmitted message,
    /// including the container entry when one was created.
    pub accepted: Vec<(u64, MsgId)>,
    /// How many ack-queue IDs the synthetic `msgs_ack` consumed.
    pub ack_count: usize,
    /// Eligible messages were left queued by gating (unbound key,
    /// uninited connection); the caller must not treat the queue as
    /// drained.
    pub skipped: bool,
}

/// Run one batching pass over `queue`.
///
/// Mutates the queue (drops replied messages and stale containers,
/// records chain IDs, inserts the container entry) and assigns message
/// IDs and sequence numbers to every accepted message. Removal of
/// accepted entries is deferred to [`commit`] so a failed transport
/// write leaves the queue intact.
pub fn resolve_batch(
    queue: &mut PendingQueue,
    msg_ids: &mut MsgIdGenerator,
    seq: &mut SequenceCounter,
    crypto: &SessionCrypto,
    config: &SenderConfig,
) -> BatchOutcome {
    let mut parts: Vec<Message> = Vec::new();
    let mut accepted: Vec<(u64, MsgId)> = Vec::new();
    let mut total_len = 0usize;
    let mut skipped = false;
    let mut has_seq = false;
    let mut has_state = false;
    let mut has_resend = false;
    let mut has_http_wait = false;

    for key in queue.keys_snapshot() {
        let Some(message) = queue.get(key) else { continue };
        if message.is_plain() {
            continue;
        }
        if message.is_replied() {
            tracing::debug!("dropping message {key}: already got a reply");
            queue.remove(key);
            continue;
        }
        if matches!(message.payload(), Payload::Container(_)) {
            // Left over from a failed pass; regenerated, never resent.
            queue.remove(key);
            continue;
        }

        if config.pfs
            && !crypto.key.bound
            && !config.is_cdn
            && matches!(
                message.payload(),
                Payload::Call { method: Method::Plain | Method::Ping, .. }
            )
        {
            tracing::debug!("skipping message {key}: temp key not yet bound");
            skipped = true;
            continue;
        }

        match message.payload() {
            Payload::HttpWait => has_http_wait = true,
            Payload::StateRequest(_) => {
                if has_state {
                    tracing::debug!("state request already queued for this container");
                    continue;
                }
                has_state = true;
            }
            Payload::ResendRequest(_) => {
                if has_resend {
                    queue.remove(key);
                    continue;
                }
                has_resend = true;
            }
            _ => {}
        }

        let body_len = message.payload().serialized_len();
        if (total_len > 0 && total_len + body_len + Message::ENVELOPE_LEN > MAX_FRAME_BYTES)
            || parts.len() >= MAX_MESSAGES_PER_FRAME
        {
            tracing::debug!("length overflow, postponing part of payload");
            break;
        }

        // Init gating happens before any assignment so a postponed
        // message keeps an untouched slot.
        let init_pending = !crypto.key.inited
            && matches!(
                message.payload(),
                Payload::Call { method: Method::Plain | Method::Bootstrap, .. }
            );
        if init_pending && !matches!(message.payload(), Payload::Call { method: Method::Bootstrap, .. }) {
            tracing::debug!("skipping message {key}: connection not inited");
            skipped = true;
            continue;
        }

        let previously_assigned = matches!(message.slot(), Slot::Assigned { .. });
        let (msg_id, assigned_seq) = match message.slot() {
            Slot::Assigned { id, seq_no } => (id, Some(seq_no)),
            Slot::Unassigned => (msg_ids.next(), None),
        };
        let content_related = message.payload().content_related();
        let chainable = matches!(
            message.payload(),
            Payload::Call { method: Method::Plain | Method::Bootstrap, .. }
        );
        let queue_id = message.queue_id();
        let mut body = message.payload().serialize_body();

        if init_pending {
            // Bootstrap call doubles as the connection handshake.
            tracing::info!("writing client info (layer {})", config.layer);
            let init = if config.is_cdn { config.init.cdn_masked() } else { config.init.clone() };
            body = tl::invoke_with_layer(config.layer, &tl::init_connection(&init, &body));
        } else if let (true, Some(queue_id)) = (chainable, queue_id) {
            body = tl::invoke_after_msgs(&queue.chain_ids(queue_id, msg_id), &body);
            queue.chain_push(queue_id, msg_id, config.call_queue_limit);
        }

        let actual_len = body.len() + Message::ENVELOPE_LEN;
        if total_len > 0 && total_len + actual_len > MAX_FRAME_BYTES {
            tracing::debug!("length overflow after wrapping, postponing part of payload");
            break;
        }

        let seq_no = assigned_seq.unwrap_or_else(|| seq.next(content_related));
        has_seq |= content_related || previously_assigned;

        if !previously_assigned {
            let message = queue.get_mut(key).expect("entry vanished during pass");
            message.assign(msg_id, seq_no);
        }

        total_len += actual_len;
        parts.push(Message { id: msg_id, seq_no, body });
        accepted.push((key, msg_id));
    }

    // Synthetic msgs_ack, sized to both budgets so the frame bounds
    // hold no matter how full the batch already is.
    let mut ack_count = 0;
    if !queue.acks().is_empty() && parts.len() < MAX_MESSAGES_PER_FRAME {
        let budget = MAX_FRAME_BYTES
            .saturating_sub(total_len + Message::ENVELOPE_LEN + 12)
            / 8;
        let count = queue.acks().len().min(MAX_MESSAGES_PER_FRAME).min(budget);
        if count > 0 {
            tracing::debug!("adding msgs_ack for {count} ids");
            let body = tl::msgs_ack(&queue.acks()[..count]);
            total_len += body.len() + Message::ENVELOPE_LEN;
            parts.push(Message { id: msg_ids.next(), seq_no: seq.next(false), body });
            ack_count = count;
        }
    }

    // Poll transports must always carry an http_wait.
    if config.is_http && !has_http_wait && parts.len() < MAX_MESSAGES_PER_FRAME {
        let body = tl::http_wait(0, 0, 30_000);
        if total_len + body.len() + Message::ENVELOPE_LEN <= MAX_FRAME_BYTES {
            tracing::debug!("adding http_wait");
            total_len += body.len() + Message::ENVELOPE_LEN;
            parts.push(Message { id: msg_ids.next(), seq_no: seq.next(true), body });
        }
    }

    debug_assert!(parts.len() <= MAX_MESSAGES_PER_FRAME);
    debug_assert!(parts.len() <= 1 || total_len <= MAX_FRAME_BYTES);

    let frame = if parts.len() > 1 || has_seq {
        tracing::debug!(
            "wrapping {} messages of total size {total_len} in a container",
            parts.len()
        );
        let msg_id = msg_ids.next();
        let seq_no = seq.next(false);
        let body = tl::msg_container(&parts);
        let inner_ids: Vec<MsgId> = parts.iter().map(|part| part.id).collect();
        let key = queue.push(OutgoingMessage::container(inner_ids));
        let container = queue.get_mut(key).expect("container just inserted");
        container.assign(msg_id, seq_no);
        accepted.push((key, msg_id));
        Some(Frame { msg_id, seq_no, body })
    } else if let Some(part) = parts.pop() {
        Some(Frame { msg_id: part.id, seq_no: part.seq_no, body: part.body })
    } else {
        tracing::debug!("no message sent");
        None
    };

    if frame.is_none() {
        // Nothing was assigned, so nothing may be committed.
        debug_assert!(accepted.is_empty());
        return BatchOutcome { frame: None, accepted: Vec::new(), ack_count: 0, skipped };
    }

    BatchOutcome { frame, accepted, ack_count, skipped }
}

/// Apply a successful pass: move accepted entries out of the pending
/// queue into the outgoing-tracking map and trim the transmitted ack
/// IDs. Call only after the transport write succeeded.
pub fn commit(
    queue: &mut PendingQueue,
    sent: &mut HashMap<MsgId, OutgoingMessage>,
    outcome: &BatchOutcome,
) {
    for (key, msg_id) in &outcome.accepted {
        if let Some(mut message) = queue.remove(*key) {
            message.sent();
            sent.insert(*msg_id, message);
        }
    }
    queue.drain_acks(outcome.ack_count);
}
