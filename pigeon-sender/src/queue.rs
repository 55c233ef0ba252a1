//! The ordered pending queue and its auxiliary bookkeeping.

use std::collections::{BTreeMap, HashMap, VecDeque};

use pigeon_mtproto::msg_id::MsgId;

use crate::message::OutgoingMessage;

/// Ordered collection of not-yet-sent messages, plus the ack-ID queue
/// and the per-chain `invokeAfterMsgs` bookkeeping.
///
/// Entries are keyed by a monotonically increasing insertion key; the
/// `BTreeMap` keeps iteration in key order, which is what makes batch
/// composition deterministic regardless of producer interleaving.
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: BTreeMap<u64, OutgoingMessage>,
    next_key: u64,
    acks: Vec<MsgId>,
    chains: HashMap<u64, VecDeque<MsgId>>,
}

impl PendingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message, returning its insertion key.
    pub fn push(&mut self, message: OutgoingMessage) -> u64 {
        let key = self.next_key;
        self.next_key += 1;
        self.entries.insert(key, message);
        key
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The keys in iteration order, captured at pass start so a pass
    /// works over a stable snapshot while removing entries.
    pub fn keys_snapshot(&self) -> Vec<u64> {
        self.entries.keys().copied().collect()
    }

    /// Borrow an entry.
    pub fn get(&self, key: u64) -> Option<&OutgoingMessage> {
        self.entries.get(&key)
    }

    /// Mutably borrow an entry.
    pub fn get_mut(&mut self, key: u64) -> Option<&mut OutgoingMessage> {
        self.entries.get_mut(&key)
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: u64) -> Option<OutgoingMessage> {
        self.entries.remove(&key)
    }

    /// Iterate over pending entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &OutgoingMessage)> {
        self.entries.iter().map(|(k, m)| (*k, m))
    }

    // ── ack queue ──────────────────────────────────────────────────────────

    /// Queue an ID for the next acknowledgment batch.
    pub fn queue_ack(&mut self, id: MsgId) {
        self.acks.push(id);
    }

    /// IDs awaiting acknowledgment-batch emission.
    pub fn acks(&self) -> &[MsgId] {
        &self.acks
    }

    /// Drop the first `count` ack IDs (they were just transmitted).
    pub fn drain_acks(&mut self, count: usize) {
        self.acks.drain(..count.min(self.acks.len()));
    }

    // ── ordering chains ────────────────────────────────────────────────────

    /// IDs currently pending in a chain, excluding `own` (a retried
    /// call is already recorded and must never be ordered after
    /// itself).
    pub fn chain_ids(&self, queue_id: u64, own: MsgId) -> Vec<MsgId> {
        self.chains
            .get(&queue_id)
            .map(|chain| chain.iter().copied().filter(|id| *id != own).collect())
            .unwrap_or_default()
    }

    /// Record `id` in a chain, bounding it to `limit` entries (oldest
    /// forgotten first — only the chain bookkeeping, never the wire).
    pub fn chain_push(&mut self, queue_id: u64, id: MsgId, limit: usize) {
        let chain = self.chains.entry(queue_id).or_default();
        if !chain.contains(&id) {
            chain.push_back(id);
        }
        while chain.len() > limit {
            chain.pop_front();
        }
    }

    /// Number of IDs tracked for a chain.
    pub fn chain_len(&self, queue_id: u64) -> usize {
        self.chains.get(&queue_id).map_or(0, VecDeque::len)
    }
}
