//! Per-connection outgoing sequence numbers.

/// Generates MTProto `seq_no` values for one connection.
///
/// Content-related messages (RPC calls and anything else the server
/// must acknowledge) consume a slot: they get `count * 2 + 1` and
/// advance the counter. Content-unrelated messages (acks, containers)
/// get `count * 2` without advancing it, so the server can detect gaps
/// in the related sequence.
///
/// There is deliberately no `reset`: the counter lives and dies with
/// the session, and a renegotiated session constructs a fresh one.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    count: i32,
}

impl SequenceCounter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self { count: 0 }
    }

    /// Return the next `seq_no`.
    pub fn next(&mut self, content_related: bool) -> i32 {
        if content_related {
            let seq_no = self.count * 2 + 1;
            self.count += 1;
            seq_no
        } else {
            self.count * 2
        }
    }
}
