//! Client-side message identifiers.

use std::time::{SystemTime, UNIX_EPOCH};

/// A 64-bit MTProto message identifier.
///
/// The upper 32 bits are derived from the (server-corrected) Unix time;
/// the lower bits encode sub-second precision. The least significant
/// two bits are zero for client-originated messages.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MsgId(pub i64);

impl std::fmt::Display for MsgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues strictly increasing [`MsgId`]s for one session.
///
/// IDs are time-derived; when the wall clock does not advance past the
/// last issued value (clock skew, bursts within the same tick) the
/// generator falls back to `last + 4`, preserving both monotonicity and
/// the client-side low-bit invariant. Generation cannot fail.
#[derive(Debug, Default)]
pub struct MsgIdGenerator {
    last: i64,
    /// Clock skew in seconds vs. the server.
    time_offset: i32,
}

impl MsgIdGenerator {
    /// Create a generator with the given server clock correction.
    pub fn new(time_offset: i32) -> Self {
        Self { last: 0, time_offset }
    }

    /// Issue the next message ID.
    pub fn next(&mut self) -> MsgId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let secs = (now.as_secs() as i64).wrapping_add(i64::from(self.time_offset)) as u64;
        let quarter_nanos = u64::from(now.subsec_nanos() / 4);
        let mut id = ((secs << 32) | (quarter_nanos << 2)) as i64;
        if self.last >= id {
            log::trace!("clock did not advance, stepping msg_id past {}", self.last);
            id = self.last + 4;
        }
        self.last = id;
        MsgId(id)
    }

    /// Update the server clock correction (applied to subsequent IDs).
    pub fn set_time_offset(&mut self, offset: i32) {
        self.time_offset = offset;
    }
}
