//! Write-path configuration.

use pigeon_mtproto::tl::InitParams;

/// The TL schema layer requested in `invokeWithLayer`.
pub const DEFAULT_LAYER: i32 = 195;

/// Static configuration for one connection's write path.
///
/// The frame budgets themselves are protocol constants (see
/// [`crate::batch`]), not configuration.
#[derive(Clone, Debug)]
pub struct SenderConfig {
    /// Poll-based (HTTP) transport: every frame must carry an
    /// `http_wait` so the server keeps the response open.
    pub is_http: bool,
    /// CDN link: exempt from PFS gating and sends masked init metadata.
    pub is_cdn: bool,
    /// Require the temporary key to be bound before ordinary methods.
    pub pfs: bool,
    /// Schema layer for the init envelope.
    pub layer: i32,
    /// Maximum unacknowledged method IDs tracked per ordering chain.
    pub call_queue_limit: usize,
    /// Client metadata for `initConnection`.
    pub init: InitParams,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            is_http: false,
            is_cdn: false,
            pfs: false,
            layer: DEFAULT_LAYER,
            call_queue_limit: 32,
            init: InitParams::default(),
        }
    }
}
