//! The cooperative write scheduler.
//!
//! One scheduler instance runs per connection attempt. It parks while
//! the queue is empty (or everything eligible is gated), drains the
//! queue through batching passes otherwise, and exits on cancellation,
//! staleness or a transport failure — in the failure case after
//! requesting an asynchronous reconnect. A fresh instance resumes
//! draining the same untouched queue afterwards.

use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use pigeon_mtproto::encrypted::{Cipher, EncryptedFramer};
use pigeon_mtproto::message::Message;
use tokio_util::sync::CancellationToken;

use crate::batch;
use crate::transport::Transport;
use crate::{Inner, Shared};

/// Why a scheduler instance stopped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoopExit {
    /// The cancellation token fired while parked.
    Cancelled,
    /// The transport was already marked stale; no write was attempted.
    Stale,
    /// A write failed; an asynchronous reconnect has been requested
    /// and the queue was left untouched.
    TransportFailed,
}

/// Clears the connection's writing flag on every exit path.
struct WritingGuard {
    shared: Arc<Shared>,
}

impl WritingGuard {
    fn engage(shared: Arc<Shared>) -> Self {
        shared.writing.store(true, Ordering::SeqCst);
        Self { shared }
    }
}

impl Drop for WritingGuard {
    fn drop(&mut self) {
        self.shared.writing.store(false, Ordering::SeqCst);
    }
}

pub(crate) struct WriteLoop<T, C> {
    pub(crate) shared: Arc<Shared>,
    pub(crate) transport: T,
    pub(crate) framer: EncryptedFramer<C>,
    pub(crate) cancel: CancellationToken,
}

impl<T: Transport, C: Cipher> WriteLoop<T, C> {
    pub(crate) async fn run(mut self) -> LoopExit {
        let mut please_wait = false;
        loop {
            // Idle: park until woken, re-checking staleness around the
            // wait so a reconnecting connection never writes.
            loop {
                if self.transport.should_reconnect() {
                    tracing::debug!("not writing: connection marked for reconnect");
                    return LoopExit::Stale;
                }
                let idle = self.shared.inner.lock().await.queue.is_empty();
                if !idle && !please_wait {
                    break;
                }
                please_wait = false;
                tracing::trace!("write loop waiting");
                tokio::select! {
                    _ = self.shared.wake.notified() => {}
                    _ = self.cancel.cancelled() => {
                        tracing::debug!("write loop cancelled");
                        return LoopExit::Cancelled;
                    }
                }
            }

            // Draining. Reentrant wakes during a pass coalesce into the
            // stored Notify permit; the flag is released on every exit
            // path by the guard.
            let _guard = WritingGuard::engage(Arc::clone(&self.shared));
            let encrypted = self.shared.inner.lock().await.crypto.is_some();
            let result = if encrypted {
                self.encrypted_pass().await
            } else {
                self.plain_pass().await
            };
            match result {
                Ok(wait) => please_wait = wait,
                Err(err) => {
                    if self.transport.should_reconnect() {
                        return LoopExit::Stale;
                    }
                    tracing::warn!("transport write failed ({err}), scheduling reconnect");
                    self.transport.request_reconnect();
                    return LoopExit::TransportFailed;
                }
            }
        }
    }

    /// Run batching passes until the queue drains or gating postpones
    /// the remainder. Returns `Ok(true)` when the loop should park
    /// until the next wake.
    async fn encrypted_pass(&mut self) -> io::Result<bool> {
        loop {
            let (outcome, wire) = {
                let mut guard = self.shared.inner.lock().await;
                let inner: &mut Inner = &mut guard;
                let Some(crypto) = inner.crypto.clone() else {
                    return Ok(false);
                };
                let outcome = batch::resolve_batch(
                    &mut inner.queue,
                    &mut inner.msg_ids,
                    &mut inner.seq,
                    &crypto,
                    &self.shared.config,
                );
                let wire = outcome.frame.as_ref().map(|frame| {
                    self.framer.encrypt_frame(
                        &crypto.key.auth_key,
                        crypto.salt,
                        crypto.session_id,
                        frame.msg_id,
                        frame.seq_no,
                        &frame.body,
                    )
                });
                (outcome, wire)
            };

            // Nothing eligible: park until something changes.
            let Some(wire) = wire else { return Ok(true) };

            self.transport.write(&wire).await?;
            tracing::debug!("sent encrypted payload ({} bytes)", wire.len());

            let drained = {
                let mut guard = self.shared.inner.lock().await;
                let inner: &mut Inner = &mut guard;
                batch::commit(&mut inner.queue, &mut inner.sent, &outcome);
                inner.queue.is_empty()
            };
            if drained || outcome.skipped {
                return Ok(outcome.skipped);
            }
        }
    }

    /// Send plain (pre-handshake) messages one frame each.
    async fn plain_pass(&mut self) -> io::Result<bool> {
        loop {
            let next = {
                let mut guard = self.shared.inner.lock().await;
                let inner: &mut Inner = &mut guard;
                if inner.crypto.is_some() {
                    return Ok(false);
                }
                let mut next = None;
                for key in inner.queue.keys_snapshot() {
                    let Some(message) = inner.queue.get(key) else { continue };
                    if !message.is_plain() {
                        continue;
                    }
                    if message.is_replied() {
                        inner.queue.remove(key);
                        continue;
                    }
                    let assigned = message.msg_id();
                    let body = message.payload().serialize_body();
                    let msg_id = assigned.unwrap_or_else(|| inner.msg_ids.next());
                    if assigned.is_none() {
                        if let Some(message) = inner.queue.get_mut(key) {
                            message.assign(msg_id, 0);
                        }
                    }
                    next = Some((key, msg_id, body));
                    break;
                }
                next
            };

            let Some((key, msg_id, body)) = next else {
                // Anything left is waiting for the encrypted path.
                let pending = !self.shared.inner.lock().await.queue.is_empty();
                return Ok(pending);
            };

            let wire = Message { id: msg_id, seq_no: 0, body }.to_plaintext_bytes();
            self.transport.write(&wire).await?;
            tracing::debug!("sent plaintext message {msg_id}");

            let mut guard = self.shared.inner.lock().await;
            let inner: &mut Inner = &mut guard;
            if let Some(mut message) = inner.queue.remove(key) {
                message.sent();
                inner.sent.insert(msg_id, message);
            }
        }
    }
}
