use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use pigeon_mtproto::auth_key::AuthKey;
use pigeon_mtproto::encrypted::{Cipher, EncryptedFramer};
use pigeon_mtproto::session::{SessionCrypto, SessionKey};
use pigeon_mtproto::tl;
use pigeon_sender::message::{Method, OutgoingMessage};
use pigeon_sender::{LoopExit, Sender, SenderConfig, Transport};
use tokio_util::sync::CancellationToken;

/// Keystream-XOR stand-in for AES-IGE; involutive so the test can
/// decrypt whatever the loop wrote.
#[derive(Clone)]
struct XorCipher;

impl Cipher for XorCipher {
    fn derive_key_iv(&self, msg_key: &[u8; 16], auth_key: &AuthKey) -> ([u8; 32], [u8; 32]) {
        let raw = auth_key.to_bytes();
        let mut key = [0u8; 32];
        let mut iv = [0u8; 32];
        for i in 0..32 {
            key[i] = msg_key[i % 16] ^ raw[i];
            iv[i] = raw[32 + i];
        }
        (key, iv)
    }

    fn encrypt(&self, buf: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte ^= key[i % 32] ^ iv[(i / 32) % 32];
        }
    }

    fn decrypt(&self, buf: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
        self.encrypt(buf, key, iv);
    }
}

#[derive(Default)]
struct MockState {
    frames:     Mutex<Vec<Vec<u8>>>,
    fail:       AtomicBool,
    stale:      AtomicBool,
    reconnects: AtomicUsize,
}

#[derive(Clone)]
struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    fn new() -> (Self, Arc<MockState>) {
        let state = Arc::new(MockState::default());
        (Self { state: Arc::clone(&state) }, state)
    }
}

impl Transport for MockTransport {
    async fn write(&mut self, frame: &[u8]) -> io::Result<()> {
        if self.state.fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock failure"));
        }
        self.state.frames.lock().unwrap().push(frame.to_vec());
        Ok(())
    }

    fn should_reconnect(&self) -> bool {
        self.state.stale.load(Ordering::SeqCst)
    }

    fn request_reconnect(&mut self) {
        self.state.reconnects.fetch_add(1, Ordering::SeqCst);
    }
}

fn crypto() -> SessionCrypto {
    let key = SessionKey::permanent(AuthKey::from_bytes([3u8; 256]));
    SessionCrypto::new(key, 0x1357_9BDF_0246_8ACE)
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..500 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn drains_queue_and_tracks_sent_messages() {
    let crypto = crypto();
    let (sender, enqueuer) = Sender::new(Some(crypto.clone()), SenderConfig::default());
    let (transport, state) = MockTransport::new();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { sender.run(transport, XorCipher, cancel).await }
    });

    enqueuer.enqueue(OutgoingMessage::call(Method::Plain, vec![0xEE; 8])).await;
    wait_until(|| !state.frames.lock().unwrap().is_empty()).await;

    cancel.cancel();
    assert_eq!(handle.await.unwrap(), LoopExit::Cancelled);

    {
        let frames = state.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        let framer = EncryptedFramer::new(XorCipher);
        let envelope = framer.decrypt_frame(&crypto.key.auth_key, &frames[0]).expect("decrypt");
        assert_eq!(envelope.salt, crypto.salt);
        assert_eq!(envelope.session_id, crypto.session_id);
        assert_eq!(
            u32::from_le_bytes(envelope.body[..4].try_into().unwrap()),
            tl::MSG_CONTAINER
        );
    }

    assert_eq!(enqueuer.pending_len().await, 0);
    assert_eq!(enqueuer.sent_len().await, 2, "the call and its container are both tracked");
}

#[tokio::test]
async fn write_failure_requests_reconnect_and_preserves_queue() {
    let (sender, enqueuer) = Sender::new(Some(crypto()), SenderConfig::default());
    let (transport, state) = MockTransport::new();
    state.fail.store(true, Ordering::SeqCst);

    enqueuer.enqueue(OutgoingMessage::call(Method::Plain, vec![0x77; 8])).await;
    let exit = sender.run(transport.clone(), XorCipher, CancellationToken::new()).await;

    assert_eq!(exit, LoopExit::TransportFailed);
    assert_eq!(state.reconnects.load(Ordering::SeqCst), 1);
    assert!(state.frames.lock().unwrap().is_empty());
    // The call stays queued; the container entry minted for the failed
    // pass stays too and is regenerated on the next one.
    assert_eq!(enqueuer.pending_len().await, 2);
    assert_eq!(enqueuer.sent_len().await, 0);

    // A fresh instance over a healthy transport drains the same queue.
    state.fail.store(false, Ordering::SeqCst);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { sender.run(transport, XorCipher, cancel).await }
    });
    wait_until(|| !state.frames.lock().unwrap().is_empty()).await;
    cancel.cancel();
    assert_eq!(handle.await.unwrap(), LoopExit::Cancelled);
    assert_eq!(enqueuer.pending_len().await, 0);
}

#[tokio::test]
async fn cancellation_while_idle() {
    let (sender, _enqueuer) = Sender::new(Some(crypto()), SenderConfig::default());
    let sender = Arc::new(sender);
    let (transport, _state) = MockTransport::new();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let sender = Arc::clone(&sender);
        let cancel = cancel.clone();
        async move { sender.run(transport, XorCipher, cancel).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!sender.is_writing(), "parked loop must not hold the writing flag");
    cancel.cancel();
    assert_eq!(handle.await.unwrap(), LoopExit::Cancelled);
}

#[tokio::test]
async fn stale_transport_exits_without_writing() {
    let (sender, enqueuer) = Sender::new(Some(crypto()), SenderConfig::default());
    let (transport, state) = MockTransport::new();
    state.stale.store(true, Ordering::SeqCst);

    enqueuer.enqueue(OutgoingMessage::call(Method::Plain, vec![0x10; 4])).await;
    let exit = sender.run(transport, XorCipher, CancellationToken::new()).await;

    assert_eq!(exit, LoopExit::Stale);
    assert!(state.frames.lock().unwrap().is_empty());
    assert!(!sender.is_writing());
    assert_eq!(enqueuer.pending_len().await, 1);
}

#[tokio::test]
async fn plain_messages_use_the_unencrypted_framing() {
    let (sender, enqueuer) = Sender::new(None, SenderConfig::default());
    let (transport, state) = MockTransport::new();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { sender.run(transport, XorCipher, cancel).await }
    });

    let body = vec![0xAB; 12];
    enqueuer.enqueue(OutgoingMessage::plain_call(body.clone())).await;
    wait_until(|| !state.frames.lock().unwrap().is_empty()).await;
    cancel.cancel();
    assert_eq!(handle.await.unwrap(), LoopExit::Cancelled);

    {
        let frames = state.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        let wire = &frames[0];
        assert_eq!(&wire[..8], &[0u8; 8], "plain frames carry a zero auth_key_id");
        let len = u32::from_le_bytes(wire[16..20].try_into().unwrap()) as usize;
        assert_eq!(len, body.len());
        assert_eq!(&wire[20..20 + len], &body[..]);
    }

    assert_eq!(enqueuer.sent_len().await, 1);
}

#[tokio::test]
async fn encrypted_session_postpones_plain_messages() {
    let (sender, enqueuer) = Sender::new(Some(crypto()), SenderConfig::default());
    let (transport, state) = MockTransport::new();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { sender.run(transport, XorCipher, cancel).await }
    });

    enqueuer.enqueue(OutgoingMessage::plain_call(vec![1, 2, 3, 4])).await;
    enqueuer.enqueue(OutgoingMessage::call(Method::Plain, vec![5, 6, 7, 8])).await;
    wait_until(|| !state.frames.lock().unwrap().is_empty()).await;
    cancel.cancel();
    assert_eq!(handle.await.unwrap(), LoopExit::Cancelled);

    assert_eq!(state.frames.lock().unwrap().len(), 1, "only the encrypted frame went out");
    assert_eq!(enqueuer.pending_len().await, 1, "the plain message waits for a handshake pass");
}
