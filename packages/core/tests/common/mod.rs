//! Shared helpers for the session integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tandem_core::crypto::{Capabilities, DefaultCryptoWorker, PublicKey};
use tandem_core::error::CryptoError;
use tandem_core::protocol::wire;
use tandem_core::session::{Outbound, SecureSession, SessionEvent, TransportEvent};
use tandem_core::Envelope;
use tokio::sync::mpsc;

/// Faults injected into a [`FaultyCaps`]
#[derive(Default)]
pub struct Faults {
    /// Script for upcoming `verify` calls: `true` = force a mismatch
    pub verify_script: Mutex<VecDeque<bool>>,
    /// Flip a bit in every HMAC this side computes
    pub corrupt_hmac: AtomicBool,
    /// Flip a bit in every signature this side produces
    pub corrupt_sign: AtomicBool,
    /// Delay before each `pki_decrypt`
    pub decrypt_delay_ms: AtomicU64,
}

impl Faults {
    pub fn script_verify(&self, script: &[bool]) {
        let mut queue = self.verify_script.lock().unwrap();
        queue.clear();
        queue.extend(script.iter().copied());
    }
}

/// Capabilities wrapper that can misbehave on demand
pub struct FaultyCaps {
    inner: DefaultCryptoWorker,
    pub faults: Arc<Faults>,
}

impl FaultyCaps {
    pub fn new() -> Self {
        Self {
            inner: DefaultCryptoWorker::new().unwrap(),
            faults: Arc::new(Faults::default()),
        }
    }
}

fn flip(mut bytes: Vec<u8>) -> Vec<u8> {
    if let Some(first) = bytes.first_mut() {
        *first ^= 0x01;
    }
    bytes
}

#[async_trait]
impl Capabilities for FaultyCaps {
    fn local_public_key(&self) -> &PublicKey {
        self.inner.local_public_key()
    }

    async fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let sig = self.inner.sign(data).await?;
        if self.faults.corrupt_sign.load(Ordering::SeqCst) {
            return Ok(flip(sig));
        }
        Ok(sig)
    }

    async fn verify(
        &self,
        data: &[u8],
        signer: &PublicKey,
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        let forced = self.faults.verify_script.lock().unwrap().pop_front();
        if forced == Some(true) {
            return Ok(false);
        }
        self.inner.verify(data, signer, signature).await
    }

    async fn pki_encrypt(&self, data: &[u8], recipient: &PublicKey) -> Result<Vec<u8>, CryptoError> {
        self.inner.pki_encrypt(data, recipient).await
    }

    async fn pki_decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let delay = self.faults.decrypt_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.pki_decrypt(ciphertext).await
    }

    async fn symmetric_encrypt(
        &self,
        data: &[u8],
        key: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.inner.symmetric_encrypt(data, key, iv).await
    }

    async fn symmetric_decrypt(
        &self,
        ciphertext: &[u8],
        key: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.inner.symmetric_decrypt(ciphertext, key, iv).await
    }

    async fn hmac(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mac = self.inner.hmac(key, data).await?;
        if self.faults.corrupt_hmac.load(Ordering::SeqCst) {
            return Ok(flip(mac));
        }
        Ok(mac)
    }

    async fn derive_symmetric_key(&self) -> Result<Vec<u8>, CryptoError> {
        self.inner.derive_symmetric_key().await
    }

    async fn generate_iv(&self) -> Result<Vec<u8>, CryptoError> {
        self.inner.generate_iv().await
    }
}

/// One side of a conversation
pub struct Party {
    pub session: SecureSession<FaultyCaps>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub faults: Arc<Faults>,
}

impl Party {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Fresh key exchange before every message
    pub fn rekeying() -> Self {
        Self::build(true)
    }

    fn build(rekey: bool) -> Self {
        tandem_core::utils::logging::init();
        let caps = FaultyCaps::new();
        let faults = Arc::clone(&caps.faults);
        let (session, events) = SecureSession::new(caps);
        let session = session.with_rekey_every_message(rekey);
        Self {
            session,
            events,
            faults,
        }
    }

    pub fn key(&self) -> PublicKey {
        self.session.local_public_key().clone()
    }

    /// Everything emitted since the last call
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Peer announces its key; returns our key-exchange envelope
    pub async fn learn(&mut self, peer: PublicKey) -> Envelope {
        let outs = self
            .session
            .handle_transport_event(TransportEvent::PeerKeyAnnounced(peer))
            .await
            .unwrap();
        match outs.into_iter().next() {
            Some(Outbound::Envelope(envelope)) => envelope,
            other => panic!("expected key exchange, got {:?}", other),
        }
    }

    /// Deliver an envelope through the wire codec
    pub async fn deliver(&mut self, envelope: &Envelope) -> tandem_core::Result<()> {
        let bytes = wire::pack_envelope(envelope).unwrap();
        let envelope = wire::unpack_envelope(&bytes).unwrap();
        self.session.on_envelope_received(envelope).await
    }

    /// Encrypt `text` and return the content envelope
    pub async fn seal(&mut self, text: &str) -> Envelope {
        let sent = self.session.send_content(text).await.unwrap();
        sent.envelopes.into_iter().last().unwrap()
    }
}

/// Both sides learn each other's key and complete both key exchanges
pub async fn connected() -> (Party, Party) {
    let mut alice = Party::new();
    let mut bob = Party::new();

    let kx_from_alice = alice.learn(bob.key()).await;
    let kx_from_bob = bob.learn(alice.key()).await;
    bob.deliver(&kx_from_alice).await.unwrap();
    alice.deliver(&kx_from_bob).await.unwrap();

    alice.drain();
    bob.drain();
    (alice, bob)
}

pub fn accepted(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::MessageAccepted(message) => Some(message.text.clone()),
            _ => None,
        })
        .collect()
}

pub fn rejected(events: &[SessionEvent]) -> Vec<tandem_core::RejectReason> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::MessageRejected(reason) => Some(*reason),
            _ => None,
        })
        .collect()
}
