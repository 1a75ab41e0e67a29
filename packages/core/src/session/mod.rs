//! Secure session
//!
//! Оркестратор одной сессии с одним собеседником. Принимает события
//! транспорта и конверты, возвращает исходящие действия ([`Outbound`]) и
//! публикует [`SessionEvent`] в канал для UI.
//!
//! Логически однопоточный: каждый вызов `Capabilities` дожидается результата
//! до следующего шага, два раунда одной сессии никогда не перемешиваются.
//! Для работы в отдельной задаче см. [`driver`].

pub mod driver;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::crypto::{
    Capabilities, Epoch, PeerIdentity, PublicKey, Received, SecureChannel, SessionEstablisher,
    VerificationState,
};
use crate::protocol::dispatcher::{self, Route};
use crate::protocol::envelope::{Content, Envelope, KeyExchange};
use crate::protocol::messages::Message;
use crate::protocol::validation;
use crate::state::{RoomId, RoomTracker};
use crate::utils::error::{Result, TandemError};

pub use driver::{spawn, SessionChannels, SessionHandle};

/// Уведомление после отбракованного Content
pub const REJECTION_NOTICE: &str = "Message had been deleted. Previous message seems to be modified, please establish a new session.";

/// Уведомление после неудачного key exchange
pub const KEY_EXCHANGE_REJECTED_NOTICE: &str =
    "Key exchange could not be verified, secure session is not established.";

/// Событие от транспорта (relay)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Собеседник разослал свой публичный ключ
    PeerKeyAnnounced(PublicKey),
    PeerDisconnected,
    /// Relay подтвердил вход в комнату
    RoomJoined(RoomId),
    /// В комнату зашёл кто-то новый
    NewConnection,
    /// Третий участник пытался войти
    IntrusionAttempt,
    RoomFull(RoomId),
    EnvelopeReceived(Envelope),
}

/// Что нужно отправить в транспорт
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Envelope(Envelope),
    AnnouncePublicKey(PublicKey),
    JoinRoom(RoomId),
}

/// Почему входящий конверт не дошёл до приложения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    Verification,
    Integrity,
    Decryption,
    UnverifiedSession,
    EpochMismatch,
    UnknownSender,
    Misaddressed,
    Malformed,
}

impl RejectReason {
    /// `None` для ошибок, которые не относятся к конкретному конверту
    pub fn from_error(err: &TandemError) -> Option<Self> {
        match err {
            TandemError::Verification(_) => Some(Self::Verification),
            TandemError::Integrity(_) => Some(Self::Integrity),
            TandemError::Decryption(_) | TandemError::Crypto(_) => Some(Self::Decryption),
            TandemError::UnverifiedSession => Some(Self::UnverifiedSession),
            TandemError::EpochMismatch { .. } => Some(Self::EpochMismatch),
            TandemError::UnknownSender(_) => Some(Self::UnknownSender),
            TandemError::Misaddressed(_) => Some(Self::Misaddressed),
            TandemError::Malformed(_)
            | TandemError::Serialization(_)
            | TandemError::InvalidInput(_) => Some(Self::Malformed),
            TandemError::Cancelled => None,
        }
    }

    /// Признак подделки содержимого
    pub fn is_tamper(&self) -> bool {
        matches!(self, Self::Verification | Self::Integrity | Self::Decryption)
    }
}

/// События сессии для UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum SessionEvent {
    SessionVerified { peer: PublicKey, epoch: Epoch },
    SessionReset,
    MessageAccepted(Message),
    MessageRejected(RejectReason),
    Notice(String),
}

/// Результат отправки: конверты для транспорта и локальное эхо
#[derive(Debug, Clone)]
pub struct SentContent {
    /// В порядке отправки (key exchange перед Content при rekey)
    pub envelopes: Vec<Envelope>,
    pub echo: Message,
}

/// Снимок состояния сессии
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub local: PublicKey,
    pub peer: Option<PublicKey>,
    pub state: VerificationState,
    pub installed_epoch: Option<Epoch>,
    pub can_send: bool,
    pub pending_content: usize,
    pub room: Option<RoomId>,
}

pub struct SecureSession<C: Capabilities> {
    caps: C,
    peer: Option<PeerIdentity>,
    establisher: SessionEstablisher,
    channel: SecureChannel,
    rooms: RoomTracker,
    rekey_every_message: bool,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<C: Capabilities> SecureSession<C> {
    pub fn new(caps: C) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_events(caps, tx), rx)
    }

    pub fn with_events(caps: C, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            caps,
            peer: None,
            establisher: SessionEstablisher::new(),
            channel: SecureChannel::new(),
            rooms: RoomTracker::new(),
            rekey_every_message: Config::global().rekey_every_message,
            events,
        }
    }

    /// Переопределить `Config::rekey_every_message` для этой сессии
    pub fn with_rekey_every_message(mut self, enabled: bool) -> Self {
        self.rekey_every_message = enabled;
        self
    }

    pub fn capabilities(&self) -> &C {
        &self.caps
    }

    pub fn local_public_key(&self) -> &PublicKey {
        self.caps.local_public_key()
    }

    pub fn peer(&self) -> Option<&PeerIdentity> {
        self.peer.as_ref()
    }

    /// Состояние входящего направления
    pub fn verification_state(&self) -> VerificationState {
        self.establisher.gate().state()
    }

    pub fn installed_epoch(&self) -> Option<Epoch> {
        self.establisher.gate().installed_epoch()
    }

    /// Есть ли исходящий раунд для текущего собеседника
    pub fn can_send(&self) -> bool {
        self.peer
            .as_ref()
            .and_then(|peer| self.establisher.outbound_for(peer.public_key()))
            .is_some()
    }

    pub fn rooms(&self) -> &RoomTracker {
        &self.rooms
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            local: self.local_public_key().clone(),
            peer: self.peer.as_ref().map(|peer| peer.public_key().clone()),
            state: self.verification_state(),
            installed_epoch: self.installed_epoch(),
            can_send: self.can_send(),
            pending_content: self.channel.pending_len(),
            room: self.rooms.current(),
        }
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!(target: "session", "Event receiver dropped");
        }
    }

    fn notice(&self, text: impl Into<String>) {
        self.emit(SessionEvent::Notice(text.into()));
    }

    fn reject(&self, err: TandemError) -> Result<()> {
        if let Some(reason) = RejectReason::from_error(&err) {
            tracing::info!(target: "session", reason = ?reason, error = %err, "Envelope rejected");
            self.emit(SessionEvent::MessageRejected(reason));
        }
        Err(err)
    }

    fn reject_content(&self, err: TandemError) -> Result<()> {
        if RejectReason::from_error(&err).map_or(false, |r| r.is_tamper()) {
            self.notice(REJECTION_NOTICE);
        }
        self.reject(err)
    }

    /// Начать key exchange с собеседником (закрепляет его, если никого нет)
    pub async fn initiate_key_exchange(&mut self, peer_key: PublicKey) -> Result<Envelope> {
        validation::validate_public_key(&peer_key, "peer")?;
        match &self.peer {
            Some(peer) if !peer.matches(&peer_key) => {
                return Err(TandemError::UnknownSender(peer_key.snippet()));
            }
            Some(_) => {}
            None => {
                tracing::info!(target: "session", peer = %peer_key.snippet(), "Peer pinned");
                self.peer = Some(PeerIdentity::new(peer_key.clone()));
            }
        }

        let peer = PeerIdentity::new(peer_key);
        self.establisher.initiate(&self.caps, &peer).await
    }

    /// Зашифровать и подготовить сообщение собеседнику
    pub async fn send_content(&mut self, text: &str) -> Result<SentContent> {
        validation::validate_plaintext(text)?;
        let peer = self.peer.clone().ok_or(TandemError::UnverifiedSession)?;

        let mut envelopes = Vec::with_capacity(2);
        if self.rekey_every_message {
            envelopes.push(self.establisher.initiate(&self.caps, &peer).await?);
        }

        let round = self
            .establisher
            .outbound_for(peer.public_key())
            .ok_or(TandemError::UnverifiedSession)?;
        envelopes.push(self.channel.seal(&self.caps, round, text).await?);

        let echo = Message::new(
            self.caps.local_public_key().clone(),
            peer.public_key().clone(),
            text.to_string(),
            round.epoch,
        );

        Ok(SentContent { envelopes, echo })
    }

    /// Входящий конверт: dispatcher решает, кому его отдать
    pub async fn on_envelope_received(&mut self, envelope: Envelope) -> Result<()> {
        let route =
            match dispatcher::dispatch(&envelope, self.caps.local_public_key(), self.peer.as_ref()) {
                Ok(route) => route,
                Err(err) => return self.reject(err),
            };
        match route {
            Route::KeyExchange(kx) => self.on_key_exchange_received(kx).await,
            Route::Content(content) => self.on_content_received(content).await,
        }
    }

    /// Входящий key exchange (code 1)
    async fn on_key_exchange_received(&mut self, kx: &KeyExchange) -> Result<()> {
        let (ticket, was_verified) = match self.establisher.begin_inbound(kx) {
            Ok(started) => started,
            Err(err) => return self.reject(err),
        };
        if was_verified {
            self.emit(SessionEvent::SessionReset);
        }

        match self.establisher.complete_inbound(&self.caps, kx, ticket).await {
            Ok(epoch) => {
                self.emit(SessionEvent::SessionVerified {
                    peer: kx.sender().clone(),
                    epoch,
                });
                self.replay_pending(epoch).await;
                Ok(())
            }
            Err(err) => {
                // Content этой эпохи уже никогда не расшифруется
                let (ready, stale) = self.channel.take_settled(kx.epoch());
                for content in ready.iter().chain(stale.iter()) {
                    let _ = self.reject(TandemError::EpochMismatch {
                        envelope: content.epoch(),
                        installed: None,
                    });
                }
                if err != TandemError::Cancelled {
                    self.notice(KEY_EXCHANGE_REJECTED_NOTICE);
                }
                self.reject(err)
            }
        }
    }

    async fn replay_pending(&mut self, epoch: Epoch) {
        let (ready, stale) = self.channel.take_settled(epoch);
        for content in stale {
            let _ = self.reject(TandemError::EpochMismatch {
                envelope: content.epoch(),
                installed: Some(epoch),
            });
        }
        for content in ready {
            tracing::debug!(target: "session", epoch, "Replaying parked content");
            match self
                .channel
                .open(&self.caps, self.establisher.gate(), &content)
                .await
            {
                Ok(message) => self.accept(message),
                Err(err) => {
                    let _ = self.reject_content(err);
                }
            }
        }
    }

    fn accept(&self, message: Message) {
        tracing::info!(
            target: "session",
            id = %message.id,
            epoch = message.epoch,
            "Message accepted"
        );
        self.emit(SessionEvent::MessageAccepted(message));
    }

    /// Входящий Content (code 2)
    async fn on_content_received(&mut self, content: &Content) -> Result<()> {
        match self
            .channel
            .receive(&self.caps, self.establisher.gate(), content)
            .await
        {
            Ok(Received::Accepted(message)) => {
                self.accept(message);
                Ok(())
            }
            Ok(Received::Parked) => Ok(()),
            Err(err) => self.reject_content(err),
        }
    }

    /// Сбросить сессию: материал обоих направлений и очередь.
    ///
    /// `forget_peer` снимает закреплённого собеседника (disconnect, смена комнаты).
    pub fn reset(&mut self, forget_peer: bool) {
        let had_session = self.establisher.reset();
        let dropped = self.channel.clear_pending();
        if forget_peer {
            self.peer = None;
        }
        tracing::info!(target: "session", had_session, dropped, forget_peer, "Session reset");
        if had_session {
            self.emit(SessionEvent::SessionReset);
        }
    }

    /// Запросить вход в комнату
    pub fn join_room(&mut self, room: RoomId) -> Outbound {
        Outbound::JoinRoom(self.rooms.request(room))
    }

    /// Обработать событие транспорта
    pub async fn handle_transport_event(&mut self, event: TransportEvent) -> Result<Vec<Outbound>> {
        match event {
            TransportEvent::PeerKeyAnnounced(key) => self.on_peer_key_announced(key).await,
            TransportEvent::PeerDisconnected => {
                self.reset(true);
                self.notice("Peer disconnected");
                Ok(Vec::new())
            }
            TransportEvent::RoomJoined(room) => {
                self.rooms.joined(room);
                self.reset(true);
                self.notice(format!("Joined room {}", room));
                Ok(vec![Outbound::AnnouncePublicKey(
                    self.local_public_key().clone(),
                )])
            }
            TransportEvent::NewConnection => Ok(vec![Outbound::AnnouncePublicKey(
                self.local_public_key().clone(),
            )]),
            TransportEvent::IntrusionAttempt => {
                tracing::warn!(target: "session", "Intrusion attempt reported by relay");
                self.notice("Someone tried to join this room");
                Ok(Vec::new())
            }
            TransportEvent::RoomFull(room) => {
                self.notice(format!("Room {} is full", room));
                Ok(vec![Outbound::JoinRoom(self.rooms.fallback(room))])
            }
            TransportEvent::EnvelopeReceived(envelope) => {
                if let Err(err) = self.on_envelope_received(envelope).await {
                    tracing::debug!(target: "session", error = %err, "Envelope not delivered");
                }
                Ok(Vec::new())
            }
        }
    }

    async fn on_peer_key_announced(&mut self, key: PublicKey) -> Result<Vec<Outbound>> {
        if &key == self.local_public_key() {
            return Ok(Vec::new());
        }
        if let Err(err) = validation::validate_public_key(&key, "announced") {
            self.notice("Received an invalid public key");
            return Err(err);
        }

        match &self.peer {
            Some(peer) if !peer.matches(&key) => {
                tracing::warn!(
                    target: "session",
                    pinned = %peer.public_key().snippet(),
                    announced = %key.snippet(),
                    "Second peer key ignored"
                );
                self.notice(format!(
                    "Ignored public key {} from a third participant",
                    key.snippet()
                ));
                return Ok(Vec::new());
            }
            Some(_) => {}
            None => self.notice(format!("Public key received: {}", key.snippet())),
        }

        let envelope = self.initiate_key_exchange(key).await?;
        Ok(vec![Outbound::Envelope(envelope)])
    }
}
