//! SessionEstablisher
//!
//! Key-exchange sub-protocol. Отправка: свежие `(K, IV, Hk)`, три независимые
//! подписи, шесть отдельных `pki_encrypt` ключом собеседника. Приём: шесть
//! `pki_decrypt`, три проверки подписей, установка через
//! [`VerificationGate`] только при 3/3.
//!
//! Каждая подпись покрывает `epoch || value` ([`signed_payload`]), так что
//! эпоху нельзя переставить, не сломав 3/3.
//!
//! Каждое направление имеет свой материал: входящий охраняет гейт, исходящий
//! ([`OutboundRound`]) живёт здесь же и используется только для отправки.

use crate::crypto::capability::Capabilities;
use crate::crypto::gate::{RoundTicket, RoundVerdict, VerificationGate};
use crate::crypto::keys::{PeerIdentity, PublicKey};
use crate::crypto::material::{signed_payload, Epoch, OutboundRound, SessionKeyMaterial};
use crate::protocol::envelope::{Envelope, KeyExchange, SealedKeySignatures, SealedKeys};
use crate::utils::error::{Result, TandemError};

#[derive(Debug)]
pub struct SessionEstablisher {
    gate: VerificationGate,
    outbound: Option<OutboundRound>,
    /// Следующая эпоха исходящего раунда, монотонно растёт весь процесс
    next_epoch: Epoch,
}

impl Default for SessionEstablisher {
    fn default() -> Self {
        Self {
            gate: VerificationGate::new(),
            outbound: None,
            next_epoch: 1,
        }
    }
}

impl SessionEstablisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Гейт входящего материала (только чтение)
    pub fn gate(&self) -> &VerificationGate {
        &self.gate
    }

    /// Исходящий раунд, если он был для `peer`
    pub fn outbound_for(&self, peer: &PublicKey) -> Option<&OutboundRound> {
        self.outbound.as_ref().filter(|round| &round.peer == peer)
    }

    /// Начать исходящий раунд с собеседником
    pub async fn initiate<C>(&mut self, caps: &C, peer: &PeerIdentity) -> Result<Envelope>
    where
        C: Capabilities + ?Sized,
    {
        let recipient = peer.public_key();
        let epoch = self.next_epoch;

        let symmetric_key = caps.derive_symmetric_key().await?;
        let iv = caps.generate_iv().await?;
        let hash_key = caps.derive_symmetric_key().await?;

        let sig_sym_key = caps.sign(&signed_payload(epoch, &symmetric_key)).await?;
        let sig_iv = caps.sign(&signed_payload(epoch, &iv)).await?;
        let sig_hash_key = caps.sign(&signed_payload(epoch, &hash_key)).await?;

        // Шесть независимых шифрований: порча одного поля не трогает остальные
        let key = SealedKeys {
            enc_sym_key: caps.pki_encrypt(&symmetric_key, recipient).await?,
            enc_iv: caps.pki_encrypt(&iv, recipient).await?,
            enc_hash_key: caps.pki_encrypt(&hash_key, recipient).await?,
        };
        let signature = SealedKeySignatures {
            enc_sig_sym_key: caps.pki_encrypt(&sig_sym_key, recipient).await?,
            enc_sig_iv: caps.pki_encrypt(&sig_iv, recipient).await?,
            enc_sig_hash_key: caps.pki_encrypt(&sig_hash_key, recipient).await?,
        };

        let material = SessionKeyMaterial::new(symmetric_key, iv, hash_key)?;
        self.next_epoch += 1;
        self.outbound = Some(OutboundRound {
            epoch,
            peer: recipient.clone(),
            material,
        });

        tracing::info!(
            target: "crypto::establisher",
            peer = %recipient.snippet(),
            epoch = epoch,
            "Key exchange initiated"
        );

        Ok(Envelope::key_exchange(
            caps.local_public_key().clone(),
            recipient.clone(),
            epoch,
            key,
            signature,
        ))
    }

    /// Начать входящий раунд: материал предыдущего стирается сразу.
    ///
    /// Возвращает билет раунда и `true`, если до этого сессия была Verified.
    /// Раунд с эпохой не новее последней проверенной отклоняется, состояние
    /// не меняется.
    pub fn begin_inbound(&mut self, kx: &KeyExchange) -> Result<(RoundTicket, bool)> {
        if let Some(last) = self.gate.last_verified_epoch() {
            if kx.epoch() <= last {
                return Err(TandemError::EpochMismatch {
                    envelope: kx.epoch(),
                    installed: self.gate.installed_epoch(),
                });
            }
        }
        Ok(self.gate.begin_round(kx.epoch()))
    }

    /// Довести входящий раунд до решения гейта.
    ///
    /// Вызывается после [`Self::begin_inbound`]. Все три результата проверки
    /// живут только внутри этого вызова.
    pub async fn complete_inbound<C>(
        &mut self,
        caps: &C,
        kx: &KeyExchange,
        ticket: RoundTicket,
    ) -> Result<Epoch>
    where
        C: Capabilities + ?Sized,
    {
        if ticket.epoch() != kx.epoch() {
            return Err(TandemError::Cancelled);
        }

        let key = kx.key();
        let sig = kx.signature();

        let symmetric_key = open(caps, &key.enc_sym_key, "encSymKey").await?;
        let iv = open(caps, &key.enc_iv, "encIV").await?;
        let hash_key = open(caps, &key.enc_hash_key, "encHashKey").await?;
        let sig_sym_key = open(caps, &sig.enc_sig_sym_key, "encSigSymKey").await?;
        let sig_iv = open(caps, &sig.enc_sig_iv, "encSigIV").await?;
        let sig_hash_key = open(caps, &sig.enc_sig_hash_key, "encSigHashKey").await?;

        let sender = kx.sender();
        let epoch = kx.epoch();
        let verdict = RoundVerdict::new(
            caps.verify(&signed_payload(epoch, &symmetric_key), sender, &sig_sym_key)
                .await?,
            caps.verify(&signed_payload(epoch, &iv), sender, &sig_iv).await?,
            caps.verify(&signed_payload(epoch, &hash_key), sender, &sig_hash_key)
                .await?,
        );

        if !verdict.all_ok() {
            tracing::warn!(
                target: "crypto::establisher",
                peer = %sender.snippet(),
                epoch = kx.epoch(),
                failures = verdict.failures(),
                "Key exchange rejected"
            );
        }

        let candidate = SessionKeyMaterial::new(symmetric_key, iv, hash_key)
            .map_err(|e| TandemError::Malformed(e.to_string()))?;
        self.gate.complete_round(ticket, verdict, candidate)?;

        tracing::info!(
            target: "crypto::establisher",
            peer = %sender.snippet(),
            epoch = kx.epoch(),
            "Session verified"
        );

        Ok(kx.epoch())
    }

    /// Полный входящий раунд: [`Self::begin_inbound`] + [`Self::complete_inbound`]
    pub async fn receive<C>(&mut self, caps: &C, kx: &KeyExchange) -> Result<Epoch>
    where
        C: Capabilities + ?Sized,
    {
        let (ticket, _) = self.begin_inbound(kx)?;
        self.complete_inbound(caps, kx, ticket).await
    }

    /// Сбросить оба направления
    pub fn reset(&mut self) -> bool {
        let had_outbound = self.outbound.take().is_some();
        let was_verified = self.gate.reset();
        was_verified || had_outbound
    }
}

async fn open<C>(caps: &C, blob: &[u8], field: &str) -> Result<Vec<u8>>
where
    C: Capabilities + ?Sized,
{
    caps.pki_decrypt(blob)
        .await
        .map_err(|e| TandemError::Decryption(format!("{}: {}", field, e)))
}
