//! SecureChannel
//!
//! Content sub-protocol: encrypt-then-MAC поверх материала, установленного
//! key exchange.
//!
//! ```text
//! send:    C = Enc(K, IV, M)   H = HMAC(Hk, C)   sign(e‖C), sign(e‖H)   4 × pki_encrypt
//! receive: 4 × pki_decrypt  →  verify(e‖C), verify(e‖H)  →  HMAC(Hk, C) == H  →  Dec(K, IV, C)
//! ```
//!
//! Plaintext появляется только после того, как обе подписи и HMAC сошлись.
//! Content из будущей эпохи (обогнал свой key exchange) паркуется в
//! ограниченной очереди и разбирается после установки материала.

use std::collections::VecDeque;

use crate::config::Config;
use crate::crypto::capability::Capabilities;
use crate::crypto::gate::VerificationGate;
use crate::crypto::material::{signed_payload, Epoch, OutboundRound};
use crate::protocol::envelope::{Content, Envelope, SealedText, SealedTextSignatures};
use crate::protocol::messages::Message;
use crate::utils::error::{Result, TandemError};

/// Результат приёма Content
#[derive(Debug)]
pub enum Received {
    Accepted(Message),
    /// Ждёт key exchange своей эпохи
    Parked,
}

#[derive(Debug, Default)]
pub struct SecureChannel {
    pending: VecDeque<Content>,
}

impl SecureChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Зашифровать текст материалом нашего последнего исходящего раунда
    pub async fn seal<C>(&self, caps: &C, round: &OutboundRound, text: &str) -> Result<Envelope>
    where
        C: Capabilities + ?Sized,
    {
        let material = &round.material;
        let recipient = &round.peer;

        let ciphertext = caps
            .symmetric_encrypt(text.as_bytes(), material.symmetric_key(), material.iv())
            .await?;
        let hash = caps.hmac(material.hash_key(), &ciphertext).await?;

        let sig_ciphertext = caps.sign(&signed_payload(round.epoch, &ciphertext)).await?;
        let sig_hash = caps.sign(&signed_payload(round.epoch, &hash)).await?;

        let sealed_text = SealedText {
            enc_ciphertext: caps.pki_encrypt(&ciphertext, recipient).await?,
            enc_hash: caps.pki_encrypt(&hash, recipient).await?,
        };
        let signature = SealedTextSignatures {
            enc_sig_ciphertext: caps.pki_encrypt(&sig_ciphertext, recipient).await?,
            enc_sig_hash: caps.pki_encrypt(&sig_hash, recipient).await?,
        };

        tracing::debug!(
            target: "crypto::channel",
            peer = %recipient.snippet(),
            epoch = round.epoch,
            ciphertext_len = ciphertext.len(),
            "Content sealed"
        );

        Ok(Envelope::content(
            caps.local_public_key().clone(),
            recipient.clone(),
            round.epoch,
            sealed_text,
            signature,
        ))
    }

    /// Принять Content.
    ///
    /// Эпоха сравнивается с установленной: совпадает → разбор, новее →
    /// очередь, старее → `EpochMismatch`. Без сессии Content паркуется, только
    /// если его раунд ещё не начинался; иначе `UnverifiedSession`.
    pub async fn receive<C>(
        &mut self,
        caps: &C,
        gate: &VerificationGate,
        content: &Content,
    ) -> Result<Received>
    where
        C: Capabilities + ?Sized,
    {
        let epoch = content.epoch();
        match gate.installed_epoch() {
            Some(installed) if epoch == installed => {
                self.open(caps, gate, content).await.map(Received::Accepted)
            }
            Some(installed) if epoch < installed => Err(TandemError::EpochMismatch {
                envelope: epoch,
                installed: Some(installed),
            }),
            Some(_) => self.park(content.clone()).map(|_| Received::Parked),
            None => match gate.last_round_epoch() {
                Some(last) if epoch <= last => Err(TandemError::UnverifiedSession),
                _ => self.park(content.clone()).map(|_| Received::Parked),
            },
        }
    }

    /// Проверить и расшифровать Content установленным материалом
    pub async fn open<C>(
        &self,
        caps: &C,
        gate: &VerificationGate,
        content: &Content,
    ) -> Result<Message>
    where
        C: Capabilities + ?Sized,
    {
        let (installed, material) = match (gate.installed_epoch(), gate.material()) {
            (Some(epoch), Some(material)) => (epoch, material),
            _ => return Err(TandemError::UnverifiedSession),
        };
        if content.epoch() != installed {
            return Err(TandemError::EpochMismatch {
                envelope: content.epoch(),
                installed: Some(installed),
            });
        }

        let text = content.text();
        let sig = content.signature();

        let ciphertext = decrypt_field(caps, &text.enc_ciphertext, "encCiphertext").await?;
        let hash = decrypt_field(caps, &text.enc_hash, "encHash").await?;
        let sig_ciphertext = decrypt_field(caps, &sig.enc_sig_ciphertext, "encSigCiphertext").await?;
        let sig_hash = decrypt_field(caps, &sig.enc_sig_hash, "encSigHash").await?;

        let sender = content.sender();
        let ciphertext_ok = caps
            .verify(&signed_payload(installed, &ciphertext), sender, &sig_ciphertext)
            .await?;
        let hash_ok = caps
            .verify(&signed_payload(installed, &hash), sender, &sig_hash)
            .await?;
        if !ciphertext_ok || !hash_ok {
            tracing::warn!(
                target: "crypto::channel",
                peer = %sender.snippet(),
                ciphertext_ok,
                hash_ok,
                "Content signature rejected"
            );
            return Err(TandemError::Verification(
                "content signature does not match sender".to_string(),
            ));
        }

        // Encrypt-then-MAC: HMAC проверяется до расшифровки
        let expected = caps.hmac(material.hash_key(), &ciphertext).await?;
        if !constant_time_eq(&expected, &hash) {
            tracing::warn!(
                target: "crypto::channel",
                peer = %sender.snippet(),
                "Content HMAC mismatch"
            );
            return Err(TandemError::Integrity("HMAC mismatch".to_string()));
        }

        let plaintext = caps
            .symmetric_decrypt(&ciphertext, material.symmetric_key(), material.iv())
            .await
            .map_err(|e| TandemError::Decryption(e.to_string()))?;
        let text = String::from_utf8(plaintext)
            .map_err(|_| TandemError::Malformed("plaintext is not valid UTF-8".to_string()))?;

        Ok(Message::new(
            sender.clone(),
            content.recipient().clone(),
            text,
            installed,
        ))
    }

    fn park(&mut self, content: Content) -> Result<()> {
        let limit = Config::global().max_pending_content;
        if limit == 0 {
            return Err(TandemError::EpochMismatch {
                envelope: content.epoch(),
                installed: None,
            });
        }
        let mut result = Ok(());
        if self.pending.len() >= limit {
            if let Some(oldest) = self.pending.pop_front() {
                tracing::warn!(
                    target: "crypto::channel",
                    epoch = oldest.epoch(),
                    "Pending content queue full, dropping oldest"
                );
                result = Err(TandemError::EpochMismatch {
                    envelope: oldest.epoch(),
                    installed: None,
                });
            }
        }
        tracing::debug!(
            target: "crypto::channel",
            epoch = content.epoch(),
            pending = self.pending.len() + 1,
            "Content parked until its key exchange"
        );
        self.pending.push_back(content);
        result
    }

    /// Забрать из очереди всё, что относится к `epoch` или старее.
    ///
    /// Первый вектор: Content ровно этой эпохи в порядке прихода. Второй:
    /// устаревшие, которые уже никогда не расшифруются.
    pub fn take_settled(&mut self, epoch: Epoch) -> (Vec<Content>, Vec<Content>) {
        let mut ready = Vec::new();
        let mut stale = Vec::new();
        let mut waiting = VecDeque::with_capacity(self.pending.len());
        for content in self.pending.drain(..) {
            if content.epoch() == epoch {
                ready.push(content);
            } else if content.epoch() < epoch {
                stale.push(content);
            } else {
                waiting.push_back(content);
            }
        }
        self.pending = waiting;
        (ready, stale)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Сбросить очередь, вернуть число выброшенных
    pub fn clear_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}

async fn decrypt_field<C>(caps: &C, blob: &[u8], field: &str) -> Result<Vec<u8>>
where
    C: Capabilities + ?Sized,
{
    caps.pki_decrypt(blob)
        .await
        .map_err(|e| TandemError::Decryption(format!("{}: {}", field, e)))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
