//! Конверты протокола: то, что видит relay.
//!
//! Relay видит только `code`, `sender`, `recipient`, `epoch` и непрозрачные
//! шифртексты. Каждое поле шифруется отдельно ключом получателя, так что
//! порча одного поля не затрагивает остальные.
//!
//! Конверт неизменяем: создаётся один раз конструктором и дальше только
//! читается.

use crate::crypto::keys::PublicKey;
use crate::crypto::material::Epoch;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Код key exchange на проводе
pub const CODE_KEY_EXCHANGE: u8 = 1;
/// Код content на проводе
pub const CODE_CONTENT: u8 = 2;

/// Зашифрованная тройка ключей
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedKeys {
    #[serde(with = "serde_bytes")]
    pub enc_sym_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub enc_iv: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub enc_hash_key: Vec<u8>,
}

/// Зашифрованные подписи над тройкой ключей
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedKeySignatures {
    #[serde(with = "serde_bytes")]
    pub enc_sig_sym_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub enc_sig_iv: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub enc_sig_hash_key: Vec<u8>,
}

/// Зашифрованные шифртекст и HMAC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedText {
    #[serde(with = "serde_bytes")]
    pub enc_ciphertext: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub enc_hash: Vec<u8>,
}

/// Зашифрованные подписи над шифртекстом и HMAC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedTextSignatures {
    #[serde(with = "serde_bytes")]
    pub enc_sig_ciphertext: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub enc_sig_hash: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyExchange {
    sender: PublicKey,
    recipient: PublicKey,
    epoch: Epoch,
    key: SealedKeys,
    signature: SealedKeySignatures,
}

impl KeyExchange {
    pub fn sender(&self) -> &PublicKey {
        &self.sender
    }

    pub fn recipient(&self) -> &PublicKey {
        &self.recipient
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn key(&self) -> &SealedKeys {
        &self.key
    }

    pub fn signature(&self) -> &SealedKeySignatures {
        &self.signature
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    sender: PublicKey,
    recipient: PublicKey,
    epoch: Epoch,
    text: SealedText,
    signature: SealedTextSignatures,
}

impl Content {
    pub fn sender(&self) -> &PublicKey {
        &self.sender
    }

    pub fn recipient(&self) -> &PublicKey {
        &self.recipient
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn text(&self) -> &SealedText {
        &self.text
    }

    pub fn signature(&self) -> &SealedTextSignatures {
        &self.signature
    }
}

/// Конверт протокола: key exchange (code 1) или content (code 2)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope", into = "RawEnvelope")]
pub enum Envelope {
    KeyExchange(KeyExchange),
    Content(Content),
}

impl Envelope {
    pub fn key_exchange(
        sender: PublicKey,
        recipient: PublicKey,
        epoch: Epoch,
        key: SealedKeys,
        signature: SealedKeySignatures,
    ) -> Self {
        Envelope::KeyExchange(KeyExchange {
            sender,
            recipient,
            epoch,
            key,
            signature,
        })
    }

    pub fn content(
        sender: PublicKey,
        recipient: PublicKey,
        epoch: Epoch,
        text: SealedText,
        signature: SealedTextSignatures,
    ) -> Self {
        Envelope::Content(Content {
            sender,
            recipient,
            epoch,
            text,
            signature,
        })
    }

    pub fn code(&self) -> u8 {
        match self {
            Envelope::KeyExchange(_) => CODE_KEY_EXCHANGE,
            Envelope::Content(_) => CODE_CONTENT,
        }
    }

    pub fn sender(&self) -> &PublicKey {
        match self {
            Envelope::KeyExchange(kx) => &kx.sender,
            Envelope::Content(c) => &c.sender,
        }
    }

    pub fn recipient(&self) -> &PublicKey {
        match self {
            Envelope::KeyExchange(kx) => &kx.recipient,
            Envelope::Content(c) => &c.recipient,
        }
    }

    pub fn epoch(&self) -> Epoch {
        match self {
            Envelope::KeyExchange(kx) => kx.epoch,
            Envelope::Content(c) => c.epoch,
        }
    }

    /// Все шифртексты конверта в порядке полей
    pub fn blobs(&self) -> Vec<&[u8]> {
        match self {
            Envelope::KeyExchange(kx) => vec![
                kx.key.enc_sym_key.as_slice(),
                kx.key.enc_iv.as_slice(),
                kx.key.enc_hash_key.as_slice(),
                kx.signature.enc_sig_sym_key.as_slice(),
                kx.signature.enc_sig_iv.as_slice(),
                kx.signature.enc_sig_hash_key.as_slice(),
            ],
            Envelope::Content(c) => vec![
                c.text.enc_ciphertext.as_slice(),
                c.text.enc_hash.as_slice(),
                c.signature.enc_sig_ciphertext.as_slice(),
                c.signature.enc_sig_hash.as_slice(),
            ],
        }
    }
}

// ============================================================================
// Wire representation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawSignature {
    Key(SealedKeySignatures),
    Text(SealedTextSignatures),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    code: u8,
    sender: PublicKey,
    recipient: PublicKey,
    epoch: Epoch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<SealedKeys>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<SealedText>,
    signature: RawSignature,
}

impl From<Envelope> for RawEnvelope {
    fn from(envelope: Envelope) -> Self {
        match envelope {
            Envelope::KeyExchange(kx) => RawEnvelope {
                code: CODE_KEY_EXCHANGE,
                sender: kx.sender,
                recipient: kx.recipient,
                epoch: kx.epoch,
                key: Some(kx.key),
                text: None,
                signature: RawSignature::Key(kx.signature),
            },
            Envelope::Content(c) => RawEnvelope {
                code: CODE_CONTENT,
                sender: c.sender,
                recipient: c.recipient,
                epoch: c.epoch,
                key: None,
                text: Some(c.text),
                signature: RawSignature::Text(c.signature),
            },
        }
    }
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = String;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        match (raw.code, raw.key, raw.text, raw.signature) {
            (CODE_KEY_EXCHANGE, Some(key), None, RawSignature::Key(signature)) => Ok(
                Envelope::key_exchange(raw.sender, raw.recipient, raw.epoch, key, signature),
            ),
            (CODE_CONTENT, None, Some(text), RawSignature::Text(signature)) => Ok(
                Envelope::content(raw.sender, raw.recipient, raw.epoch, text, signature),
            ),
            (CODE_KEY_EXCHANGE, ..) => Err("code 1 requires key + key signatures".to_string()),
            (CODE_CONTENT, ..) => Err("code 2 requires text + text signatures".to_string()),
            (code, ..) => Err(format!("unknown envelope code {}", code)),
        }
    }
}
