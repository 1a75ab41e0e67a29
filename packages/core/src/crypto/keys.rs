// Управление ключами
// Локальная identity (keypair процесса) и публичный ключ собеседника

use crate::config::Config;
use crate::crypto::CryptoProvider;
use crate::error::CryptoError;
use crate::utils::b64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Публичный ключ участника: ключ шифрования + ключ проверки подписи.
///
/// Именно это значение рассылается при `PUBLIC_KEY` и стоит в полях
/// `sender` / `recipient` каждого конверта.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(with = "serde_bytes")]
    encryption: Vec<u8>,
    #[serde(with = "serde_bytes")]
    verifying: Vec<u8>,
}

impl PublicKey {
    pub fn new(encryption: Vec<u8>, verifying: Vec<u8>) -> Self {
        Self { encryption, verifying }
    }

    /// Ключ для pki_encrypt
    pub fn encryption_key(&self) -> &[u8] {
        &self.encryption
    }

    /// Ключ для verify
    pub fn verifying_key(&self) -> &[u8] {
        &self.verifying
    }

    /// `encryption || verifying`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encryption.len() + self.verifying.len());
        out.extend_from_slice(&self.encryption);
        out.extend_from_slice(&self.verifying);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let half = Config::global().public_key_size;
        if bytes.len() != half * 2 {
            return Err(CryptoError::InvalidInputError(format!(
                "Public key must be {} bytes, got {}",
                half * 2,
                bytes.len()
            )));
        }
        let (encryption, verifying) = bytes.split_at(half);
        Ok(Self::new(encryption.to_vec(), verifying.to_vec()))
    }

    /// Base64 всего ключа
    pub fn to_base64(&self) -> String {
        b64::encode(&self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = b64::decode(encoded).map_err(CryptoError::InvalidInputError)?;
        Self::from_bytes(&bytes)
    }

    /// Короткий фрагмент для уведомлений и логов
    pub fn snippet(&self) -> String {
        b64::snippet(&self.to_bytes(), Config::global().key_snippet_length)
    }

    /// Проверка размеров компонентов
    pub fn is_well_formed(&self) -> bool {
        let size = Config::global().public_key_size;
        self.encryption.len() == size && self.verifying.len() == size
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.snippet())
    }
}

/// Публичный ключ собеседника. Одновременно активен максимум один.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    public_key: PublicKey,
}

impl PeerIdentity {
    pub fn new(public_key: PublicKey) -> Self {
        Self { public_key }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn matches(&self, key: &PublicKey) -> bool {
        &self.public_key == key
    }
}

/// Менеджер локальной identity.
///
/// Ключи генерируются один раз на процесс и не меняются. Приватные части
/// доступны только внутри crate (их читает [`crate::crypto::worker::CryptoWorker`]).
pub struct KeyManager<P: CryptoProvider> {
    /// Ключ для sealed box
    kem_key: (P::KemPrivateKey, P::KemPublicKey),

    /// Ключ подписи
    signing_key: (P::SignaturePrivateKey, P::SignaturePublicKey),

    public_key: PublicKey,
}

impl<P: CryptoProvider> KeyManager<P> {
    /// Сгенерировать новую identity
    pub fn generate() -> Result<Self, CryptoError> {
        let kem_key = P::generate_kem_keys()?;
        let signing_key = P::generate_signature_keys()?;
        let public_key = PublicKey::new(
            kem_key.1.as_ref().to_vec(),
            signing_key.1.as_ref().to_vec(),
        );

        tracing::info!(
            target: "crypto::keys",
            key = %public_key.snippet(),
            suite_id = P::suite_id(),
            "Keypair generated"
        );

        Ok(Self {
            kem_key,
            signing_key,
            public_key,
        })
    }

    /// Публичный ключ identity
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub(crate) fn kem_private_key(&self) -> &P::KemPrivateKey {
        &self.kem_key.0
    }

    pub(crate) fn signing_private_key(&self) -> &P::SignaturePrivateKey {
        &self.signing_key.0
    }
}
