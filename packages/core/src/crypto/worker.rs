//! Crypto worker
//!
//! Реализация [`Capabilities`] поверх синхронного [`CryptoProvider`].
//! Каждый примитив отправляется в blocking pool tokio, чтобы медленные
//! операции с публичным ключом не блокировали транспорт.
//!
//! Worker единолично владеет приватными ключами identity: наружу они
//! не выдаются, только результаты sign / pki_decrypt.

use crate::config::Config;
use crate::crypto::capability::Capabilities;
use crate::crypto::keys::{KeyManager, PublicKey};
use crate::crypto::provider::CryptoProvider;
use crate::error::CryptoError;
use async_trait::async_trait;
use std::sync::Arc;

pub struct CryptoWorker<P: CryptoProvider> {
    keys: Arc<KeyManager<P>>,
}

impl<P: CryptoProvider> CryptoWorker<P> {
    /// Сгенерировать identity и создать worker
    pub fn new() -> Result<Self, CryptoError> {
        Ok(Self::from_keys(KeyManager::<P>::generate()?))
    }

    pub fn from_keys(keys: KeyManager<P>) -> Self {
        Self {
            keys: Arc::new(keys),
        }
    }

    async fn run<T, F>(&self, job: F) -> Result<T, CryptoError>
    where
        T: Send + 'static,
        F: FnOnce(&KeyManager<P>) -> Result<T, CryptoError> + Send + 'static,
    {
        let keys = Arc::clone(&self.keys);
        tokio::task::spawn_blocking(move || job(keys.as_ref())).await?
    }
}

impl<P: CryptoProvider> Clone for CryptoWorker<P> {
    fn clone(&self) -> Self {
        Self {
            keys: Arc::clone(&self.keys),
        }
    }
}

#[async_trait]
impl<P: CryptoProvider> Capabilities for CryptoWorker<P> {
    fn local_public_key(&self) -> &PublicKey {
        self.keys.public_key()
    }

    async fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let data = data.to_vec();
        self.run(move |keys| P::sign(keys.signing_private_key(), &data))
            .await
    }

    async fn verify(
        &self,
        data: &[u8],
        signer: &PublicKey,
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        let data = data.to_vec();
        let signature = signature.to_vec();
        let verifying = P::signature_public_key_from_bytes(signer.verifying_key().to_vec());
        self.run(move |_| match P::verify(&verifying, &data, &signature) {
            Ok(()) => Ok(true),
            // Мусор вместо подписи тоже считается «не сошлось»
            Err(CryptoError::SignatureVerificationError(_))
            | Err(CryptoError::InvalidInputError(_)) => Ok(false),
            Err(e) => Err(e),
        })
        .await
    }

    async fn pki_encrypt(&self, data: &[u8], recipient: &PublicKey) -> Result<Vec<u8>, CryptoError> {
        let data = data.to_vec();
        let recipient = P::kem_public_key_from_bytes(recipient.encryption_key().to_vec());
        self.run(move |_| P::seal(&recipient, &data)).await
    }

    async fn pki_decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let ciphertext = ciphertext.to_vec();
        self.run(move |keys| P::open(keys.kem_private_key(), &ciphertext))
            .await
    }

    async fn symmetric_encrypt(
        &self,
        data: &[u8],
        key: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let (data, key, iv) = (data.to_vec(), key.to_vec(), iv.to_vec());
        self.run(move |_| P::stream_encrypt(&key, &iv, &data)).await
    }

    async fn symmetric_decrypt(
        &self,
        ciphertext: &[u8],
        key: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let (ciphertext, key, iv) = (ciphertext.to_vec(), key.to_vec(), iv.to_vec());
        self.run(move |_| P::stream_decrypt(&key, &iv, &ciphertext))
            .await
    }

    async fn hmac(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let (key, data) = (key.to_vec(), data.to_vec());
        self.run(move |_| P::mac(&key, &data)).await
    }

    async fn derive_symmetric_key(&self) -> Result<Vec<u8>, CryptoError> {
        let len = Config::global().symmetric_key_length;
        self.run(move |_| P::random_bytes(len)).await
    }

    async fn generate_iv(&self) -> Result<Vec<u8>, CryptoError> {
        let len = Config::global().iv_length;
        self.run(move |_| P::random_bytes(len)).await
    }
}
