//! Capability Interface
//!
//! Набор операций, которые протокол вызывает, но не реализует. Каждый вызов
//! асинхронный и типизированный: call site знает тип результата статически,
//! без корреляции по случайным message id.
//!
//! Протокол только упорядочивает эти вызовы; сами примитивы живут в
//! [`crate::crypto::suites`] и исполняются [`crate::crypto::worker::CryptoWorker`].

use crate::crypto::keys::PublicKey;
use crate::error::CryptoError;
use async_trait::async_trait;

#[async_trait]
pub trait Capabilities: Send + Sync {
    /// Публичный ключ локальной identity
    fn local_public_key(&self) -> &PublicKey;

    /// Подписать локальным приватным ключом
    async fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// `Ok(false)`: подпись не сходится. `Err`: сам вызов не выполнился
    async fn verify(
        &self,
        data: &[u8],
        signer: &PublicKey,
        signature: &[u8],
    ) -> Result<bool, CryptoError>;

    /// Зашифровать для владельца `recipient`
    async fn pki_encrypt(&self, data: &[u8], recipient: &PublicKey) -> Result<Vec<u8>, CryptoError>;

    /// Расшифровать локальным приватным ключом
    async fn pki_decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    async fn symmetric_encrypt(
        &self,
        data: &[u8],
        key: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    async fn symmetric_decrypt(
        &self,
        ciphertext: &[u8],
        key: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    async fn hmac(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Свежий 32-байтовый ключ
    async fn derive_symmetric_key(&self) -> Result<Vec<u8>, CryptoError>;

    /// Свежий 16-байтовый IV
    async fn generate_iv(&self) -> Result<Vec<u8>, CryptoError>;
}
