// Типы ошибок протокола

use crate::error::CryptoError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TandemError {
    /// Подпись не прошла проверку (key exchange или content)
    #[error("Verification failed: {0}")]
    Verification(String),

    /// Пересчитанный HMAC не совпал с расшифрованным
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// Поле конверта не расшифровывается локальным ключом
    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("No secure session established")]
    UnverifiedSession,

    #[error("Epoch mismatch: envelope {envelope}, installed {installed:?}")]
    EpochMismatch { envelope: u64, installed: Option<u64> },

    #[error("Unknown sender: {0}")]
    UnknownSender(String),

    #[error("Envelope is addressed to another recipient: {0}")]
    Misaddressed(String),

    #[error("Malformed envelope: {0}")]
    Malformed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Раунд прерван disconnect / сменой комнаты
    #[error("Round cancelled")]
    Cancelled,

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

pub type Result<T> = std::result::Result<T, TandemError>;
