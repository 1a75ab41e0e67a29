// Сессионный материал: (symmetric key, IV, hash key) одного раунда key exchange

use crate::config::Config;
use crate::crypto::keys::PublicKey;
use crate::utils::error::{Result, TandemError};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Номер раунда key exchange, назначаемый отправителем.
pub type Epoch = u64;

/// Данные под подписью: `epoch (u64 BE) || data`.
///
/// Эпоха идёт в каждую подпись, иначе relay мог бы переставить её у
/// чужого конверта.
pub fn signed_payload(epoch: Epoch, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + data.len());
    out.extend_from_slice(&epoch.to_be_bytes());
    out.extend_from_slice(data);
    out
}

/// Тройка ключей одного раунда. Затирается при drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeyMaterial {
    symmetric_key: Vec<u8>,
    iv: Vec<u8>,
    hash_key: Vec<u8>,
}

impl SessionKeyMaterial {
    /// Собрать материал, проверив длины
    pub fn new(symmetric_key: Vec<u8>, iv: Vec<u8>, hash_key: Vec<u8>) -> Result<Self> {
        let cfg = Config::global();
        if symmetric_key.len() != cfg.symmetric_key_length {
            return Err(TandemError::InvalidInput(format!(
                "Symmetric key must be {} bytes",
                cfg.symmetric_key_length
            )));
        }
        if iv.len() != cfg.iv_length {
            return Err(TandemError::InvalidInput(format!(
                "IV must be {} bytes",
                cfg.iv_length
            )));
        }
        if hash_key.len() != cfg.hash_key_length {
            return Err(TandemError::InvalidInput(format!(
                "Hash key must be {} bytes",
                cfg.hash_key_length
            )));
        }
        Ok(Self {
            symmetric_key,
            iv,
            hash_key,
        })
    }

    pub fn symmetric_key(&self) -> &[u8] {
        &self.symmetric_key
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    pub fn hash_key(&self) -> &[u8] {
        &self.hash_key
    }
}

impl fmt::Debug for SessionKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKeyMaterial(..)")
    }
}

/// Материал, которым мы шифруем исходящие сообщения (наш последний раунд).
#[derive(Debug, Clone)]
pub struct OutboundRound {
    pub epoch: Epoch,
    /// Кому был отправлен key exchange
    pub peer: PublicKey,
    pub material: SessionKeyMaterial,
}
