// Валидация входящих конвертов
// Только структура: размеры и непустота blob'ов, криптография проверяется дальше.

use crate::config::Config;
use crate::crypto::keys::PublicKey;
use crate::protocol::envelope::{Content, Envelope, KeyExchange};
use crate::utils::error::{Result, TandemError};

/// Валидация публичного ключа
pub fn validate_public_key(key: &PublicKey, field: &str) -> Result<()> {
    if !key.is_well_formed() {
        return Err(TandemError::Malformed(format!(
            "{} public key must be {} + {} bytes",
            field,
            Config::global().public_key_size,
            Config::global().public_key_size
        )));
    }
    Ok(())
}

fn validate_blob_exact(blob: &[u8], plain_len: usize, field: &str) -> Result<()> {
    let expected = Config::global().sealed_len(plain_len);
    if blob.len() != expected {
        return Err(TandemError::Malformed(format!(
            "{} must be {} bytes, got {}",
            field,
            expected,
            blob.len()
        )));
    }
    Ok(())
}

/// Валидация KeyExchange: шесть запечатанных полей фиксированного размера
pub fn validate_key_exchange(kx: &KeyExchange) -> Result<()> {
    let cfg = Config::global();
    let key = kx.key();
    let sig = kx.signature();

    validate_blob_exact(&key.enc_sym_key, cfg.symmetric_key_length, "encSymKey")?;
    validate_blob_exact(&key.enc_iv, cfg.iv_length, "encIV")?;
    validate_blob_exact(&key.enc_hash_key, cfg.hash_key_length, "encHashKey")?;
    validate_blob_exact(&sig.enc_sig_sym_key, cfg.signature_size, "encSigSymKey")?;
    validate_blob_exact(&sig.enc_sig_iv, cfg.signature_size, "encSigIV")?;
    validate_blob_exact(&sig.enc_sig_hash_key, cfg.signature_size, "encSigHashKey")?;

    Ok(())
}

/// Валидация Content
pub fn validate_content(content: &Content) -> Result<()> {
    let cfg = Config::global();
    let text = content.text();
    let sig = content.signature();

    // Пустой шифртекст = пустое сообщение, такие не отправляются
    let min = cfg.sealed_len(1);
    let max = cfg.sealed_len(cfg.max_plaintext_length);
    if text.enc_ciphertext.len() < min || text.enc_ciphertext.len() > max {
        return Err(TandemError::Malformed(format!(
            "encCiphertext must be between {} and {} bytes, got {}",
            min,
            max,
            text.enc_ciphertext.len()
        )));
    }

    validate_blob_exact(&text.enc_hash, cfg.mac_length, "encHash")?;
    validate_blob_exact(&sig.enc_sig_ciphertext, cfg.signature_size, "encSigCiphertext")?;
    validate_blob_exact(&sig.enc_sig_hash, cfg.signature_size, "encSigHash")?;

    Ok(())
}

/// Полная структурная валидация конверта
pub fn validate_envelope(envelope: &Envelope) -> Result<()> {
    validate_public_key(envelope.sender(), "sender")?;
    validate_public_key(envelope.recipient(), "recipient")?;

    match envelope {
        Envelope::KeyExchange(kx) => validate_key_exchange(kx),
        Envelope::Content(content) => validate_content(content),
    }
}

/// Валидация исходящего текста
pub fn validate_plaintext(text: &str) -> Result<()> {
    if text.is_empty() {
        return Err(TandemError::InvalidInput(
            "Message text cannot be empty".to_string(),
        ));
    }
    let max = Config::global().max_plaintext_length;
    if text.len() > max {
        return Err(TandemError::InvalidInput(format!(
            "Message text exceeds {} bytes",
            max
        )));
    }
    Ok(())
}
