// Base64 утилиты

use base64::{engine::general_purpose, Engine};

pub fn encode(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(data)
}

pub fn decode(data: &str) -> Result<Vec<u8>, String> {
    general_purpose::STANDARD
        .decode(data)
        .map_err(|e| format!("Base64 decode failed: {}", e))
}

/// Короткий фрагмент base64-представления ключа для уведомлений.
/// Берётся из середины: начало у всех ключей одного формата похоже.
pub fn snippet(data: &[u8], len: usize) -> String {
    let encoded = encode(data);
    let start = 10.min(encoded.len());
    let end = (start + len).min(encoded.len());
    encoded[start..end].to_string()
}
