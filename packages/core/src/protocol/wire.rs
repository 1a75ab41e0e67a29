// Wire format
// MessagePack для relay, JSON для отладки и логов

use crate::protocol::envelope::Envelope;
use crate::utils::error::{Result, TandemError};
use rmp_serde::{Deserializer, Serializer};
use serde::{Deserialize, Serialize};

/// Упаковать конверт в MessagePack (структуры как map, чтобы опциональные поля не сдвигали порядок)
pub fn pack_envelope(envelope: &Envelope) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    envelope
        .serialize(&mut Serializer::new(&mut buffer).with_struct_map())
        .map_err(|e| TandemError::Serialization(format!("MessagePack pack error: {}", e)))?;
    Ok(buffer)
}

/// Распаковать конверт из MessagePack
pub fn unpack_envelope(data: &[u8]) -> Result<Envelope> {
    let mut deserializer = Deserializer::new(data);
    Envelope::deserialize(&mut deserializer)
        .map_err(|e| TandemError::Serialization(format!("MessagePack unpack error: {}", e)))
}

pub fn to_json(envelope: &Envelope) -> Result<String> {
    serde_json::to_string(envelope).map_err(|e| TandemError::Serialization(e.to_string()))
}

pub fn from_json(json: &str) -> Result<Envelope> {
    serde_json::from_str(json).map_err(|e| TandemError::Serialization(e.to_string()))
}
