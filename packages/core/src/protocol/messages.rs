// Прикладные сообщения
// Появляются только после полной проверки подписи и целостности

use crate::crypto::keys::PublicKey;
use crate::crypto::material::Epoch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Расшифрованное сообщение чата
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// UUID v4, локальный идентификатор
    pub id: String,
    pub sender: PublicKey,
    pub recipient: PublicKey,
    pub text: String,
    /// Эпоха ключевого материала, которым сообщение было зашифровано
    pub epoch: Epoch,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: PublicKey, recipient: PublicKey, text: String, epoch: Epoch) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
            recipient,
            text,
            epoch,
            timestamp: Utc::now(),
        }
    }
}
