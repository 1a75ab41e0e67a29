// Tandem Core
// Two-party end-to-end encrypted chat session over an untrusted relay

#![warn(clippy::all)]

// Модули
pub mod config;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod session;
pub mod state;
pub mod utils;

// Re-exports для удобства
pub use config::Config;
pub use crypto::{Capabilities, CryptoWorker, DefaultCryptoWorker, PublicKey};
pub use protocol::{Envelope, Message};
pub use session::{
    Outbound, RejectReason, SecureSession, SessionEvent, SessionHandle, TransportEvent,
};
pub use utils::error::{Result, TandemError};
