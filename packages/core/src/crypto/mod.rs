//! Криптографический модуль
//!
//! # Архитектура
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 SecureSession (crate::session)              │
//! └─────────────────────────────────────────────────────────────┘
//!                │                           │
//!                ▼                           ▼
//! ┌───────────────────────────┐  ┌──────────────────────────┐
//! │   SessionEstablisher      │  │  SecureChannel           │
//! │  - key exchange (K,IV,Hk) │  │  - encrypt-then-MAC      │
//! │  - 3/3 подписи            │  │  - очередь по эпохам     │
//! │  - VerificationGate       │──▶  - читает материал гейта │
//! └───────────────────────────┘  └──────────────────────────┘
//!                │                           │
//!                └─────────────┬─────────────┘
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │           Capabilities (async) ← CryptoWorker<P>            │
//! │  - приватные ключи identity                                 │
//! │  - каждый примитив в blocking pool                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              CryptoProvider (Crypto-Agility)                │
//! │  - sealed box (X25519 + HKDF + ChaCha20-Poly1305)           │
//! │  - Signatures (Ed25519)                                     │
//! │  - Stream cipher (AES-256-CTR), MAC (HMAC-SHA256)           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Модули
//!
//! - [`provider`]: CryptoProvider trait
//! - [`suites`]: реализации CryptoProvider (Classic)
//! - [`capability`], [`worker`]: асинхронный интерфейс примитивов
//! - [`keys`], [`material`]: identity и сессионный материал
//! - [`gate`], [`establisher`], [`channel`]: сам протокол

pub mod capability;
pub mod channel;
pub mod establisher;
pub mod gate;
pub mod keys;
pub mod material;
pub mod provider;
pub mod suites;
pub mod worker;

pub use capability::Capabilities;
pub use channel::{Received, SecureChannel};
pub use establisher::SessionEstablisher;
pub use gate::{RoundTicket, RoundVerdict, VerificationGate, VerificationState};
pub use keys::{KeyManager, PeerIdentity, PublicKey};
pub use material::{signed_payload, Epoch, OutboundRound, SessionKeyMaterial};
pub use provider::CryptoProvider;
pub use suites::classic::ClassicSuiteProvider;
pub use worker::CryptoWorker;

/// Идентификатор набора примитивов
pub type SuiteID = u16;

pub const CLASSIC_SUITE_ID: SuiteID = 1;

/// Worker с набором по умолчанию
pub type DefaultCryptoWorker = CryptoWorker<ClassicSuiteProvider>;
