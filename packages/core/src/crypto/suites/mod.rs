//! Криптографические наборы (Crypto Suites)
//!
//! Этот модуль содержит реализации CryptoProvider trait.
//!
//! ## Classic Suite
//! - **Sealed box**: X25519 + HKDF-SHA256 + ChaCha20-Poly1305
//! - **Signatures**: Ed25519
//! - **Stream cipher**: AES-256-CTR
//! - **MAC**: HMAC-SHA256
//! - **Suite ID**: 1

pub mod classic;
