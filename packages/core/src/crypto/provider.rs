//! Defines the CryptoProvider trait for crypto-agility.

use crate::error::CryptoError;
use core::fmt::Debug;

/// Trait that formalizes all primitive cryptographic operations for a specific cipher suite.
///
/// The protocol never calls these directly: they are sequenced by
/// [`crate::crypto::worker::CryptoWorker`], which owns the private keys and runs
/// every call on the blocking pool.
pub trait CryptoProvider: Send + Sync + 'static {
    // Associated types for key representation (using Vec<u8> for flexibility)
    type KemPublicKey: AsRef<[u8]> + Debug + Clone + Send + Sync + 'static;
    type KemPrivateKey: AsRef<[u8]> + Debug + Clone + Send + Sync + 'static;
    type SignaturePublicKey: AsRef<[u8]> + Debug + Clone + Send + Sync + 'static;
    type SignaturePrivateKey: AsRef<[u8]> + Debug + Clone + Send + Sync + 'static;

    /// Generates a new key pair used for public-key encryption.
    fn generate_kem_keys() -> Result<(Self::KemPrivateKey, Self::KemPublicKey), CryptoError>;

    /// Generates a new Signature key pair.
    fn generate_signature_keys() -> Result<(Self::SignaturePrivateKey, Self::SignaturePublicKey), CryptoError>;

    /// Creates a KEM public key from raw bytes
    fn kem_public_key_from_bytes(bytes: Vec<u8>) -> Self::KemPublicKey;

    /// Creates a Signature public key from raw bytes
    fn signature_public_key_from_bytes(bytes: Vec<u8>) -> Self::SignaturePublicKey;

    /// Signs a message with the given private key.
    fn sign(private_key: &Self::SignaturePrivateKey, message: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Verifies a signature with the given public key.
    fn verify(public_key: &Self::SignaturePublicKey, message: &[u8], signature: &[u8]) -> Result<(), CryptoError>;

    /// Encrypts `plaintext` so that only the holder of the matching private key can open it.
    fn seal(public_key: &Self::KemPublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Opens a ciphertext produced by [`CryptoProvider::seal`].
    fn open(private_key: &Self::KemPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Stream-style symmetric encryption. Output length equals input length.
    fn stream_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Inverse of [`CryptoProvider::stream_encrypt`].
    fn stream_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Keyed MAC over `data`.
    fn mac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Derives a key from input key material using HKDF.
    fn hkdf_derive_key(
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Generates `len` cryptographically secure random bytes.
    fn random_bytes(len: usize) -> Result<Vec<u8>, CryptoError>;

    /// Returns the SuiteID associated with this CryptoProvider.
    fn suite_id() -> u16;
}
