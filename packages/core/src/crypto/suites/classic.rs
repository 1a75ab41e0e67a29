use crate::crypto::provider::CryptoProvider;
use crate::error::CryptoError;
use aes::Aes256;
use chacha20poly1305::{
    aead::{Aead, Payload},
    ChaCha20Poly1305, Key as AeadKeyChacha, KeyInit, Nonce,
};
use ctr::cipher::{KeyIvInit, StreamCipher};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand_core::RngCore;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey as KemPublicKeyDalek, StaticSecret};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

const SEAL_INFO: &[u8] = b"Tandem-Sealed-Box-v1";
const EPHEMERAL_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Concrete implementation of `CryptoProvider` for the classic suite.
///
/// - sealing: X25519 ephemeral-static DH → HKDF-SHA256 → ChaCha20-Poly1305
/// - signatures: Ed25519
/// - stream cipher: AES-256-CTR (16-byte IV = initial counter block)
/// - MAC: HMAC-SHA256
pub struct ClassicSuiteProvider;

fn key_array<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N], CryptoError> {
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidInputError(format!("Invalid {} length", what)))
}

impl CryptoProvider for ClassicSuiteProvider {
    type KemPublicKey = Vec<u8>;
    type KemPrivateKey = Vec<u8>;
    type SignaturePublicKey = Vec<u8>;
    type SignaturePrivateKey = Vec<u8>;

    fn generate_kem_keys() -> Result<(Self::KemPrivateKey, Self::KemPublicKey), CryptoError> {
        let private_key = StaticSecret::random_from_rng(OsRng);
        let public_key = KemPublicKeyDalek::from(&private_key);
        Ok((private_key.to_bytes().to_vec(), public_key.to_bytes().to_vec()))
    }

    fn generate_signature_keys(
    ) -> Result<(Self::SignaturePrivateKey, Self::SignaturePublicKey), CryptoError> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Ok((
            signing_key.to_bytes().to_vec(),
            verifying_key.to_bytes().to_vec(),
        ))
    }

    fn kem_public_key_from_bytes(bytes: Vec<u8>) -> Self::KemPublicKey {
        bytes
    }

    fn signature_public_key_from_bytes(bytes: Vec<u8>) -> Self::SignaturePublicKey {
        bytes
    }

    fn sign(private_key: &Self::SignaturePrivateKey, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let bytes: [u8; 32] = key_array(private_key, "signing key")?;
        let signing_key = SigningKey::from_bytes(&bytes);
        let signature = signing_key.sign(message);
        Ok(signature.to_bytes().to_vec())
    }

    fn verify(
        public_key: &Self::SignaturePublicKey,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        let vk_bytes: [u8; 32] = key_array(public_key, "verifying key")?;
        let verifying_key = VerifyingKey::from_bytes(&vk_bytes)
            .map_err(|e| CryptoError::InvalidInputError(format!("Invalid verifying key: {}", e)))?;

        let sig_bytes: [u8; 64] = key_array(signature, "signature")?;
        let signature_obj = Signature::from_bytes(&sig_bytes);

        verifying_key
            .verify(message, &signature_obj)
            .map_err(|e| CryptoError::SignatureVerificationError(e.to_string()))
    }

    fn seal(public_key: &Self::KemPublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let pk_bytes: [u8; 32] = key_array(public_key, "KEM public key")?;
        let recipient_public_key = KemPublicKeyDalek::from(pk_bytes);

        let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
        // Get ephemeral public key before consuming ephemeral_secret
        let ephemeral_public_key = KemPublicKeyDalek::from(&ephemeral_secret);
        let shared_secret = ephemeral_secret.diffie_hellman(&recipient_public_key);

        let key = Self::hkdf_derive_key(
            ephemeral_public_key.as_bytes(),
            shared_secret.as_bytes(),
            SEAL_INFO,
            32,
        )?;
        let nonce = Self::random_bytes(NONCE_LEN)?;

        let cipher = ChaCha20Poly1305::new(AeadKeyChacha::from_slice(&key));
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: ephemeral_public_key.as_bytes(),
                },
            )
            .map_err(|e| CryptoError::SealError(e.to_string()))?;

        let mut sealed = Vec::with_capacity(EPHEMERAL_LEN + NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(ephemeral_public_key.as_bytes());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(private_key: &Self::KemPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        // минимум: ephemeral || nonce || tag
        if ciphertext.len() < EPHEMERAL_LEN + NONCE_LEN + 16 {
            return Err(CryptoError::OpenError("Sealed box too short".to_string()));
        }
        let sk_bytes: [u8; 32] = key_array(private_key, "KEM private key")?;
        let static_secret = StaticSecret::from(sk_bytes);

        let (ephemeral, rest) = ciphertext.split_at(EPHEMERAL_LEN);
        let (nonce, body) = rest.split_at(NONCE_LEN);
        let ephemeral_bytes: [u8; 32] = key_array(ephemeral, "ephemeral key")?;
        let ephemeral_public_key = KemPublicKeyDalek::from(ephemeral_bytes);

        let shared_secret = static_secret.diffie_hellman(&ephemeral_public_key);
        let key = Self::hkdf_derive_key(ephemeral, shared_secret.as_bytes(), SEAL_INFO, 32)?;

        let cipher = ChaCha20Poly1305::new(AeadKeyChacha::from_slice(&key));
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: body,
                    aad: ephemeral,
                },
            )
            .map_err(|e| CryptoError::OpenError(e.to_string()))?;
        Ok(plaintext)
    }

    fn stream_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut cipher = Aes256Ctr::new_from_slices(key, iv)
            .map_err(|e| CryptoError::CipherError(e.to_string()))?;
        let mut buffer = plaintext.to_vec();
        cipher
            .try_apply_keystream(&mut buffer)
            .map_err(|e| CryptoError::CipherError(e.to_string()))?;
        Ok(buffer)
    }

    fn stream_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        // CTR симметричен
        Self::stream_encrypt(key, iv, ciphertext)
    }

    fn mac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|e| CryptoError::MacError(e.to_string()))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn hkdf_derive_key(
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<Vec<u8>, CryptoError> {
        let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
        let mut okm = vec![0u8; len];
        hkdf.expand(info, &mut okm)
            .map_err(|e| CryptoError::KeyDerivationError(e.to_string()))?;
        Ok(okm)
    }

    fn random_bytes(len: usize) -> Result<Vec<u8>, CryptoError> {
        let mut bytes = vec![0u8; len];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::KeyGenerationError(e.to_string()))?;
        Ok(bytes)
    }

    fn suite_id() -> u16 {
        crate::crypto::CLASSIC_SUITE_ID
    }
}
