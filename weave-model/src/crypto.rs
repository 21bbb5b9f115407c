//! Centralized cryptographic operations for weave.
//!
//! All Ed25519 signing, verification, BLAKE3 hashing, symmetric encryption
//! and secret generation go through this module.
//!
//! # Primitives
//!
//! | Primitive   | Algorithm       | Purpose                                        |
//! |-------------|-----------------|------------------------------------------------|
//! | Hash        | BLAKE3 (32 B)   | Block CIDs, log id derivation                  |
//! | Signature   | Ed25519 (64 B)  | Record signing                                 |
//! | Identity    | Ed25519 keypair | Log ownership                                  |
//! | SymKey      | AES-256-GCM     | Replicator, read and per-event content keys    |

use crate::types::{Hash, PubKey, Signature};
use aes_gcm::aead::{Aead, KeyInit};
// aes-gcm relies on generic-array 0.14, so suppress the upstream deprecation locally.
#[allow(deprecated)]
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::Aes256Gcm;
use ed25519_dalek::SigningKey;
use zeroize::Zeroize;

/// AES-GCM nonce length, stored in front of every ciphertext.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Content hashing (BLAKE3)
// ---------------------------------------------------------------------------

/// Compute the BLAKE3 content hash of arbitrary bytes.
#[inline]
pub fn content_hash(data: &[u8]) -> Hash {
    Hash(*blake3::hash(data).as_bytes())
}

// ---------------------------------------------------------------------------
// Ed25519
// ---------------------------------------------------------------------------

/// Generate a fresh log keypair.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut rand::rngs::OsRng)
}

/// Public half of a signing key as a strong type.
pub fn public_key(signing_key: &SigningKey) -> PubKey {
    PubKey(signing_key.verifying_key().to_bytes())
}

/// Sign arbitrary bytes.
pub fn sign(signing_key: &SigningKey, message: &[u8]) -> Signature {
    use ed25519_dalek::Signer;
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify an Ed25519 signature (strict: rejects small-order keys and
/// non-canonical S).
pub fn verify(pubkey: &PubKey, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
    let vk = verifying_key(pubkey)?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    vk.verify_strict(message, &sig)
        .map_err(|_| CryptoError::InvalidSignature)
}

/// Deserialize a `PubKey` into an Ed25519 `VerifyingKey`.
pub fn verifying_key(pubkey: &PubKey) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
    ed25519_dalek::VerifyingKey::from_bytes(&pubkey.0).map_err(|_| CryptoError::InvalidPublicKey)
}

// ---------------------------------------------------------------------------
// Secret generation (CSPRNG)
// ---------------------------------------------------------------------------

/// Generate 32 bytes of cryptographically secure randomness.
pub fn generate_secret() -> [u8; 32] {
    use rand::RngCore;
    let mut secret = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    secret
}

// ---------------------------------------------------------------------------
// Symmetric keys (AES-256-GCM)
// ---------------------------------------------------------------------------

/// 32-byte symmetric key. Ciphertexts are `nonce ‖ ciphertext ‖ tag`;
/// opening with the wrong key is an authentication failure, never garbage.
#[derive(Clone, PartialEq, Eq)]
pub struct SymKey([u8; 32]);

impl SymKey {
    pub fn generate() -> Self {
        SymKey(generate_secret())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        SymKey(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        <[u8; 32]>::try_from(bytes)
            .map(SymKey)
            .map_err(|_| CryptoError::InvalidKeyLength(bytes.len()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[allow(deprecated)]
    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(GenericArray::from_slice(&self.0))
    }

    /// Encrypt under a fresh random nonce.
    #[allow(deprecated)]
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce: [u8; NONCE_LEN] = {
            use rand::RngCore;
            let mut n = [0u8; NONCE_LEN];
            rand::rngs::OsRng.fill_bytes(&mut n);
            n
        };
        let sealed = self
            .cipher()
            .encrypt(GenericArray::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::Encrypt)?;
        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    #[allow(deprecated)]
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::CiphertextTooShort(ciphertext.len()));
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
        self.cipher()
            .decrypt(GenericArray::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::Decrypt)
    }
}

impl Drop for SymKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for SymKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymKey(..)")
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Cryptographic operation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid Ed25519 signature")]
    InvalidSignature,

    #[error("invalid Ed25519 public key")]
    InvalidPublicKey,

    #[error("invalid symmetric key length: {0}")]
    InvalidKeyLength(usize),

    #[error("ciphertext too short: {0} bytes")]
    CiphertextTooShort(usize),

    #[error("encryption failure")]
    Encrypt,

    /// Wrong key, corrupt or tampered ciphertext.
    #[error("decryption failure: authentication failed")]
    Decrypt,
}
