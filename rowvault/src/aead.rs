//! AEAD provider abstraction and the default AES-256-GCM implementation.

use crate::error::Error;
use crate::kdf::KEY_SIZE;
use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use zeroize::Zeroizing;

/// Nonce size for AES-256-GCM (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size for AES-256-GCM (128 bits).
pub const TAG_SIZE: usize = 16;

/// Raw authenticated encryption primitive.
///
/// Implementations must be thread-safe (`Send + Sync`) and stateless with
/// respect to keys: every call receives the key it should use.
///
/// # Example
///
/// ```rust,ignore
/// use rowvault::aead::{AeadProvider, NONCE_SIZE};
///
/// struct HsmProvider;
///
/// impl AeadProvider for HsmProvider {
///     fn encrypt(&self, plaintext: &[u8], key: &[u8], nonce: &[u8; NONCE_SIZE])
///         -> Result<Vec<u8>, Error> {
///         // Implementation
///     }
///     // ... decrypt
/// }
/// ```
pub trait AeadProvider: Send + Sync {
    /// Encrypts `plaintext` and returns `ciphertext || tag`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if the key is not [`KEY_SIZE`] bytes, or
    /// `Error::EncryptionFailed` if the cipher rejects the input.
    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &[u8],
        nonce: &[u8; NONCE_SIZE],
    ) -> Result<Vec<u8>, Error>;

    /// Verifies the tag on `ciphertext || tag` and returns the plaintext.
    ///
    /// # Errors
    ///
    /// Returns `Error::AuthenticationFailed` if the tag does not verify, or
    /// `Error::InvalidParameter` if the key is not [`KEY_SIZE`] bytes.
    fn decrypt(
        &self,
        ciphertext_with_tag: &[u8],
        key: &[u8],
        nonce: &[u8; NONCE_SIZE],
    ) -> Result<Zeroizing<Vec<u8>>, Error>;
}

/// AES-256-GCM provider backed by the `aes-gcm` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmProvider;

impl AesGcmProvider {
    fn cipher(key: &[u8]) -> Result<Aes256Gcm, Error> {
        if key.len() != KEY_SIZE {
            return Err(Error::InvalidParameter(format!(
                "key must be {KEY_SIZE} bytes, got {}",
                key.len()
            )));
        }
        Aes256Gcm::new_from_slice(key)
            .map_err(|_| Error::InvalidParameter(format!("key must be {KEY_SIZE} bytes")))
    }
}

impl AeadProvider for AesGcmProvider {
    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &[u8],
        nonce: &[u8; NONCE_SIZE],
    ) -> Result<Vec<u8>, Error> {
        Self::cipher(key)?
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|_| Error::EncryptionFailed("AES-256-GCM encryption failed".to_string()))
    }

    fn decrypt(
        &self,
        ciphertext_with_tag: &[u8],
        key: &[u8],
        nonce: &[u8; NONCE_SIZE],
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        if ciphertext_with_tag.len() < TAG_SIZE {
            return Err(Error::AuthenticationFailed);
        }
        Self::cipher(key)?
            .decrypt(Nonce::from_slice(nonce), ciphertext_with_tag)
            .map(Zeroizing::new)
            .map_err(|_| Error::AuthenticationFailed)
    }
}

/// Generates a fresh random nonce from the OS CSPRNG.
///
/// 96 random bits per call; collisions under one key are negligible for any
/// realistic message count.
#[must_use]
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}
