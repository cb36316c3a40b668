//! Self-describing envelope format for password-based encryption.
//!
//! Format:
//! ```text
//! [salt:8..=64][nonce:12][ciphertext:N][tag:16]
//! ```
//!
//! The salt length is not recorded. On decryption every candidate length in
//! the policy salt range is tried in ascending order, and the first candidate
//! whose tag verifies wins. A failed open therefore costs up to one key
//! derivation per candidate (57 with the default policy); callers that need
//! low latency should derive once and use the [`DerivedKey`] path.

use crate::aead::{generate_nonce, AeadProvider, AesGcmProvider, NONCE_SIZE, TAG_SIZE};
use crate::error::Error;
use crate::kdf::{DerivedKey, KeyDerivation, KEY_SIZE};
use crate::policy::{EncryptionPolicy, ENVELOPE_MIN_SALT};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::{ExposeSecret, SecretVec};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Smallest possible envelope: minimum salt, nonce and tag around an empty plaintext.
pub const MIN_ENVELOPE_SIZE: usize = ENVELOPE_MIN_SALT + NONCE_SIZE + TAG_SIZE;

/// Smallest possible salt-less envelope (`nonce || tag`).
pub const MIN_DETACHED_SIZE: usize = NONCE_SIZE + TAG_SIZE;

/// Borrowed view of an envelope split at a given salt length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeParts<'a> {
    /// Salt bytes.
    pub salt: &'a [u8],
    /// AEAD nonce.
    pub nonce: &'a [u8; NONCE_SIZE],
    /// Ciphertext followed by the authentication tag.
    pub ciphertext: &'a [u8],
}

impl<'a> EnvelopeParts<'a> {
    /// Splits `envelope` assuming a salt of `salt_len` bytes.
    ///
    /// Returns `None` if the envelope is too short to hold that salt, a nonce
    /// and a tag.
    #[must_use]
    pub fn split(envelope: &'a [u8], salt_len: usize) -> Option<Self> {
        if envelope.len() < salt_len + NONCE_SIZE + TAG_SIZE {
            return None;
        }
        let (salt, rest) = envelope.split_at(salt_len);
        let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);
        let nonce = <&[u8; NONCE_SIZE]>::try_from(nonce).ok()?;
        Some(Self { salt, nonce, ciphertext })
    }
}

/// An envelope produced by one seal operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedEnvelope {
    bytes: Vec<u8>,
    salt_len: usize,
}

impl SealedEnvelope {
    /// Returns the full `salt || nonce || ciphertext || tag` bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the envelope, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the salt.
    #[must_use]
    pub fn salt(&self) -> &[u8] {
        &self.bytes[..self.salt_len]
    }

    /// Returns the nonce.
    #[must_use]
    pub fn nonce(&self) -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&self.bytes[self.salt_len..self.salt_len + NONCE_SIZE]);
        nonce
    }

    /// Returns the envelope as standard base64 for text transport.
    #[must_use]
    pub fn to_base64(&self) -> String {
        encode_base64(&self.bytes)
    }
}

/// Encodes envelope bytes as standard (padded) base64.
#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes standard base64 text back into envelope bytes.
///
/// # Errors
///
/// Returns `Error::Serialization` if `text` is not valid base64.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, Error> {
    Ok(STANDARD.decode(text.trim())?)
}

/// Serde adapter storing byte fields as standard base64 strings.
pub(crate) mod serde_base64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_base64(bytes))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::decode_base64(&text).map_err(serde::de::Error::custom)
    }

    /// Same as the parent module for optional fields.
    pub(crate) mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub(crate) fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => serializer.serialize_some(&super::super::encode_base64(bytes)),
                None => serializer.serialize_none(),
            }
        }

        pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|text| super::super::decode_base64(&text).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

/// Derived keys memoised for the duration of one batch call.
///
/// A cache must only ever be used with a single password; it is dropped (and
/// its keys zeroized) when the call that created it returns.
#[derive(Default)]
pub(crate) struct KeyCache {
    keys: HashMap<(Vec<u8>, u32), SecretVec<u8>>,
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache").field("keys", &self.keys.len()).finish()
    }
}

impl KeyCache {
    fn get_or_derive(
        &mut self,
        kdf: &KeyDerivation,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        let slot = (salt.to_vec(), iterations);
        if let Some(key) = self.keys.get(&slot) {
            return Ok(Zeroizing::new(key.expose_secret().clone()));
        }
        let key = kdf.derive(password, salt, iterations, KEY_SIZE)?;
        let copy = Zeroizing::new(key.expose_secret().clone());
        self.keys.insert(slot, key);
        Ok(copy)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Builds and opens envelopes.
///
/// # Example
///
/// ```
/// use rowvault::envelope::EnvelopeCodec;
/// use rowvault::policy::EncryptionPolicy;
///
/// let codec = EnvelopeCodec::new(EncryptionPolicy::default());
/// let sealed = codec.seal_with_password(b"hello world", b"P@ss1", None, 1_000)?;
/// assert_eq!(sealed.as_bytes().len(), 32 + 12 + 11 + 16);
///
/// let opened = codec.open_with_password(sealed.as_bytes(), b"P@ss1", 1_000)?;
/// assert_eq!(opened.as_slice(), b"hello world");
/// # Ok::<(), rowvault::error::Error>(())
/// ```
pub struct EnvelopeCodec<A: AeadProvider = AesGcmProvider> {
    aead: Arc<A>,
    kdf: KeyDerivation,
}

impl EnvelopeCodec<AesGcmProvider> {
    /// Creates a codec using the default AES-256-GCM provider.
    #[must_use]
    pub fn new(policy: EncryptionPolicy) -> Self {
        Self::with_provider(AesGcmProvider, policy)
    }
}

impl<A: AeadProvider> EnvelopeCodec<A> {
    /// Creates a codec with a custom AEAD provider.
    pub fn with_provider(aead: A, policy: EncryptionPolicy) -> Self {
        Self { aead: Arc::new(aead), kdf: KeyDerivation::new(policy) }
    }

    /// Returns the key derivation function bound to this codec's policy.
    #[must_use]
    pub const fn kdf(&self) -> &KeyDerivation {
        &self.kdf
    }

    /// Returns the policy this codec enforces.
    #[must_use]
    pub const fn policy(&self) -> &EncryptionPolicy {
        self.kdf.policy()
    }

    /// Encrypts `plaintext` under a key derived from `password`.
    ///
    /// When `salt` is `None` a random salt of the policy default length is
    /// generated. A fresh nonce is generated on every call.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if the salt or iteration count is
    /// outside the policy, or an encryption error from the provider.
    pub fn seal_with_password(
        &self,
        plaintext: &[u8],
        password: &[u8],
        salt: Option<&[u8]>,
        iterations: u32,
    ) -> Result<SealedEnvelope, Error> {
        let salt = match salt {
            Some(salt) => salt.to_vec(),
            None => self.kdf.generate_salt(self.policy().default_salt_length)?,
        };
        let key = self.kdf.derive(password, &salt, iterations, KEY_SIZE)?;
        self.seal_parts(plaintext, key.expose_secret(), &salt)
    }

    /// Encrypts `plaintext` under a key the caller derived earlier.
    ///
    /// The key's salt is written into the envelope for wire compatibility but is
    /// not re-derived. A fresh nonce is generated on every call.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if the key's salt is outside the
    /// policy, or an encryption error from the provider.
    pub fn seal_with_key(
        &self,
        plaintext: &[u8],
        key: &DerivedKey,
    ) -> Result<SealedEnvelope, Error> {
        self.policy().check_salt_length(key.salt().len())?;
        self.seal_parts(plaintext, key.key().expose_secret(), key.salt())
    }

    /// Decrypts a password-path envelope, probing every candidate salt length.
    ///
    /// # Errors
    ///
    /// Returns `Error::TooShort` below [`MIN_ENVELOPE_SIZE`] bytes,
    /// `Error::InvalidParameter` for an out-of-policy iteration count, and
    /// `Error::AuthenticationFailed` when no candidate verifies.
    pub fn open_with_password(
        &self,
        envelope: &[u8],
        password: &[u8],
        iterations: u32,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        self.policy().check_iterations(iterations)?;
        self.open_probing(envelope, self.policy().salt_range(), |salt| {
            let key = self.kdf.derive(password, salt, iterations, KEY_SIZE)?;
            Ok(Zeroizing::new(key.expose_secret().clone()))
        })
    }

    /// Same as [`EnvelopeCodec::open_with_password`], reusing keys from `cache`.
    pub(crate) fn open_with_password_cached(
        &self,
        envelope: &[u8],
        password: &[u8],
        iterations: u32,
        cache: &mut KeyCache,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        self.policy().check_iterations(iterations)?;
        self.open_probing(envelope, self.policy().salt_range(), |salt| {
            cache.get_or_derive(&self.kdf, password, salt, iterations)
        })
    }

    /// Decrypts an envelope with a key the caller derived earlier.
    ///
    /// The key's own salt length is tried first, then every other candidate
    /// length in ascending order. No key derivation happens on this path.
    ///
    /// # Errors
    ///
    /// Returns `Error::TooShort` below [`MIN_ENVELOPE_SIZE`] bytes and
    /// `Error::AuthenticationFailed` when no candidate verifies.
    pub fn open_with_key(
        &self,
        envelope: &[u8],
        key: &DerivedKey,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        let own = key.salt().len();
        let candidates = std::iter::once(own)
            .filter(|len| self.policy().salt_range().contains(len))
            .chain(self.policy().salt_range().filter(move |len| *len != own));
        self.open_probing(envelope, candidates, |_| {
            Ok(Zeroizing::new(key.key().expose_secret().clone()))
        })
    }

    /// Encrypts into the salt-less `nonce || ciphertext || tag` layout.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` for a key of the wrong size.
    pub fn seal_detached(&self, plaintext: &[u8], key: &DerivedKey) -> Result<Vec<u8>, Error> {
        Ok(self.seal_parts(plaintext, key.key().expose_secret(), &[])?.into_bytes())
    }

    /// Decrypts the salt-less `nonce || ciphertext || tag` layout.
    ///
    /// # Errors
    ///
    /// Returns `Error::TooShort` below [`MIN_DETACHED_SIZE`] bytes and
    /// `Error::AuthenticationFailed` if the tag does not verify.
    pub fn open_detached(
        &self,
        envelope: &[u8],
        key: &DerivedKey,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        let parts = EnvelopeParts::split(envelope, 0).ok_or(Error::TooShort {
            length: envelope.len(),
            minimum: MIN_DETACHED_SIZE,
        })?;
        self.aead.decrypt(parts.ciphertext, key.key().expose_secret(), parts.nonce)
    }

    fn seal_parts(
        &self,
        plaintext: &[u8],
        key: &[u8],
        salt: &[u8],
    ) -> Result<SealedEnvelope, Error> {
        let nonce = generate_nonce();
        let ciphertext = self.aead.encrypt(plaintext, key, &nonce)?;

        let mut bytes = Vec::with_capacity(salt.len() + NONCE_SIZE + ciphertext.len());
        bytes.extend_from_slice(salt);
        bytes.extend_from_slice(&nonce);
        bytes.extend_from_slice(&ciphertext);

        Ok(SealedEnvelope { bytes, salt_len: salt.len() })
    }

    fn open_probing<I, K>(
        &self,
        envelope: &[u8],
        candidates: I,
        mut key_for: K,
    ) -> Result<Zeroizing<Vec<u8>>, Error>
    where
        I: IntoIterator<Item = usize>,
        K: FnMut(&[u8]) -> Result<Zeroizing<Vec<u8>>, Error>,
    {
        if envelope.len() < MIN_ENVELOPE_SIZE {
            return Err(Error::TooShort { length: envelope.len(), minimum: MIN_ENVELOPE_SIZE });
        }

        let mut attempts = 0usize;
        for salt_len in candidates {
            let Some(parts) = EnvelopeParts::split(envelope, salt_len) else {
                continue;
            };
            attempts += 1;
            let key = key_for(parts.salt)?;
            match self.aead.decrypt(parts.ciphertext, &key, parts.nonce) {
                Ok(plaintext) => {
                    tracing::debug!(salt_len, attempts, "envelope opened");
                    return Ok(plaintext);
                }
                Err(Error::AuthenticationFailed) => {}
                Err(err) => return Err(err),
            }
        }

        tracing::debug!(attempts, envelope_len = envelope.len(), "no salt length verified");
        Err(Error::AuthenticationFailed)
    }
}

impl<A: AeadProvider> Clone for EnvelopeCodec<A> {
    fn clone(&self) -> Self {
        Self { aead: Arc::clone(&self.aead), kdf: self.kdf }
    }
}
