//! Encryption metadata, its persisted snapshot and validation.

use crate::aead::NONCE_SIZE;
use crate::envelope::serde_base64;
use crate::kdf::DerivedKey;
use crate::policy::EncryptionPolicy;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported AEAD algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// AES-256 in Galois/Counter Mode.
    #[default]
    Aes256Gcm,
}

impl Algorithm {
    /// Canonical identifier written into snapshots.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Aes256Gcm => "AES-256-GCM",
        }
    }

    /// Resolves an identifier, ignoring case and `-`/`_` separators.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        let normalized: String = id
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "AES256GCM" | "AESGCM256" => Some(Self::Aes256Gcm),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Where the encryption key comes from.
#[derive(Debug)]
pub enum KeySource {
    /// Derive a key from this password for every operation.
    Password(SecretString),
    /// Use a key the caller derived once.
    DerivedKey(DerivedKey),
}

impl KeySource {
    /// Wraps a password.
    #[must_use]
    pub fn password(password: impl Into<String>) -> Self {
        Self::Password(SecretString::new(password.into()))
    }
}

/// Parameters of one encryption or decryption call.
///
/// # Example
///
/// ```
/// use rowvault::metadata::EncryptionMetadata;
///
/// let metadata = EncryptionMetadata::with_password("P@ss1")
///     .with_iterations(20_000)
///     .with_salt(vec![7u8; 16]);
/// assert_eq!(metadata.iterations(), Some(20_000));
/// ```
#[derive(Debug)]
pub struct EncryptionMetadata {
    algorithm: String,
    iterations: Option<u32>,
    salt: Option<Vec<u8>>,
    nonce: Option<Vec<u8>>,
    secret: KeySource,
}

impl EncryptionMetadata {
    /// Creates metadata for `secret` with the default algorithm.
    #[must_use]
    pub fn new(secret: KeySource) -> Self {
        Self {
            algorithm: Algorithm::default().id().to_string(),
            iterations: None,
            salt: None,
            nonce: None,
            secret,
        }
    }

    /// Creates password-path metadata.
    #[must_use]
    pub fn with_password(password: impl Into<String>) -> Self {
        Self::new(KeySource::password(password))
    }

    /// Creates derived-key metadata; iterations and salt come from the key.
    #[must_use]
    pub fn with_derived_key(key: DerivedKey) -> Self {
        Self::new(KeySource::DerivedKey(key))
    }

    /// Rebuilds metadata from a persisted snapshot plus the secret, which is
    /// never persisted.
    #[must_use]
    pub fn from_snapshot(snapshot: &MetadataSnapshot, secret: KeySource) -> Self {
        Self {
            algorithm: snapshot.algorithm.clone(),
            iterations: Some(snapshot.iterations),
            salt: snapshot.salt.clone(),
            nonce: snapshot.nonce.clone(),
            secret,
        }
    }

    /// Sets the algorithm identifier.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    /// Sets the PBKDF2 iteration count.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = Some(iterations);
        self
    }

    /// Sets the salt used on encryption.
    #[must_use]
    pub fn with_salt(mut self, salt: Vec<u8>) -> Self {
        self.salt = Some(salt);
        self
    }

    /// Sets the expected nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: Vec<u8>) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Returns the algorithm identifier as supplied.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Returns the explicit iteration count, if any.
    #[must_use]
    pub const fn iterations(&self) -> Option<u32> {
        self.iterations
    }

    /// Returns the explicit salt, if any.
    #[must_use]
    pub fn salt(&self) -> Option<&[u8]> {
        self.salt.as_deref()
    }

    /// Returns the expected nonce, if any.
    #[must_use]
    pub fn nonce(&self) -> Option<&[u8]> {
        self.nonce.as_deref()
    }

    /// Returns the key source.
    #[must_use]
    pub const fn secret(&self) -> &KeySource {
        &self.secret
    }

    /// Iteration count in effect: explicit, then the derived key's, then the
    /// policy default.
    #[must_use]
    pub fn effective_iterations(&self, policy: &EncryptionPolicy) -> u32 {
        match (&self.secret, self.iterations) {
            (_, Some(iterations)) => iterations,
            (KeySource::DerivedKey(key), None) => key.iterations(),
            (KeySource::Password(_), None) => policy.default_iterations,
        }
    }
}

/// Persistable part of the metadata. The secret is never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    /// Algorithm identifier.
    pub algorithm: String,
    /// PBKDF2 iteration count.
    pub iterations: u32,
    /// Salt, base64 on the wire.
    #[serde(default, with = "serde_base64::option", skip_serializing_if = "Option::is_none")]
    pub salt: Option<Vec<u8>>,
    /// Nonce, base64 on the wire.
    #[serde(default, with = "serde_base64::option", skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Vec<u8>>,
}

/// Result of [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// `true` when `errors` is empty.
    pub is_valid: bool,
    /// Problems that prevent use of the metadata.
    pub errors: Vec<String>,
    /// Problems that allow use but deserve attention.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Checks metadata against the algorithm set and `policy`.
///
/// With `ignore_nonce` the nonce is not inspected; otherwise it must be
/// present and exactly 12 bytes. Messages name parameters and lengths only,
/// never the password or key.
#[must_use]
pub fn validate(
    metadata: &EncryptionMetadata,
    policy: &EncryptionPolicy,
    ignore_nonce: bool,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    if Algorithm::from_id(&metadata.algorithm).is_none() {
        report.error(format!("unsupported algorithm '{}'", metadata.algorithm));
    }

    let iterations = metadata.effective_iterations(policy);
    if policy.check_iterations(iterations).is_err() {
        report.error(format!(
            "iteration count {iterations} outside {}..={}",
            policy.min_iterations, policy.max_iterations
        ));
    } else if iterations < policy.recommended_iterations {
        report.warn(format!(
            "iteration count {iterations} below recommended {}",
            policy.recommended_iterations
        ));
    }

    if let Some(salt) = metadata.salt() {
        if policy.check_salt_length(salt.len()).is_err() {
            report.error(format!(
                "salt length {} outside {}..={}",
                salt.len(),
                policy.min_salt_length,
                policy.max_salt_length
            ));
        }
    }

    match &metadata.secret {
        KeySource::Password(password) => {
            if password.expose_secret().is_empty() {
                report.error("password is empty");
            }
        }
        KeySource::DerivedKey(key) => {
            if policy.check_salt_length(key.salt().len()).is_err() {
                let len = key.salt().len();
                report.error(format!("derived key salt length {len} outside policy"));
            }
            if metadata.salt().is_some_and(|salt| salt != key.salt()) {
                report.error("salt does not match the derived key");
            }
            if metadata.iterations.is_some_and(|n| n != key.iterations()) {
                report.error("iteration count does not match the derived key");
            }
        }
    }

    if !ignore_nonce {
        match metadata.nonce() {
            None => report.error("nonce is missing"),
            Some(nonce) if nonce.len() != NONCE_SIZE => {
                report.error(format!("nonce must be {NONCE_SIZE} bytes, got {}", nonce.len()));
            }
            Some(_) => {}
        }
    }

    report.is_valid = report.errors.is_empty();
    report
}
