//! High-level encryption of single values and whole rows.
//!
//! The engine validates metadata, drives the value and row codecs and hands
//! the resulting plaintext to the envelope codec. It holds no mutable state;
//! one instance can be shared across threads.

use crate::aead::{AeadProvider, AesGcmProvider};
use crate::envelope::{serde_base64, EnvelopeCodec, KeyCache, SealedEnvelope};
use crate::error::Error;
use crate::kdf::DerivedKey;
use crate::metadata::{
    self, Algorithm, EncryptionMetadata, KeySource, MetadataSnapshot, ValidationReport,
};
use crate::policy::EncryptionPolicy;
use crate::row::{self, DecryptedRow, Field, FieldSchema, ROW_FORMAT_VERSION};
use crate::types::{ScalarValue, TypeDescriptor, Value};
use crate::value;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// An encrypted scalar with the type attributes needed to rebuild it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    /// Type attributes of the plaintext value.
    pub descriptor: TypeDescriptor,
    /// Parameters the envelope was sealed with.
    pub metadata: MetadataSnapshot,
    /// `salt || nonce || ciphertext || tag`, base64 on the wire.
    #[serde(with = "serde_base64")]
    pub envelope: Vec<u8>,
}

/// A row encrypted under a single envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRow {
    /// Row format version.
    pub format_version: u32,
    /// Field names, positions and types.
    pub schema: Vec<FieldSchema>,
    /// Parameters the envelope was sealed with.
    pub metadata: MetadataSnapshot,
    /// Envelope around the serialized fields, base64 on the wire.
    #[serde(with = "serde_base64")]
    pub payload: Vec<u8>,
    /// When the row was encrypted.
    pub encrypted_at: DateTime<Utc>,
}

/// Encryption engine for values and rows.
///
/// # Example
///
/// ```
/// use rowvault::prelude::*;
///
/// let engine = EncryptionEngine::new(EncryptionPolicy::default())?;
/// let metadata = EncryptionMetadata::with_password("P@ss1").with_iterations(1_000);
///
/// let scalar = ScalarValue::new(
///     TypeDescriptor::new(ScalarKind::Char).with_max_length(5),
///     Value::Text("AB".into()),
/// );
/// let encrypted = engine.encrypt_value(&scalar, &metadata)?;
/// let decrypted = engine.decrypt_value(&encrypted, &metadata)?;
///
/// assert_eq!(decrypted, Value::Text("AB   ".into()));
/// # Ok::<(), rowvault::error::Error>(())
/// ```
pub struct EncryptionEngine<A: AeadProvider = AesGcmProvider> {
    codec: EnvelopeCodec<A>,
}

impl EncryptionEngine<AesGcmProvider> {
    /// Creates an engine using AES-256-GCM.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `policy` is inconsistent.
    pub fn new(policy: EncryptionPolicy) -> Result<Self, Error> {
        Self::with_provider(AesGcmProvider, policy)
    }
}

impl<A: AeadProvider> EncryptionEngine<A> {
    /// Creates an engine with a custom AEAD provider.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `policy` is inconsistent.
    pub fn with_provider(aead: A, policy: EncryptionPolicy) -> Result<Self, Error> {
        policy.validate()?;
        Ok(Self { codec: EnvelopeCodec::with_provider(aead, policy) })
    }

    /// Returns the policy this engine enforces.
    #[must_use]
    pub const fn policy(&self) -> &EncryptionPolicy {
        self.codec.policy()
    }

    /// Returns the underlying envelope codec.
    #[must_use]
    pub const fn codec(&self) -> &EnvelopeCodec<A> {
        &self.codec
    }

    /// Derives a reusable key from a password.
    ///
    /// A random salt of the policy default length is generated when `salt` is
    /// `None`; the policy default iteration count is used when `iterations` is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if the salt or iteration count is
    /// outside the policy.
    pub fn derive_key(
        &self,
        password: &str,
        salt: Option<&[u8]>,
        iterations: Option<u32>,
    ) -> Result<DerivedKey, Error> {
        let salt = match salt {
            Some(salt) => salt.to_vec(),
            None => self.codec.kdf().generate_salt(self.policy().default_salt_length)?,
        };
        let iterations = iterations.unwrap_or(self.policy().default_iterations);
        self.codec.kdf().derive_key(password.as_bytes(), &salt, iterations)
    }

    /// Validates metadata against the algorithm set and this engine's policy.
    #[must_use]
    pub fn validate_metadata(
        &self,
        metadata: &EncryptionMetadata,
        ignore_nonce: bool,
    ) -> ValidationReport {
        metadata::validate(metadata, self.policy(), ignore_nonce)
    }

    /// Encrypts one value.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidMetadata` for invalid metadata, the value codec's
    /// errors for a value that violates its descriptor, and any envelope error.
    pub fn encrypt_value(
        &self,
        scalar: &ScalarValue,
        metadata: &EncryptionMetadata,
    ) -> Result<EncryptedValue, Error> {
        self.ensure_valid(metadata, true)?;
        let plaintext = value::to_plaintext(&value::encode(scalar)?)?;
        let (sealed, snapshot) = self.seal(&plaintext, metadata)?;

        Ok(EncryptedValue {
            descriptor: scalar.descriptor.clone(),
            metadata: snapshot,
            envelope: sealed.into_bytes(),
        })
    }

    /// Decrypts one value.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidMetadata` for invalid metadata,
    /// `Error::AuthenticationFailed` for a wrong password or tampered envelope,
    /// and `Error::TypeMismatch` if the carried descriptor differs from the one
    /// sealed with the value.
    pub fn decrypt_value(
        &self,
        encrypted: &EncryptedValue,
        metadata: &EncryptionMetadata,
    ) -> Result<Value, Error> {
        self.ensure_valid(metadata, metadata.nonce().is_none())?;
        let plaintext = self.open(&encrypted.envelope, &encrypted.metadata, metadata, None)?;
        Self::decode_value(&plaintext, &encrypted.descriptor)
    }

    /// Encrypts a row of fields under one envelope.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidMetadata` for invalid metadata,
    /// `Error::InvalidParameter` for empty or duplicate field names, and any
    /// value or envelope error. A value error aborts the whole row.
    pub fn encrypt_row(
        &self,
        fields: &[Field],
        metadata: &EncryptionMetadata,
    ) -> Result<EncryptedRow, Error> {
        self.ensure_valid(metadata, true)?;
        let (schema, plaintext) = row::encode_fields(fields)?;
        let (sealed, snapshot) = self.seal(&plaintext, metadata)?;

        tracing::debug!(fields = schema.len(), "row encrypted");
        Ok(EncryptedRow {
            format_version: ROW_FORMAT_VERSION,
            schema,
            metadata: snapshot,
            payload: sealed.into_bytes(),
            encrypted_at: Utc::now(),
        })
    }

    /// Decrypts a row. Fields that fail to decode are returned as null and
    /// listed in [`DecryptedRow::warnings`].
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedVersion` for an unknown row format,
    /// `Error::InvalidMetadata` for invalid metadata and
    /// `Error::AuthenticationFailed` for a wrong password or tampered payload.
    pub fn decrypt_row(
        &self,
        encrypted: &EncryptedRow,
        metadata: &EncryptionMetadata,
    ) -> Result<DecryptedRow, Error> {
        self.ensure_valid(metadata, metadata.nonce().is_none())?;
        self.decrypt_row_with(encrypted, metadata, None)
    }

    /// Encrypts many values, deriving the key once for the whole batch.
    ///
    /// Every item is sealed with its own fresh nonce. Items fail
    /// independently; the outer error covers only metadata and key derivation.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidMetadata` for invalid metadata and
    /// `Error::InvalidParameter` if the key cannot be derived.
    pub fn encrypt_values(
        &self,
        scalars: &[ScalarValue],
        metadata: &EncryptionMetadata,
    ) -> Result<Vec<Result<EncryptedValue, Error>>, Error> {
        self.ensure_valid(metadata, true)?;
        let owned;
        let key = match metadata.secret() {
            KeySource::DerivedKey(key) => key,
            KeySource::Password(password) => {
                owned = self.batch_key(password.expose_secret(), metadata)?;
                &owned
            }
        };

        let results: Vec<_> = scalars
            .iter()
            .map(|scalar| {
                let plaintext = value::to_plaintext(&value::encode(scalar)?)?;
                let sealed = self.codec.seal_with_key(&plaintext, key)?;
                Ok(EncryptedValue {
                    descriptor: scalar.descriptor.clone(),
                    metadata: Self::snapshot(metadata, &sealed, key.iterations()),
                    envelope: sealed.into_bytes(),
                })
            })
            .collect();

        log_batch("encrypt_values", &results);
        Ok(results)
    }

    /// Decrypts many values. Keys derived for one item are reused for later
    /// items with the same salt and iteration count, within this call only.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidMetadata` for invalid metadata. Per-item failures
    /// are reported in the returned vector.
    pub fn decrypt_values(
        &self,
        items: &[EncryptedValue],
        metadata: &EncryptionMetadata,
    ) -> Result<Vec<Result<Value, Error>>, Error> {
        self.ensure_valid(metadata, metadata.nonce().is_none())?;
        let mut cache = KeyCache::default();

        let results: Vec<_> = items
            .iter()
            .map(|item| {
                let plaintext =
                    self.open(&item.envelope, &item.metadata, metadata, Some(&mut cache))?;
                Self::decode_value(&plaintext, &item.descriptor)
            })
            .collect();

        log_batch("decrypt_values", &results);
        Ok(results)
    }

    /// Encrypts many rows, deriving the key once for the whole batch.
    ///
    /// # Errors
    ///
    /// See [`EncryptionEngine::encrypt_values`].
    pub fn encrypt_rows(
        &self,
        rows: &[Vec<Field>],
        metadata: &EncryptionMetadata,
    ) -> Result<Vec<Result<EncryptedRow, Error>>, Error> {
        self.ensure_valid(metadata, true)?;
        let owned;
        let key = match metadata.secret() {
            KeySource::DerivedKey(key) => key,
            KeySource::Password(password) => {
                owned = self.batch_key(password.expose_secret(), metadata)?;
                &owned
            }
        };

        let results: Vec<_> = rows
            .iter()
            .map(|fields| {
                let (schema, plaintext) = row::encode_fields(fields)?;
                let sealed = self.codec.seal_with_key(&plaintext, key)?;
                Ok(EncryptedRow {
                    format_version: ROW_FORMAT_VERSION,
                    schema,
                    metadata: Self::snapshot(metadata, &sealed, key.iterations()),
                    payload: sealed.into_bytes(),
                    encrypted_at: Utc::now(),
                })
            })
            .collect();

        log_batch("encrypt_rows", &results);
        Ok(results)
    }

    /// Decrypts many rows with a call-local key cache.
    ///
    /// # Errors
    ///
    /// See [`EncryptionEngine::decrypt_values`].
    pub fn decrypt_rows(
        &self,
        rows: &[EncryptedRow],
        metadata: &EncryptionMetadata,
    ) -> Result<Vec<Result<DecryptedRow, Error>>, Error> {
        self.ensure_valid(metadata, metadata.nonce().is_none())?;
        let mut cache = KeyCache::default();

        let results: Vec<_> = rows
            .iter()
            .map(|encrypted| self.decrypt_row_with(encrypted, metadata, Some(&mut cache)))
            .collect();

        log_batch("decrypt_rows", &results);
        Ok(results)
    }

    fn ensure_valid(
        &self,
        metadata: &EncryptionMetadata,
        ignore_nonce: bool,
    ) -> Result<(), Error> {
        let report = self.validate_metadata(metadata, ignore_nonce);
        for warning in &report.warnings {
            tracing::debug!(%warning, "metadata warning");
        }
        if report.is_valid {
            Ok(())
        } else {
            Err(Error::InvalidMetadata(report.errors))
        }
    }

    fn batch_key(
        &self,
        password: &str,
        metadata: &EncryptionMetadata,
    ) -> Result<DerivedKey, Error> {
        let iterations = metadata.effective_iterations(self.policy());
        self.derive_key(password, metadata.salt(), Some(iterations))
    }

    fn seal(
        &self,
        plaintext: &[u8],
        metadata: &EncryptionMetadata,
    ) -> Result<(SealedEnvelope, MetadataSnapshot), Error> {
        let iterations = metadata.effective_iterations(self.policy());
        let sealed = match metadata.secret() {
            KeySource::Password(password) => self.codec.seal_with_password(
                plaintext,
                password.expose_secret().as_bytes(),
                metadata.salt(),
                iterations,
            )?,
            KeySource::DerivedKey(key) => self.codec.seal_with_key(plaintext, key)?,
        };
        let snapshot = Self::snapshot(metadata, &sealed, iterations);
        Ok((sealed, snapshot))
    }

    fn snapshot(
        metadata: &EncryptionMetadata,
        sealed: &SealedEnvelope,
        iterations: u32,
    ) -> MetadataSnapshot {
        let algorithm = Algorithm::from_id(metadata.algorithm()).unwrap_or_default();
        MetadataSnapshot {
            algorithm: algorithm.id().to_string(),
            iterations,
            salt: Some(sealed.salt().to_vec()),
            nonce: Some(sealed.nonce().to_vec()),
        }
    }

    fn open(
        &self,
        envelope: &[u8],
        stored: &MetadataSnapshot,
        metadata: &EncryptionMetadata,
        cache: Option<&mut KeyCache>,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        if Algorithm::from_id(&stored.algorithm).is_none() {
            return Err(Error::InvalidMetadata(vec![format!(
                "unsupported algorithm '{}'",
                stored.algorithm
            )]));
        }

        match metadata.secret() {
            KeySource::Password(password) => {
                let password = password.expose_secret().as_bytes();
                let iterations = metadata.iterations().unwrap_or(stored.iterations);
                match cache {
                    Some(cache) => {
                        self.codec.open_with_password_cached(envelope, password, iterations, cache)
                    }
                    None => self.codec.open_with_password(envelope, password, iterations),
                }
            }
            KeySource::DerivedKey(key) => self.codec.open_with_key(envelope, key),
        }
    }

    fn decrypt_row_with(
        &self,
        encrypted: &EncryptedRow,
        metadata: &EncryptionMetadata,
        cache: Option<&mut KeyCache>,
    ) -> Result<DecryptedRow, Error> {
        if encrypted.format_version != ROW_FORMAT_VERSION {
            return Err(Error::UnsupportedVersion {
                version: encrypted.format_version,
                supported: ROW_FORMAT_VERSION.to_string(),
            });
        }

        let plaintext = self.open(&encrypted.payload, &encrypted.metadata, metadata, cache)?;
        let decrypted = row::decode_fields(&encrypted.schema, &plaintext)?;
        if !decrypted.is_complete() {
            tracing::debug!(
                fields = decrypted.fields.len(),
                substituted = decrypted.warnings.len(),
                "row decrypted with null substitutions"
            );
        }
        Ok(decrypted)
    }

    fn decode_value(plaintext: &[u8], descriptor: &TypeDescriptor) -> Result<Value, Error> {
        let encoded = value::from_plaintext(plaintext)?;
        value::decode_exact(&encoded, descriptor)
    }
}

impl<A: AeadProvider> Clone for EncryptionEngine<A> {
    fn clone(&self) -> Self {
        Self { codec: self.codec.clone() }
    }
}

fn log_batch<T>(operation: &str, results: &[Result<T, Error>]) {
    let failed = results.iter().filter(|result| result.is_err()).count();
    tracing::debug!(operation, items = results.len(), failed, "batch finished");
}
