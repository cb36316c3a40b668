//! # `RowVault`
//!
//! Password-based authenticated encryption for single values and whole rows,
//! with a schema-preserving value codec.
//!
//! ## Features
//!
//! - Self-describing `salt || nonce || ciphertext || tag` envelopes (AES-256-GCM)
//! - PBKDF2-HMAC-SHA-256 key derivation with policy-bounded parameters
//! - Salt length resolved on decrypt by bounded trial decryption
//! - Exact round trip of 23 scalar kinds, keeping null, empty, padding and
//!   binary content distinct
//! - One envelope per row; undecodable fields come back as null with a warning
//! - Derive-once key handles and batch operations
//!
//! ## Example
//!
//! ```
//! use rowvault::prelude::*;
//!
//! let engine = EncryptionEngine::new(EncryptionPolicy::default())?;
//! let metadata = EncryptionMetadata::with_password("P@ss1").with_iterations(1_000);
//!
//! let fields = vec![
//!     Field::new("id", TypeDescriptor::new(ScalarKind::Int).not_null(), Value::Int(7)),
//!     Field::new("note", TypeDescriptor::new(ScalarKind::NVarChar), Value::Null),
//! ];
//! let encrypted = engine.encrypt_row(&fields, &metadata)?;
//! let decrypted = engine.decrypt_row(&encrypted, &metadata)?;
//!
//! assert_eq!(decrypted.into_strict()?, fields);
//! # Ok::<(), rowvault::error::Error>(())
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod aead;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod metadata;
pub mod policy;
pub mod row;
pub mod types;
pub mod value;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::aead::{AeadProvider, AesGcmProvider};
    pub use crate::engine::{EncryptedRow, EncryptedValue, EncryptionEngine};
    pub use crate::envelope::{EnvelopeCodec, SealedEnvelope};
    pub use crate::error::Error;
    pub use crate::kdf::DerivedKey;
    pub use crate::metadata::{EncryptionMetadata, KeySource, MetadataSnapshot, ValidationReport};
    pub use crate::policy::EncryptionPolicy;
    pub use crate::row::{DecryptedRow, Field, FieldSchema, FieldWarning};
    pub use crate::types::{ScalarKind, ScalarValue, TypeDescriptor, Value};
}
