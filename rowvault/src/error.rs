//! Error types for `RowVault` operations.
//!
//! No variant carries a password, a key or a plaintext value. Messages name
//! fields, kinds and lengths only.

/// Main error type for `RowVault` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A salt, iteration count, nonce or key size violates policy
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Encryption metadata failed validation
    #[error("invalid metadata: {}", .0.join("; "))]
    InvalidMetadata(Vec<String>),

    /// Authentication tag verification failed (wrong password, tampering or corruption)
    #[error("authentication failed: wrong password or ciphertext corrupted or tampered")]
    AuthenticationFailed,

    /// Envelope is shorter than the smallest possible envelope
    #[error("envelope too short: {length} bytes (minimum: {minimum})")]
    TooShort {
        /// Length of the rejected envelope
        length: usize,
        /// Minimum envelope length
        minimum: usize,
    },

    /// A stored value cannot be coerced to the requested kind
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The requested kind
        expected: String,
        /// The kind (or literal shape) actually found
        found: String,
    },

    /// A type tag is not part of the closed scalar kind set
    #[error("unknown type tag: {0}")]
    UnknownTypeTag(String),

    /// One or more row fields could not be decoded and were replaced by null
    #[error(
        "partial row: {} field(s) substituted with null: {}",
        .fields.len(),
        .fields.join(", ")
    )]
    PartialRow {
        /// Names of the substituted fields
        fields: Vec<String>,
    },

    /// Encryption operation failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Key derivation failed
    #[error("key derivation failed")]
    KeyDerivation,

    /// Serialized document or transport encoding is malformed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Unsupported row format version
    #[error("unsupported version: {version} (supported: {supported})")]
    UnsupportedVersion {
        /// The version found in the payload
        version: u32,
        /// Supported versions
        supported: String,
    },
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        // serde_json reports positions and categories, never the input text.
        Self::Serialization(format!(
            "{} at line {} column {}",
            category(&err),
            err.line(),
            err.column()
        ))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Serialization(format!("invalid base64: {err}"))
    }
}

fn category(err: &serde_json::Error) -> &'static str {
    match err.classify() {
        serde_json::error::Category::Io => "I/O failure",
        serde_json::error::Category::Syntax => "malformed JSON",
        serde_json::error::Category::Data => "unexpected JSON shape",
        serde_json::error::Category::Eof => "truncated JSON",
    }
}

impl Error {
    /// Shorthand for a [`Error::TypeMismatch`].
    pub(crate) fn mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Self::TypeMismatch { expected: expected.to_string(), found: found.to_string() }
    }
}
