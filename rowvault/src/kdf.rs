//! Password-based key derivation using PBKDF2-HMAC-SHA-256.
//!
//! Derivation is deterministic: the same password, salt and iteration count
//! always produce the same key, which lets callers derive once and reuse the
//! result through a [`DerivedKey`].

use crate::error::Error;
use crate::policy::EncryptionPolicy;
use aes_gcm::aead::{rand_core::RngCore, OsRng};
use hmac::Hmac;
use secrecy::{ExposeSecret, SecretVec};
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

/// Symmetric key size in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// PBKDF2 key derivation bounded by an [`EncryptionPolicy`].
///
/// # Example
///
/// ```
/// use rowvault::kdf::{KeyDerivation, KEY_SIZE};
/// use rowvault::policy::EncryptionPolicy;
/// use secrecy::ExposeSecret;
///
/// let kdf = KeyDerivation::new(EncryptionPolicy::default());
/// let key = kdf.derive(b"P@ss1", &[7u8; 16], 1_000, KEY_SIZE).expect("derivation failed");
/// assert_eq!(key.expose_secret().len(), KEY_SIZE);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct KeyDerivation {
    policy: EncryptionPolicy,
}

impl KeyDerivation {
    /// Creates a key derivation function enforcing `policy`.
    #[must_use]
    pub const fn new(policy: EncryptionPolicy) -> Self {
        Self { policy }
    }

    /// Returns the enforced policy.
    #[must_use]
    pub const fn policy(&self) -> &EncryptionPolicy {
        &self.policy
    }

    /// Derives `output_len` bytes of key material from a password.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if the salt length or iteration count
    /// is outside the policy, or if `output_len` is zero. Returns
    /// `Error::KeyDerivation` if the PRF rejects its inputs.
    pub fn derive(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        output_len: usize,
    ) -> Result<SecretVec<u8>, Error> {
        self.policy.check_salt_length(salt.len())?;
        self.policy.check_iterations(iterations)?;
        if output_len == 0 {
            return Err(Error::InvalidParameter("output length must be non-zero".to_string()));
        }

        tracing::trace!(iterations, salt_len = salt.len(), "deriving key");

        let mut key = Zeroizing::new(vec![0u8; output_len]);
        pbkdf2_into(password, salt, iterations, &mut key)?;
        // Moves the allocation; no unzeroized copy is left behind.
        Ok(SecretVec::new(std::mem::take(&mut *key)))
    }

    /// Derives a [`KEY_SIZE`]-byte key and bundles it with its salt.
    ///
    /// # Errors
    ///
    /// See [`KeyDerivation::derive`].
    pub fn derive_key(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
    ) -> Result<DerivedKey, Error> {
        let key = self.derive(password, salt, iterations, KEY_SIZE)?;
        Ok(DerivedKey { key, salt: salt.to_vec(), iterations })
    }

    /// Generates a random salt of `length` bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `length` is outside the policy.
    pub fn generate_salt(&self, length: usize) -> Result<Vec<u8>, Error> {
        self.policy.check_salt_length(length)?;
        let mut salt = vec![0u8; length];
        OsRng.fill_bytes(&mut salt);
        Ok(salt)
    }
}

fn pbkdf2_into(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    out: &mut [u8],
) -> Result<(), Error> {
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, out)
        .map_err(|_| Error::KeyDerivation)
}

/// A key derived once by the caller and reused across many operations.
///
/// The key bytes are zeroized when the handle is dropped. The salt is carried
/// so envelopes sealed with this key stay in the password-path wire format.
pub struct DerivedKey {
    key: SecretVec<u8>,
    salt: Vec<u8>,
    iterations: u32,
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .field("salt_len", &self.salt.len())
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl DerivedKey {
    /// Wraps externally derived key material.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if the key is not [`KEY_SIZE`] bytes.
    pub fn from_parts(key: SecretVec<u8>, salt: Vec<u8>, iterations: u32) -> Result<Self, Error> {
        if key.expose_secret().len() != KEY_SIZE {
            return Err(Error::InvalidParameter(format!(
                "derived key must be {KEY_SIZE} bytes, got {}",
                key.expose_secret().len()
            )));
        }
        Ok(Self { key, salt, iterations })
    }

    /// Returns the key material.
    #[must_use]
    pub fn key(&self) -> &SecretVec<u8> {
        &self.key
    }

    /// Returns the salt the key was derived with.
    #[must_use]
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Returns the iteration count the key was derived with.
    #[must_use]
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kdf() -> KeyDerivation {
        KeyDerivation::new(EncryptionPolicy::default())
    }

    #[test]
    fn test_derive_deterministic() {
        let salt = [9u8; 16];
        let key1 = kdf().derive(b"P@ss1", &salt, 1_000, KEY_SIZE).expect("derivation failed");
        let key2 = kdf().derive(b"P@ss1", &salt, 1_000, KEY_SIZE).expect("derivation failed");

        assert_eq!(key1.expose_secret(), key2.expose_secret());
    }

    #[test]
    fn test_derive_different_salts() {
        let key1 = kdf().derive(b"P@ss1", &[1u8; 16], 1_000, KEY_SIZE).unwrap();
        let key2 = kdf().derive(b"P@ss1", &[2u8; 16], 1_000, KEY_SIZE).unwrap();

        assert_ne!(key1.expose_secret(), key2.expose_secret());
    }

    #[test]
    fn test_derive_different_passwords() {
        let salt = [3u8; 32];
        let key1 = kdf().derive(b"P@ss1", &salt, 1_000, KEY_SIZE).unwrap();
        let key2 = kdf().derive(b"wrong", &salt, 1_000, KEY_SIZE).unwrap();

        assert_ne!(key1.expose_secret(), key2.expose_secret());
    }

    #[test]
    fn test_derive_rejects_out_of_policy_salt() {
        assert!(matches!(
            kdf().derive(b"pw", &[0u8; 7], 1_000, KEY_SIZE),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            kdf().derive(b"pw", &[0u8; 65], 1_000, KEY_SIZE),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_derive_rejects_out_of_policy_iterations() {
        assert!(matches!(
            kdf().derive(b"pw", &[0u8; 16], 999, KEY_SIZE),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            kdf().derive(b"pw", &[0u8; 16], 100_001, KEY_SIZE),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_derive_rejects_zero_output() {
        assert!(kdf().derive(b"pw", &[0u8; 16], 1_000, 0).is_err());
    }

    #[test]
    fn test_generate_salt() {
        let salt1 = kdf().generate_salt(32).expect("salt generation failed");
        let salt2 = kdf().generate_salt(32).expect("salt generation failed");

        assert_eq!(salt1.len(), 32);
        assert_ne!(salt1, salt2);
        assert!(kdf().generate_salt(4).is_err());
    }

    #[test]
    fn test_derived_key_from_parts_checks_length() {
        let short = SecretVec::new(vec![0u8; 16]);
        assert!(DerivedKey::from_parts(short, vec![0u8; 16], 1_000).is_err());

        let ok = SecretVec::new(vec![0u8; KEY_SIZE]);
        let handle = DerivedKey::from_parts(ok, vec![1u8; 16], 1_000).expect("valid key");
        assert_eq!(handle.salt(), &[1u8; 16]);
        assert_eq!(handle.iterations(), 1_000);
    }

    #[test]
    fn test_derived_key_debug_hides_key() {
        let key = kdf().derive_key(b"P@ss1", &[9u8; 16], 1_000).expect("derivation failed");
        let debug = format!("{key:?}");

        assert!(debug.contains("salt_len: 16"));
        assert!(debug.contains("iterations: 1000"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(&format!("{:?}", key.key().expose_secret())));
    }

    // Known-answer vectors for PBKDF2-HMAC-SHA256.
    #[test]
    fn test_pbkdf2_sha256_single_iteration_vector() {
        const EXPECTED_HEX: &str =
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b";

        let mut out = [0u8; 32];
        pbkdf2_into(b"password", b"salt", 1, &mut out).expect("PBKDF2 failed");

        assert_eq!(out.as_slice(), hex::decode(EXPECTED_HEX).unwrap().as_slice());
    }

    #[test]
    fn test_pbkdf2_sha256_long_salt_vector() {
        const EXPECTED_HEX: &str =
            "348c89dbcbd32b2f32d814b8116e84cf2b17347ebc1800181c4e2a1fb8dd53e1c635518c7dac47e9";

        let key = kdf()
            .derive(
                b"passwordPASSWORDpassword",
                b"saltSALTsaltSALTsaltSALTsaltSALTsalt",
                4096,
                40,
            )
            .expect("derivation failed");

        assert_eq!(key.expose_secret().as_slice(), hex::decode(EXPECTED_HEX).unwrap().as_slice());
    }
}
