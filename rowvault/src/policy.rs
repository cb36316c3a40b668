//! Process-wide encryption policy.
//!
//! The policy is built once at startup and copied into each component. It is
//! never mutated afterwards, so it can be shared freely across threads.

use crate::error::Error;
use serde::Deserialize;
use std::ops::RangeInclusive;

/// Smallest salt length the envelope format can carry.
pub const ENVELOPE_MIN_SALT: usize = 8;

/// Largest salt length the envelope format can carry.
pub const ENVELOPE_MAX_SALT: usize = 64;

/// Bounds and defaults applied to key derivation and envelope construction.
///
/// # Example
///
/// ```
/// use rowvault::policy::EncryptionPolicy;
///
/// let policy = EncryptionPolicy::default();
/// assert!(policy.iteration_range().contains(&10_000));
/// assert_eq!(policy.default_salt_length, 32);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EncryptionPolicy {
    /// Lowest accepted PBKDF2 iteration count.
    pub min_iterations: u32,
    /// Highest accepted PBKDF2 iteration count.
    pub max_iterations: u32,
    /// Iteration count used when metadata does not name one.
    pub default_iterations: u32,
    /// Iteration counts below this value pass validation with a warning.
    pub recommended_iterations: u32,
    /// Shortest accepted salt in bytes.
    pub min_salt_length: usize,
    /// Longest accepted salt in bytes.
    pub max_salt_length: usize,
    /// Salt length generated when metadata does not supply a salt.
    pub default_salt_length: usize,
}

impl Default for EncryptionPolicy {
    fn default() -> Self {
        Self {
            min_iterations: 1_000,
            max_iterations: 100_000,
            default_iterations: 10_000,
            recommended_iterations: 10_000,
            min_salt_length: ENVELOPE_MIN_SALT,
            max_salt_length: ENVELOPE_MAX_SALT,
            default_salt_length: 32,
        }
    }
}

impl EncryptionPolicy {
    /// Accepted iteration counts.
    #[must_use]
    pub const fn iteration_range(&self) -> RangeInclusive<u32> {
        self.min_iterations..=self.max_iterations
    }

    /// Accepted salt lengths, which are also the candidates probed on decrypt.
    #[must_use]
    pub const fn salt_range(&self) -> RangeInclusive<usize> {
        self.min_salt_length..=self.max_salt_length
    }

    /// Checks that the bounds are self-consistent and inside the envelope limits.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` describing the first inconsistency.
    pub fn validate(&self) -> Result<(), Error> {
        if self.min_iterations == 0 || self.min_iterations > self.max_iterations {
            return Err(Error::InvalidParameter(format!(
                "iteration bounds {}..={} are inconsistent",
                self.min_iterations, self.max_iterations
            )));
        }
        if !self.iteration_range().contains(&self.default_iterations) {
            return Err(Error::InvalidParameter(format!(
                "default iterations {} outside {}..={}",
                self.default_iterations, self.min_iterations, self.max_iterations
            )));
        }
        if self.min_salt_length < ENVELOPE_MIN_SALT
            || self.max_salt_length > ENVELOPE_MAX_SALT
            || self.min_salt_length > self.max_salt_length
        {
            return Err(Error::InvalidParameter(format!(
                "salt bounds {}..={} must lie within {ENVELOPE_MIN_SALT}..={ENVELOPE_MAX_SALT}",
                self.min_salt_length, self.max_salt_length
            )));
        }
        if !self.salt_range().contains(&self.default_salt_length) {
            return Err(Error::InvalidParameter(format!(
                "default salt length {} outside {}..={}",
                self.default_salt_length, self.min_salt_length, self.max_salt_length
            )));
        }
        Ok(())
    }

    /// Rejects iteration counts outside the policy range.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` when `iterations` is out of range.
    pub fn check_iterations(&self, iterations: u32) -> Result<(), Error> {
        if self.iteration_range().contains(&iterations) {
            Ok(())
        } else {
            Err(Error::InvalidParameter(format!(
                "iteration count {iterations} outside {}..={}",
                self.min_iterations, self.max_iterations
            )))
        }
    }

    /// Rejects salt lengths outside the policy range.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` when `length` is out of range.
    pub fn check_salt_length(&self, length: usize) -> Result<(), Error> {
        if self.salt_range().contains(&length) {
            Ok(())
        } else {
            Err(Error::InvalidParameter(format!(
                "salt length {length} outside {}..={}",
                self.min_salt_length, self.max_salt_length
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        EncryptionPolicy::default().validate().expect("default policy must validate");
    }

    #[test]
    fn test_default_salt_range_covers_57_lengths() {
        assert_eq!(EncryptionPolicy::default().salt_range().count(), 57);
    }

    #[test]
    fn test_inverted_iteration_bounds_rejected() {
        let policy =
            EncryptionPolicy { min_iterations: 5_000, max_iterations: 1_000, ..Default::default() };
        assert!(matches!(policy.validate(), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_salt_bounds_outside_envelope_rejected() {
        let policy = EncryptionPolicy { max_salt_length: 65, ..Default::default() };
        assert!(matches!(policy.validate(), Err(Error::InvalidParameter(_))));

        let policy = EncryptionPolicy { min_salt_length: 4, ..Default::default() };
        assert!(matches!(policy.validate(), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_check_iterations_bounds() {
        let policy = EncryptionPolicy::default();
        assert!(policy.check_iterations(1_000).is_ok());
        assert!(policy.check_iterations(100_000).is_ok());
        assert!(policy.check_iterations(999).is_err());
        assert!(policy.check_iterations(100_001).is_err());
    }

    #[test]
    fn test_deserialize_partial_overrides_defaults() {
        let policy: EncryptionPolicy =
            serde_json::from_str(r#"{"default_iterations": 20000}"#).expect("valid policy JSON");
        assert_eq!(policy.default_iterations, 20_000);
        assert_eq!(policy.min_iterations, 1_000);
        assert_eq!(policy.default_salt_length, 32);
    }
}
