//! Environment-driven settings for the CLI.

use anyhow::{Context, Result};
use rowvault::policy::EncryptionPolicy;
use secrecy::SecretString;
use serde::Deserialize;

/// Settings read from `ROWVAULT_*` environment variables.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Password used when `--password` is not given.
    #[serde(default)]
    pub password: Option<SecretString>,

    /// PBKDF2 iteration count for new envelopes.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Salt length in bytes for new envelopes.
    #[serde(default = "default_salt_length")]
    pub salt_length: usize,

    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_iterations() -> u32 {
    EncryptionPolicy::default().default_iterations
}
fn default_salt_length() -> usize {
    EncryptionPolicy::default().default_salt_length
}
fn default_log_level() -> String {
    "warn".into()
}

impl Settings {
    /// Loads and validates settings from the environment.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("ROWVAULT"))
            .build()
            .context("failed to build rowvault configuration")?;

        let settings: Self = cfg
            .try_deserialize()
            .context("failed to deserialise rowvault configuration")?;

        settings.policy()?;
        Ok(settings)
    }

    /// Builds the process-wide policy, applying overrides from the command line.
    pub fn policy_with(
        &self,
        iterations: Option<u32>,
        salt_length: Option<usize>,
    ) -> Result<EncryptionPolicy> {
        let policy = EncryptionPolicy {
            default_iterations: iterations.unwrap_or(self.iterations),
            default_salt_length: salt_length.unwrap_or(self.salt_length),
            ..EncryptionPolicy::default()
        };
        policy.validate().context("invalid encryption settings")?;
        Ok(policy)
    }

    fn policy(&self) -> Result<EncryptionPolicy> {
        self.policy_with(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(iterations: u32, salt_length: usize) -> Settings {
        Settings { password: None, iterations, salt_length, log_level: "warn".into() }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(default_iterations(), 10_000);
        assert_eq!(default_salt_length(), 32);
        assert_eq!(default_log_level(), "warn");
    }

    #[test]
    fn test_policy_rejects_out_of_range_iterations() {
        assert!(settings(500, 32).policy().is_err());
        assert!(settings(200_000, 32).policy().is_err());
    }

    #[test]
    fn test_policy_rejects_out_of_range_salt() {
        assert!(settings(10_000, 4).policy().is_err());
        assert!(settings(10_000, 65).policy().is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let policy = settings(10_000, 32).policy_with(Some(20_000), Some(16)).unwrap();
        assert_eq!(policy.default_iterations, 20_000);
        assert_eq!(policy.default_salt_length, 16);
    }
}
