//! `RowVault` CLI: seal and open envelopes, encrypt and decrypt typed values
//! and rows, and validate metadata.

#![warn(clippy::pedantic, clippy::nursery)]

mod fields;
mod settings;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fields::FieldLiteral;
use rowvault::envelope::decode_base64;
use rowvault::prelude::*;
use secrecy::{ExposeSecret, SecretString};
use settings::Settings;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rowvault")]
#[command(about = "Password-based encryption of values and rows", long_about = None)]
struct Cli {
    /// Password (falls back to ROWVAULT_PASSWORD)
    #[arg(long, global = true, env = "ROWVAULT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// PBKDF2 iteration count for new envelopes
    #[arg(long, global = true)]
    iterations: Option<u32>,

    /// Salt length in bytes for new envelopes
    #[arg(long, global = true)]
    salt_length: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct TypeArgs {
    /// Scalar kind tag, e.g. `nvarchar`, `decimal`, `varbinary`
    #[arg(long = "type")]
    kind: ScalarKind,
    /// Declared length
    #[arg(long)]
    max_length: Option<u32>,
    /// Decimal precision
    #[arg(long, requires = "scale")]
    precision: Option<u8>,
    /// Decimal scale
    #[arg(long, requires = "precision")]
    scale: Option<u8>,
    /// Reject null values
    #[arg(long)]
    not_null: bool,
}

impl TypeArgs {
    fn descriptor(&self) -> TypeDescriptor {
        let mut descriptor = TypeDescriptor::new(self.kind);
        if let Some(max_length) = self.max_length {
            descriptor = descriptor.with_max_length(max_length);
        }
        if let (Some(precision), Some(scale)) = (self.precision, self.scale) {
            descriptor = descriptor.with_precision(precision, scale);
        }
        if self.not_null {
            descriptor = descriptor.not_null();
        }
        descriptor
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt raw text into a base64 envelope
    Seal {
        /// Text to encrypt (reads stdin when omitted)
        text: Option<String>,
    },
    /// Decrypt a base64 envelope back into raw bytes
    Open {
        /// Base64 envelope (reads stdin when omitted)
        envelope: Option<String>,
    },
    /// Encrypt one typed value into EncryptedValue JSON
    Encrypt {
        #[command(flatten)]
        type_args: TypeArgs,
        /// Invariant literal; omit for null
        value: Option<String>,
    },
    /// Decrypt EncryptedValue JSON and print the literal
    Decrypt {
        /// JSON file (reads stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Encrypt a JSON array of fields into EncryptedRow JSON
    EncryptRow {
        /// JSON file (reads stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Decrypt EncryptedRow JSON into a JSON array of fields
    DecryptRow {
        /// JSON file (reads stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Fail instead of substituting null for undecodable fields
        #[arg(long)]
        strict: bool,
    },
    /// Validate encryption metadata and print the report as JSON
    Validate {
        /// Algorithm identifier
        #[arg(long, default_value = "AES-256-GCM")]
        algorithm: String,
        /// Base64 salt
        #[arg(long)]
        salt: Option<String>,
        /// Base64 nonce
        #[arg(long)]
        nonce: Option<String>,
        /// Skip the nonce check
        #[arg(long)]
        ignore_nonce: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    init_tracing(&settings.log_level)?;

    let policy = settings.policy_with(cli.iterations, cli.salt_length)?;
    let engine = EncryptionEngine::new(policy).context("failed to create encryption engine")?;
    let password = cli
        .password
        .map(SecretString::new)
        .or(settings.password);

    match cli.command {
        Commands::Seal { text } => {
            let plaintext = match text {
                Some(text) => text.into_bytes(),
                None => read_input(None)?,
            };
            let sealed = engine.codec().seal_with_password(
                &plaintext,
                require(password.as_ref())?.expose_secret().as_bytes(),
                None,
                policy.default_iterations,
            )?;
            println!("{}", sealed.to_base64());
        }
        Commands::Open { envelope } => {
            let text = match envelope {
                Some(text) => text,
                None => String::from_utf8(read_input(None)?).context("envelope is not UTF-8")?,
            };
            let bytes = decode_base64(&text).context("envelope is not valid base64")?;
            let plaintext = engine.codec().open_with_password(
                &bytes,
                require(password.as_ref())?.expose_secret().as_bytes(),
                policy.default_iterations,
            )?;
            std::io::stdout().write_all(&plaintext).context("failed to write plaintext")?;
        }
        Commands::Encrypt { type_args, value } => {
            let descriptor = type_args.descriptor();
            let value = fields::parse_value(&descriptor, value.as_deref())?;
            let metadata = password_metadata(password, cli.iterations)?;
            let encrypted = engine.encrypt_value(&ScalarValue::new(descriptor, value), &metadata)?;
            print_json(&encrypted)?;
        }
        Commands::Decrypt { input } => {
            let encrypted: EncryptedValue = serde_json::from_slice(&read_input(input.as_deref())?)
                .context("expected EncryptedValue JSON")?;
            let metadata = password_metadata(password, cli.iterations)?;
            let value = engine.decrypt_value(&encrypted, &metadata)?;
            print_json(&serde_json::json!({
                "type": encrypted.descriptor.kind,
                "value": value.to_literal(),
            }))?;
        }
        Commands::EncryptRow { input } => {
            let fields = fields::parse_fields(&read_input(input.as_deref())?)?;
            let metadata = password_metadata(password, cli.iterations)?;
            print_json(&engine.encrypt_row(&fields, &metadata)?)?;
        }
        Commands::DecryptRow { input, strict } => {
            let encrypted: EncryptedRow = serde_json::from_slice(&read_input(input.as_deref())?)
                .context("expected EncryptedRow JSON")?;
            let metadata = password_metadata(password, cli.iterations)?;
            let decrypted = engine.decrypt_row(&encrypted, &metadata)?;
            for warning in &decrypted.warnings {
                tracing::warn!(%warning, "field substituted with null");
            }
            let fields = if strict { decrypted.into_strict()? } else { decrypted.fields };
            let literals: Vec<_> = fields.iter().map(FieldLiteral::from_field).collect();
            print_json(&literals)?;
        }
        Commands::Validate { algorithm, salt, nonce, ignore_nonce } => {
            let mut metadata =
                password_metadata(password, cli.iterations)?.with_algorithm(algorithm);
            if let Some(salt) = salt {
                let salt = decode_base64(&salt).context("salt is not base64")?;
                metadata = metadata.with_salt(salt);
            }
            if let Some(nonce) = nonce {
                let nonce = decode_base64(&nonce).context("nonce is not base64")?;
                metadata = metadata.with_nonce(nonce);
            }
            let report = engine.validate_metadata(&metadata, ignore_nonce);
            print_json(&report)?;
            if !report.is_valid {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(log_level: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialise tracing subscriber: {err}"))
}

fn require(password: Option<&SecretString>) -> Result<&SecretString> {
    match password {
        Some(password) => Ok(password),
        None => bail!("a password is required (--password or ROWVAULT_PASSWORD)"),
    }
}

fn password_metadata(
    password: Option<SecretString>,
    iterations: Option<u32>,
) -> Result<EncryptionMetadata> {
    let Some(password) = password else {
        bail!("a password is required (--password or ROWVAULT_PASSWORD)");
    };
    let metadata = EncryptionMetadata::new(KeySource::Password(password));
    Ok(match iterations {
        Some(iterations) => metadata.with_iterations(iterations),
        None => metadata,
    })
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf).context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialise output")?;
    println!("{json}");
    Ok(())
}
