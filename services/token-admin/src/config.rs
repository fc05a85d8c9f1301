//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The signing and cipher keys come from JWT_SECRET_KEY / CIPHER_SECRET_KEY
//! or from the files named in `[token]`, never from the TOML directly.

use bookstore_tokens::{StoreOptions, Ttl};
use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const SIGNING_KEY_ENV: &str = "JWT_SECRET_KEY";
pub const CIPHER_KEY_ENV: &str = "CIPHER_SECRET_KEY";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub token: TokenConfig,
}

/// Slot store settings
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
    #[serde(default = "default_compress")]
    pub compress: bool,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

/// Credential settings
#[derive(Debug, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_access_ttl")]
    pub access_ttl: Ttl,
    /// Path to a file holding the signing key (alternative to JWT_SECRET_KEY)
    pub signing_key_file: Option<PathBuf>,
    /// Path to a file holding the cipher key (alternative to CIPHER_SECRET_KEY)
    pub cipher_key_file: Option<PathBuf>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl: default_access_ttl(),
            signing_key_file: None,
            cipher_key_file: None,
        }
    }
}

/// Process-wide key material, resolved once at startup.
pub struct Keys {
    pub signing: Secret<String>,
    pub cipher: Secret<String>,
}

fn default_compress() -> bool {
    true
}

fn default_max_entries() -> usize {
    StoreOptions::default().max_entries
}

fn default_access_ttl() -> Ttl {
    Ttl::days(7)
}

impl StoreConfig {
    pub fn options(&self) -> StoreOptions {
        StoreOptions {
            compress: self.compress,
            max_entries: self.max_entries,
        }
    }
}

impl TokenConfig {
    /// Resolve both keys: env var first, then the configured file.
    ///
    /// A missing or blank key is an error, so the process never signs or
    /// encrypts under an empty secret.
    pub fn resolve_keys(&self) -> common::Result<Keys> {
        Ok(Keys {
            signing: Secret::resolve(
                SIGNING_KEY_ENV,
                "signing_key_file",
                self.signing_key_file.as_deref(),
            )?,
            cipher: Secret::resolve(
                CIPHER_KEY_ENV,
                "cipher_key_file",
                self.cipher_key_file.as_deref(),
            )?,
        })
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        if config.store.path.as_os_str().is_empty() {
            return Err(common::Error::Config("store.path must not be empty".into()));
        }

        if config.store.max_entries == 0 {
            return Err(common::Error::Config(
                "max_entries must be greater than 0".into(),
            ));
        }

        if config.token.access_ttl.value == 0 {
            return Err(common::Error::Config(
                "access_ttl.value must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("bookstore-tokens.toml")
    }
}
