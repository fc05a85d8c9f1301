//! Command-line interface

use std::ffi::OsString;

use bookstore_tokens::{SlotScope, Ttl};
use clap::builder::NonEmptyStringValueParser;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};

use crate::error::{Error, Result};

#[derive(Debug, Parser)]
#[command(
    name = "bookstore-token-admin",
    version,
    about = "Issue, refresh and verify bookstore API credentials"
)]
pub struct Cli {
    /// Config file path (falls back to CONFIG_PATH, then bookstore-tokens.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Subject id whose own slot pair is used instead of the global one
    #[arg(long, global = true, value_parser = NonEmptyStringValueParser::new())]
    pub scope: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Issue a new credential pair for a JSON object of claims
    Issue {
        claims: String,
        /// Access token lifetime, e.g. 7d, 15m, 30s
        #[arg(long, value_parser = parse_ttl)]
        ttl: Option<Ttl>,
    },
    /// Reuse or rotate the stored pair
    Refresh {
        /// Encrypted refresh token, used when none is stored
        token: String,
        /// Access token lifetime for a rotated pair, e.g. 7d
        #[arg(long, value_parser = parse_ttl)]
        ttl: Option<Ttl>,
    },
    /// Verify the stored access token and print its claims
    Verify {
        /// Encrypted access token, used when none is stored
        token: Option<String>,
    },
    /// Print a random 32-byte key for JWT_SECRET_KEY or CIPHER_SECRET_KEY
    Keygen,
}

impl Cli {
    pub fn slot_scope(&self) -> SlotScope {
        match &self.scope {
            Some(id) => SlotScope::Subject(id.clone()),
            None => SlotScope::Global,
        }
    }
}

/// Parse `args` (program name first). Help and version requests print and
/// exit; any other parse failure becomes [`Error::Usage`].
pub fn parse_from<I, T>(args: I) -> Result<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args).map_err(|e| match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
        _ => Error::Usage(e.to_string().trim_end().to_owned()),
    })
}

fn parse_ttl(expr: &str) -> std::result::Result<Ttl, String> {
    let ttl: Ttl = expr.parse().map_err(|e| format!("{e}"))?;
    if ttl.value == 0 {
        return Err("ttl must be greater than 0".into());
    }
    Ok(ttl)
}
