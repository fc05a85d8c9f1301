//! Bookstore token admin
//!
//! Operator binary over the bookstore-tokens engine:
//! 1. Resolves the config file and both secrets (fails fast on a missing key)
//! 2. Loads the disk slot store
//! 3. Runs one issue / refresh / verify command and prints its JSON result
//!
//! Logs go to stderr as JSON; results and error bodies go to stdout.

mod cli;
mod commands;
mod config;
mod error;

use std::process::ExitCode;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::commands::Engine;
use crate::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let result = match cli::parse_from(std::env::args_os()) {
        Ok(cli) => run(cli).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "command failed");
            let body = error::error_body(&err);
            match serde_json::to_string(&body) {
                Ok(json) => println!("{json}"),
                Err(_) => println!("{{\"code\":{},\"message\":\"internal error\"}}", body.code),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Value> {
    let scope = cli.slot_scope();
    match &cli.command {
        // keygen needs neither config nor keys
        Command::Keygen => Ok(Value::from(commands::keygen())),
        Command::Issue { claims, ttl } => open_engine(&cli).await?.issue(&scope, claims, *ttl).await,
        Command::Refresh { token, ttl } => {
            open_engine(&cli).await?.refresh(&scope, token, *ttl).await
        }
        Command::Verify { token } => open_engine(&cli).await?.verify(&scope, token.as_deref()).await,
    }
}

async fn open_engine(cli: &Cli) -> Result<Engine> {
    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let keys = config
        .token
        .resolve_keys()
        .context("failed to resolve key material")?;

    info!(
        store = %config.store.path.display(),
        access_ttl = %config.token.access_ttl,
        max_entries = config.store.max_entries,
        "configuration loaded"
    );

    Engine::open(&config, keys).await
}
