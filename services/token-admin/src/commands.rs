//! Subcommand execution against the credential engine

use std::sync::Arc;

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bookstore_tokens::{
    Cipher, Claims, DiskSlotStore, Signer, SlotScope, SlotStore, TokenIssuer, TokenRefresher,
    TokenVerifier, Ttl,
};
use rand::RngExt;
use serde_json::Value;
use tracing::info;

use crate::config::{Config, Keys};
use crate::error::Error;

/// Length of a generated secret in bytes.
const KEY_LEN: usize = 32;

/// Issuer, refresher and verifier sharing one signer, cipher and store.
pub struct Engine {
    issuer: TokenIssuer,
    refresher: TokenRefresher,
    verifier: TokenVerifier,
    access_ttl: Ttl,
}

impl Engine {
    pub fn new(keys: Keys, store: Arc<dyn SlotStore>, access_ttl: Ttl) -> Self {
        let Keys { signing, cipher } = keys;
        let signer = Arc::new(Signer::new(&signing));
        let cipher = Arc::new(Cipher::new(cipher));
        Self {
            issuer: TokenIssuer::new(signer.clone(), cipher.clone(), store.clone()),
            refresher: TokenRefresher::new(signer.clone(), cipher.clone(), store.clone()),
            verifier: TokenVerifier::new(signer, cipher, store),
            access_ttl,
        }
    }

    /// Load the slot store named in `config` and wire the engine around it.
    pub async fn open(config: &Config, keys: Keys) -> Result<Self> {
        let store = DiskSlotStore::load(config.store.path.clone(), config.store.options())
            .await
            .with_context(|| {
                format!("failed to load slot store {}", config.store.path.display())
            })?;
        info!(
            path = %store.path().display(),
            entries = store.len().await,
            compress = config.store.compress,
            "slot store loaded"
        );
        Ok(Self::new(keys, Arc::new(store), config.token.access_ttl))
    }

    /// Issue a pair for `claims`, a JSON object.
    pub async fn issue(&self, scope: &SlotScope, claims: &str, ttl: Option<Ttl>) -> Result<Value> {
        let claims: Claims =
            serde_json::from_str(claims).map_err(|e| Error::InvalidClaims(e.to_string()))?;
        let pair = self
            .issuer
            .issue(scope, &claims, ttl.unwrap_or(self.access_ttl))
            .await?;
        Ok(serde_json::to_value(pair)?)
    }

    pub async fn refresh(&self, scope: &SlotScope, token: &str, ttl: Option<Ttl>) -> Result<Value> {
        let refreshed = self
            .refresher
            .refresh(scope, token, ttl.unwrap_or(self.access_ttl))
            .await?;
        Ok(serde_json::to_value(refreshed)?)
    }

    pub async fn verify(&self, scope: &SlotScope, token: Option<&str>) -> Result<Value> {
        let claims = self
            .verifier
            .verify(scope, token.unwrap_or_default())
            .await?;
        Ok(Value::Object(claims))
    }
}

/// Generate a random secret suitable for JWT_SECRET_KEY or CIPHER_SECRET_KEY.
pub fn keygen() -> String {
    let mut bytes = [0u8; KEY_LEN];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
