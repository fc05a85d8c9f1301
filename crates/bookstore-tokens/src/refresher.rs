//! Rotate-or-reuse refresh of the stored credential pair
//!
//! One call walks: fetch both slots (the refresh slot falls back to the
//! caller-supplied token) → decrypt → health-check the access credential →
//! either hand the existing pair back (`reused`) or mint, persist and return
//! a new pair carrying the old claims (`rotated`).

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cipher::Cipher;
use crate::constants::{ACCESS_TOKEN_SLOT, REFRESH_TOKEN_SLOT, ROUNDS};
use crate::error::{Error, Result};
use crate::health::{HealthChecker, TokenStatus};
use crate::issuer::{CredentialPair, TokenIssuer};
use crate::metrics;
use crate::signer::Signer;
use crate::store::{SlotScope, SlotStore};
use crate::ttl::Ttl;

/// Terminal outcome of a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    /// Access credential was unhealthy; a new pair was minted and stored.
    Rotated,
    /// Access credential was healthy; the stored pair was returned as-is.
    Reused,
}

impl RefreshStatus {
    pub fn label(self) -> &'static str {
        match self {
            RefreshStatus::Rotated => "rotated",
            RefreshStatus::Reused => "reused",
        }
    }
}

/// A credential pair tagged with how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshedPair {
    #[serde(flatten)]
    pub pair: CredentialPair,
    pub status: RefreshStatus,
}

pub struct TokenRefresher {
    signer: Arc<Signer>,
    cipher: Arc<Cipher>,
    store: Arc<dyn SlotStore>,
    health: HealthChecker,
    issuer: TokenIssuer,
}

impl TokenRefresher {
    pub fn new(signer: Arc<Signer>, cipher: Arc<Cipher>, store: Arc<dyn SlotStore>) -> Self {
        Self {
            health: HealthChecker::new(signer.clone()),
            issuer: TokenIssuer::new(signer.clone(), cipher.clone(), store.clone()),
            signer,
            cipher,
            store,
        }
    }

    /// Refresh the pair stored in `scope`.
    ///
    /// `provided_refresh` is used only when the store holds no refresh
    /// credential (cold store, eviction, another process). The reported
    /// expiry strings are nominal: `ttl` and 30 days, not time remaining.
    pub async fn refresh(
        &self,
        scope: &SlotScope,
        provided_refresh: &str,
        ttl: Ttl,
    ) -> Result<RefreshedPair> {
        let result = self.refresh_inner(scope, provided_refresh, ttl).await;
        match &result {
            Ok(refreshed) => {
                metrics::record_refreshed(refreshed.status.label());
                info!(
                    scope = scope.label(),
                    status = refreshed.status.label(),
                    "refreshed credential pair"
                );
            }
            Err(e) => {
                metrics::record_failure(e.kind());
                warn!(scope = scope.label(), error = %e, "credential refresh failed");
            }
        }
        result
    }

    async fn refresh_inner(
        &self,
        scope: &SlotScope,
        provided_refresh: &str,
        ttl: Ttl,
    ) -> Result<RefreshedPair> {
        let stored_access = self.store.get(&scope.key(ACCESS_TOKEN_SLOT)).await;
        let stored_refresh = match self.store.get(&scope.key(REFRESH_TOKEN_SLOT)).await {
            Some(value) => Some(value),
            None if !provided_refresh.trim().is_empty() => {
                debug!(scope = scope.label(), "no stored refresh token, using caller-supplied one");
                Some(provided_refresh.trim().to_owned())
            }
            None => None,
        };

        let (Some(enc_access), Some(enc_refresh)) = (stored_access, stored_refresh) else {
            return Err(Error::CredentialRefresh(format!(
                "{ACCESS_TOKEN_SLOT} and {REFRESH_TOKEN_SLOT} not available for scope {}",
                scope.label()
            )));
        };

        let plain_access = self
            .cipher
            .decrypt(&enc_access, ROUNDS)
            .map_err(|e| Error::CredentialRefresh(format!("decrypting {ACCESS_TOKEN_SLOT}: {e}")))?;
        let plain_refresh = self
            .cipher
            .decrypt(&enc_refresh, ROUNDS)
            .map_err(|e| Error::CredentialRefresh(format!("decrypting {REFRESH_TOKEN_SLOT}: {e}")))?;

        match self.health.status(&plain_access) {
            TokenStatus::Healthy => self.reuse(&plain_access, &plain_refresh, ttl),
            TokenStatus::Unhealthy => self.rotate(scope, &plain_access, &plain_refresh, ttl).await,
        }
    }

    fn reuse(&self, plain_access: &str, plain_refresh: &str, ttl: Ttl) -> Result<RefreshedPair> {
        let access = self
            .cipher
            .encrypt(plain_access, ROUNDS)
            .map_err(|e| Error::CredentialRefresh(format!("re-encrypting {ACCESS_TOKEN_SLOT}: {e}")))?;
        let refresh = self
            .cipher
            .encrypt(plain_refresh, ROUNDS)
            .map_err(|e| Error::CredentialRefresh(format!("re-encrypting {REFRESH_TOKEN_SLOT}: {e}")))?;

        Ok(RefreshedPair {
            pair: CredentialPair::new(access, refresh, ttl),
            status: RefreshStatus::Reused,
        })
    }

    async fn rotate(
        &self,
        scope: &SlotScope,
        plain_access: &str,
        plain_refresh: &str,
        ttl: Ttl,
    ) -> Result<RefreshedPair> {
        let access_claims = self
            .signer
            .decode_unsafe(plain_access)
            .map_err(|e| Error::CredentialRefresh(format!("reading {ACCESS_TOKEN_SLOT} claims: {e}")))?;
        let refresh_claims = self
            .signer
            .decode_unsafe(plain_refresh)
            .map_err(|e| Error::CredentialRefresh(format!("reading {REFRESH_TOKEN_SLOT} claims: {e}")))?;

        let pair = self
            .issuer
            .mint_and_store(scope, &access_claims, &refresh_claims, ttl)
            .await
            .map_err(|e| match e {
                Error::CredentialIssue(msg) => Error::CredentialRefresh(msg),
                other => other,
            })?;

        Ok(RefreshedPair {
            pair,
            status: RefreshStatus::Rotated,
        })
    }
}
