//! Minting and persisting credential pairs

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::cipher::Cipher;
use crate::constants::{ACCESS_TOKEN_SLOT, REFRESH_TOKEN_SLOT, ROUNDS};
use crate::error::{Error, Result};
use crate::metrics;
use crate::signer::{Claims, Signer};
use crate::store::{SlotScope, SlotStore};
use crate::ttl::Ttl;

/// Encrypted access/refresh credentials with their nominal lifetimes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expired: String,
    pub refresh_token_expired: String,
}

impl CredentialPair {
    pub(crate) fn new(access_token: String, refresh_token: String, ttl: Ttl) -> Self {
        Self {
            access_token,
            refresh_token,
            access_token_expired: ttl.describe(),
            refresh_token_expired: Ttl::REFRESH.describe(),
        }
    }
}

/// Issues fresh credential pairs and writes them to the slot store.
pub struct TokenIssuer {
    signer: Arc<Signer>,
    cipher: Arc<Cipher>,
    store: Arc<dyn SlotStore>,
}

impl TokenIssuer {
    pub fn new(signer: Arc<Signer>, cipher: Arc<Cipher>, store: Arc<dyn SlotStore>) -> Self {
        Self {
            signer,
            cipher,
            store,
        }
    }

    /// Mint an access credential with `ttl` and a 30-day refresh credential
    /// for `claims`, encrypt both and persist them in `scope`.
    ///
    /// Either both slots were written and the pair is returned, or an error
    /// is; a pair is never returned after a failed write.
    pub async fn issue(&self, scope: &SlotScope, claims: &Claims, ttl: Ttl) -> Result<CredentialPair> {
        let result = self.mint_and_store(scope, claims, claims, ttl).await;
        match &result {
            Ok(_) => {
                metrics::record_issued();
                info!(scope = scope.label(), ttl = %ttl, "issued credential pair");
            }
            Err(e) => {
                metrics::record_failure(e.kind());
                warn!(scope = scope.label(), error = %e, "credential issue failed");
            }
        }
        result
    }

    /// Shared by issue and rotation: the access and refresh credentials may
    /// carry different claims when carried forward from an older pair.
    pub(crate) async fn mint_and_store(
        &self,
        scope: &SlotScope,
        access_claims: &Claims,
        refresh_claims: &Claims,
        ttl: Ttl,
    ) -> Result<CredentialPair> {
        let access = self
            .signer
            .mint(access_claims, ttl)
            .map_err(|e| Error::CredentialIssue(format!("signing access token: {e}")))?;
        let refresh = self
            .signer
            .mint(refresh_claims, Ttl::REFRESH)
            .map_err(|e| Error::CredentialIssue(format!("signing refresh token: {e}")))?;

        let enc_access = self
            .cipher
            .encrypt(&access, ROUNDS)
            .map_err(|e| Error::CredentialIssue(format!("encrypting access token: {e}")))?;
        let enc_refresh = self
            .cipher
            .encrypt(&refresh, ROUNDS)
            .map_err(|e| Error::CredentialIssue(format!("encrypting refresh token: {e}")))?;

        self.store
            .set(&scope.key(ACCESS_TOKEN_SLOT), enc_access.clone())
            .await
            .map_err(|e| Error::CredentialPersist(format!("storing {ACCESS_TOKEN_SLOT}: {e}")))?;
        if let Err(e) = self
            .store
            .set(&scope.key(REFRESH_TOKEN_SLOT), enc_refresh.clone())
            .await
        {
            warn!(
                scope = scope.label(),
                "{ACCESS_TOKEN_SLOT} written but {REFRESH_TOKEN_SLOT} failed, slots now disagree"
            );
            return Err(Error::CredentialPersist(format!(
                "storing {REFRESH_TOKEN_SLOT}: {e}"
            )));
        }

        Ok(CredentialPair::new(enc_access, enc_refresh, ttl))
    }
}
