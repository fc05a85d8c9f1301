//! Admission check for access credentials
//!
//! Unlike the health probe, verification is a gate: it returns the subject's
//! claims or a `CredentialVerify` error that the transport layer maps to 401.

use std::sync::Arc;

use tracing::debug;

use crate::cipher::Cipher;
use crate::constants::{ACCESS_TOKEN_SLOT, ROUNDS};
use crate::error::{Error, Result};
use crate::metrics;
use crate::signer::{Claims, Signer};
use crate::store::{SlotScope, SlotStore};

pub struct TokenVerifier {
    signer: Arc<Signer>,
    cipher: Arc<Cipher>,
    store: Arc<dyn SlotStore>,
}

impl TokenVerifier {
    pub fn new(signer: Arc<Signer>, cipher: Arc<Cipher>, store: Arc<dyn SlotStore>) -> Self {
        Self {
            signer,
            cipher,
            store,
        }
    }

    /// Verify the access credential stored in `scope`, or `provided_access`
    /// when the scope has none, and return its claims.
    pub async fn verify(&self, scope: &SlotScope, provided_access: &str) -> Result<Claims> {
        let result = self.verify_inner(scope, provided_access).await;
        if let Err(e) = &result {
            metrics::record_failure(e.kind());
            debug!(scope = scope.label(), error = %e, "access token rejected");
        }
        result
    }

    async fn verify_inner(&self, scope: &SlotScope, provided_access: &str) -> Result<Claims> {
        let sealed = match self.store.get(&scope.key(ACCESS_TOKEN_SLOT)).await {
            Some(value) => value,
            None if !provided_access.trim().is_empty() => provided_access.trim().to_owned(),
            None => {
                return Err(Error::CredentialVerify(format!(
                    "no {ACCESS_TOKEN_SLOT} stored or supplied"
                )));
            }
        };

        let plain = self
            .cipher
            .decrypt(&sealed, ROUNDS)
            .map_err(|_| Error::CredentialVerify("access token expired or invalid".into()))?;
        self.signer
            .verify(&plain)
            .map_err(|_| Error::CredentialVerify("access token expired or invalid".into()))
    }
}
