//! Liveness probe for stored access credentials

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::signer::Signer;

/// Outcome of probing the currently stored access credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Healthy,
    Unhealthy,
}

/// Decides rotate-or-reuse by verifying a plaintext credential.
///
/// Every verification failure, expiry included, becomes `Unhealthy`; the
/// caller only needs the decision, not the reason.
pub struct HealthChecker {
    signer: Arc<Signer>,
}

impl HealthChecker {
    pub fn new(signer: Arc<Signer>) -> Self {
        Self { signer }
    }

    pub fn is_healthy(&self, candidate: &str) -> bool {
        match self.signer.verify(candidate) {
            Ok(_) => true,
            Err(e) => {
                debug!(reason = %e, "credential failed health check");
                false
            }
        }
    }

    pub fn status(&self, candidate: &str) -> TokenStatus {
        if self.is_healthy(candidate) {
            TokenStatus::Healthy
        } else {
            TokenStatus::Unhealthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ttl::Ttl;
    use common::Secret;

    fn checker_and_signer() -> (HealthChecker, Arc<Signer>) {
        let signer = Arc::new(Signer::new(&Secret::new("jwt-key".to_owned())));
        (HealthChecker::new(signer.clone()), signer)
    }

    #[test]
    fn fresh_credential_is_healthy() {
        let (checker, signer) = checker_and_signer();
        let mut claims = crate::signer::Claims::new();
        claims.insert("sub".into(), "u1".into());
        let token = signer.mint(&claims, Ttl::minutes(5)).unwrap();
        assert!(checker.is_healthy(&token));
        assert_eq!(checker.status(&token), TokenStatus::Healthy);
    }

    #[test]
    fn failures_are_swallowed_into_unhealthy() {
        let (checker, _) = checker_and_signer();
        let foreign = Signer::new(&Secret::new("other-key".to_owned()))
            .mint(&crate::signer::Claims::new(), Ttl::minutes(5))
            .unwrap();
        assert!(!checker.is_healthy(&foreign));
        assert!(!checker.is_healthy(""));
        assert_eq!(checker.status("garbage"), TokenStatus::Unhealthy);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TokenStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }
}
