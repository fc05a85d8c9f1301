//! Signed, time-bounded credentials
//!
//! HS256 JWTs carrying the caller's claims plus the registered claims `aud`,
//! `iat`, `exp` and `jti`. The registered claims are owned by the signer:
//! they are stamped on mint and stripped from the claims handed back, so a
//! round trip returns exactly what the caller supplied.

use common::Secret;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde_json::Value;

use crate::constants::AUDIENCE;
use crate::ttl::Ttl;

/// Subject identity payload embedded in a credential.
pub type Claims = serde_json::Map<String, Value>;

const REGISTERED_CLAIMS: [&str; 4] = ["aud", "iat", "exp", "jti"];

/// Signing and verification failures.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("signature is invalid")]
    SignatureInvalid,

    #[error("credential has expired")]
    Expired,

    #[error("credential audience is not {AUDIENCE}")]
    AudienceMismatch,

    #[error("malformed credential: {0}")]
    Malformed(String),

    #[error("encoding credential failed: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for SignerError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => SignerError::SignatureInvalid,
            ErrorKind::ExpiredSignature => SignerError::Expired,
            ErrorKind::InvalidAudience => SignerError::AudienceMismatch,
            ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => {
                SignerError::AudienceMismatch
            }
            _ => SignerError::Malformed(e.to_string()),
        }
    }
}

/// Mints and verifies credentials under the process signing key.
pub struct Signer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    unverified: Validation,
}

impl Signer {
    pub fn new(secret: &Secret<String>) -> Self {
        let encoding_key = EncodingKey::from_secret(secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "aud"]);
        validation.validate_exp = true;
        validation.leeway = 0;

        let mut unverified = Validation::new(Algorithm::HS256);
        unverified.insecure_disable_signature_validation();
        unverified.validate_exp = false;
        unverified.validate_aud = false;
        unverified.required_spec_claims.clear();

        Self {
            encoding_key,
            decoding_key,
            validation,
            unverified,
        }
    }

    /// Sign `claims` with `exp = now + ttl` and the fixed audience.
    pub fn mint(&self, claims: &Claims, ttl: Ttl) -> Result<String, SignerError> {
        let issued_at = chrono::Utc::now().timestamp();
        let lifetime = i64::try_from(ttl.as_seconds()).unwrap_or(i64::MAX);

        let mut payload = claims.clone();
        payload.insert("aud".into(), Value::from(AUDIENCE));
        payload.insert("iat".into(), Value::from(issued_at));
        payload.insert("exp".into(), Value::from(issued_at.saturating_add(lifetime)));
        payload.insert("jti".into(), Value::from(uuid::Uuid::new_v4().to_string()));

        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(|e| SignerError::Encoding(e.to_string()))
    }

    /// Check signature, expiry and audience; return the caller's claims.
    pub fn verify(&self, credential: &str) -> Result<Claims, SignerError> {
        let data = decode::<Claims>(credential, &self.decoding_key, &self.validation)?;
        Ok(strip_registered(data.claims))
    }

    /// Read the caller's claims without checking signature or expiry.
    ///
    /// Only for carrying a payload forward into a freshly minted credential.
    pub fn decode_unsafe(&self, credential: &str) -> Result<Claims, SignerError> {
        let data = decode::<Claims>(credential, &self.decoding_key, &self.unverified)?;
        Ok(strip_registered(data.claims))
    }
}

fn strip_registered(mut claims: Claims) -> Claims {
    for name in REGISTERED_CLAIMS {
        claims.remove(name);
    }
    claims
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signer(key: &str) -> Signer {
        Signer::new(&Secret::new(key.to_owned()))
    }

    fn claims(value: Value) -> Claims {
        value.as_object().cloned().unwrap()
    }

    /// Raw payload including registered claims, signature unchecked.
    fn raw_payload(token: &str) -> Claims {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        decode::<Claims>(token, &DecodingKey::from_secret(b"unused"), &validation)
            .unwrap()
            .claims
    }

    fn forged(key: &str, payload: Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(key.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn verify_returns_minted_claims() {
        let s = signer("jwt-key");
        let c = claims(json!({"sub": "u1", "roles": ["admin"], "profile": {"tier": 2}}));
        let token = s.mint(&c, Ttl::days(7)).unwrap();
        assert_eq!(s.verify(&token).unwrap(), c);
    }

    #[test]
    fn mint_stamps_audience_and_expiry() {
        let s = signer("jwt-key");
        let token = s.mint(&claims(json!({"sub": "u1"})), Ttl::minutes(15)).unwrap();
        let raw = raw_payload(&token);
        assert_eq!(raw["aud"], AUDIENCE);
        let iat = raw["iat"].as_i64().unwrap();
        let exp = raw["exp"].as_i64().unwrap();
        assert_eq!(exp - iat, 900);
        assert!(raw["jti"].is_string());
    }

    #[test]
    fn registered_claims_from_caller_are_overwritten() {
        let s = signer("jwt-key");
        let c = claims(json!({"sub": "u1", "aud": "someone-else", "exp": 1}));
        let token = s.mint(&c, Ttl::days(1)).unwrap();
        assert_eq!(s.verify(&token).unwrap(), claims(json!({"sub": "u1"})));
    }

    #[test]
    fn each_mint_is_unique() {
        let s = signer("jwt-key");
        let c = claims(json!({"sub": "u1"}));
        assert_ne!(
            s.mint(&c, Ttl::days(1)).unwrap(),
            s.mint(&c, Ttl::days(1)).unwrap()
        );
    }

    #[tokio::test]
    async fn expired_after_ttl_elapses() {
        let s = signer("jwt-key");
        let token = s.mint(&claims(json!({"sub": "u1"})), Ttl::seconds(1)).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2100)).await;
        assert!(matches!(s.verify(&token), Err(SignerError::Expired)));
    }

    #[test]
    fn past_expiry_is_rejected() {
        let now = chrono::Utc::now().timestamp();
        let token = forged(
            "jwt-key",
            json!({"sub": "u1", "aud": AUDIENCE, "iat": now - 120, "exp": now - 60}),
        );
        assert!(matches!(signer("jwt-key").verify(&token), Err(SignerError::Expired)));
    }

    #[test]
    fn wrong_key_is_signature_invalid() {
        let token = signer("jwt-key")
            .mint(&claims(json!({"sub": "u1"})), Ttl::days(1))
            .unwrap();
        assert!(matches!(
            signer("other-key").verify(&token),
            Err(SignerError::SignatureInvalid)
        ));
    }

    #[test]
    fn wrong_or_missing_audience_is_rejected() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let wrong = forged("jwt-key", json!({"sub": "u1", "aud": "other-api", "exp": exp}));
        let missing = forged("jwt-key", json!({"sub": "u1", "exp": exp}));
        let s = signer("jwt-key");
        assert!(matches!(s.verify(&wrong), Err(SignerError::AudienceMismatch)));
        assert!(matches!(s.verify(&missing), Err(SignerError::AudienceMismatch)));
    }

    #[test]
    fn garbage_is_malformed() {
        let s = signer("jwt-key");
        assert!(matches!(s.verify("not-a-jwt"), Err(SignerError::Malformed(_))));
        assert!(matches!(s.decode_unsafe("not-a-jwt"), Err(SignerError::Malformed(_))));
    }

    #[test]
    fn decode_unsafe_reads_expired_and_foreign_credentials() {
        let now = chrono::Utc::now().timestamp();
        let token = forged(
            "someone-elses-key",
            json!({"sub": "u1", "aud": AUDIENCE, "iat": now - 120, "exp": now - 60}),
        );
        let decoded = signer("jwt-key").decode_unsafe(&token).unwrap();
        assert_eq!(decoded, claims(json!({"sub": "u1"})));
    }
}
