//! Error types for credential operations
//!
//! Component errors (`CipherError`, `StoreError`, `SignerError`) stay inside
//! the crate's orchestration layer. Callers of the issuer, refresher and
//! verifier only ever see one of the high-level [`Error`] kinds below.

use serde::Serialize;

/// Errors from issuing, refreshing or verifying a credential pair.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[error("credential issue failed: {0}")]
    CredentialIssue(String),

    #[error("credential persist failed: {0}")]
    CredentialPersist(String),

    #[error("credential refresh failed: {0}")]
    CredentialRefresh(String),

    #[error("credential verification failed: {0}")]
    CredentialVerify(String),
}

impl Error {
    /// HTTP-class status code for the transport layer to map onto a response.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::CredentialIssue(_) | Error::CredentialPersist(_) => 500,
            Error::CredentialRefresh(_) => 400,
            Error::CredentialVerify(_) => 401,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::CredentialIssue(_) => "issue",
            Error::CredentialPersist(_) => "persist",
            Error::CredentialRefresh(_) => "refresh",
            Error::CredentialVerify(_) => "verify",
        }
    }
}

/// Structured `{code, message}` form of an [`Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            code: err.status_code(),
            message: err.to_string(),
        }
    }
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
