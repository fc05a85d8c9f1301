//! Service-specific error types

use bookstore_tokens::ErrorBody;
use thiserror::Error;

/// Operator input errors, rejected before any credential work starts.
#[derive(Error, Debug)]
pub enum Error {
    #[error("usage: {0}")]
    Usage(String),

    #[error("claims must be a JSON object: {0}")]
    InvalidClaims(String),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;

/// Map any failure reaching the process boundary onto the `{code, message}`
/// body printed to stdout.
///
/// Credential errors keep their own status code, operator input errors are
/// 400 and everything else (config, key material, store load) is 500.
pub fn error_body(err: &anyhow::Error) -> ErrorBody {
    if let Some(e) = err.downcast_ref::<bookstore_tokens::Error>() {
        return ErrorBody::from(e);
    }
    let code = if err.downcast_ref::<Error>().is_some() {
        400
    } else {
        500
    };
    ErrorBody {
        code,
        message: format!("{err:#}"),
    }
}
