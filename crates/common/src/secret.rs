//! Secret wrapper for signing and cipher keys

use std::fmt;
use std::path::Path;

use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Sensitive value - redacted in Debug/Display/logs, zeroed on drop
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Resolve a key from `env_var`, falling back to the contents of `file`.
    ///
    /// The env var wins when set. Surrounding whitespace is trimmed and an
    /// empty result is an error: signing under a known-empty key is never
    /// acceptable, so startup fails instead.
    pub fn resolve(
        env_var: &'static str,
        file_key: &'static str,
        file: Option<&Path>,
    ) -> Result<Self> {
        let raw = match std::env::var(env_var) {
            Ok(value) => value,
            Err(_) => match file {
                Some(path) => std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("failed to read {file_key} {}: {e}", path.display()))
                })?,
                None => String::new(),
            },
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::MissingSecret { env_var, file_key });
        }
        Ok(Self::new(trimmed.to_owned()))
    }

    /// Key material as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}
