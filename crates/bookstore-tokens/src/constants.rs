//! Fixed token parameters
//!
//! These are wire-visible: changing any of them invalidates every credential
//! already handed out or persisted.

/// Audience stamped into every signed credential and required on verify.
pub const AUDIENCE: &str = "book-store-api";

/// Cipher cost factor applied to every credential at rest.
pub const ROUNDS: u32 = 20;

/// Store record holding the encrypted access credential.
pub const ACCESS_TOKEN_SLOT: &str = "accessToken";

/// Store record holding the encrypted refresh credential.
pub const REFRESH_TOKEN_SLOT: &str = "refreshToken";

/// Lifetime of every refresh credential, in days. Not configurable.
pub const REFRESH_TTL_DAYS: u64 = 30;
