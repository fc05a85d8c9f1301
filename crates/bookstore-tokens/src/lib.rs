//! Credential minting and rotation for the bookstore API
//!
//! Issues short-lived access / 30-day refresh credential pairs, keeps them
//! encrypted in a disk-backed slot store, and refreshes them with a
//! rotate-or-reuse decision driven by a liveness check. Consumers of
//! authenticated requests use [`TokenVerifier`]; the HTTP mapping of errors
//! lives with the transport layer via [`ErrorBody`].
//!
//! Credential flow:
//! 1. `TokenIssuer::issue()` signs both credentials, encrypts them and
//!    writes the `accessToken` / `refreshToken` slots
//! 2. `TokenVerifier::verify()` admits requests carrying a valid access token
//! 3. `TokenRefresher::refresh()` reuses a healthy pair or rotates an
//!    expired one, preserving its claims
//!
//! Components are wired by composition: each orchestrator holds `Arc`s to a
//! [`Signer`], a [`Cipher`] and a [`SlotStore`].

pub mod cipher;
pub mod constants;
pub mod error;
pub mod health;
pub mod issuer;
pub mod metrics;
pub mod refresher;
pub mod signer;
pub mod store;
pub mod ttl;
pub mod verifier;

pub use cipher::{Cipher, CipherError};
pub use constants::*;
pub use error::{Error, ErrorBody, Result};
pub use health::{HealthChecker, TokenStatus};
pub use issuer::{CredentialPair, TokenIssuer};
pub use refresher::{RefreshStatus, RefreshedPair, TokenRefresher};
pub use signer::{Claims, Signer, SignerError};
pub use store::{DiskSlotStore, SlotScope, SlotStore, StoreError, StoreOptions};
pub use ttl::{Ttl, TtlParseError, TtlUnit};
pub use verifier::TokenVerifier;
