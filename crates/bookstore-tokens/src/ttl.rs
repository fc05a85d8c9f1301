//! Credential lifetimes
//!
//! A TTL is a value plus one of three units. The signer turns it into an
//! absolute `exp` claim; the issuer turns it into the human-readable expiry
//! string reported alongside each credential pair.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::REFRESH_TTL_DAYS;

/// Unit of a [`Ttl`]. Serialized as `days`, `minute`, `second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlUnit {
    Days,
    Minute,
    Second,
}

impl TtlUnit {
    /// Single-letter suffix used in duration expressions (`7d`, `15m`, `30s`).
    pub fn suffix(self) -> char {
        match self {
            TtlUnit::Days => 'd',
            TtlUnit::Minute => 'm',
            TtlUnit::Second => 's',
        }
    }

    fn seconds(self) -> u64 {
        match self {
            TtlUnit::Days => 86_400,
            TtlUnit::Minute => 60,
            TtlUnit::Second => 1,
        }
    }

    fn label(self, value: u64) -> &'static str {
        match (self, value == 1) {
            (TtlUnit::Days, true) => "Day",
            (TtlUnit::Days, false) => "Days",
            (TtlUnit::Minute, true) => "Minute",
            (TtlUnit::Minute, false) => "Minutes",
            (TtlUnit::Second, true) => "Second",
            (TtlUnit::Second, false) => "Seconds",
        }
    }
}

/// Time-to-live of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ttl {
    pub value: u64,
    pub unit: TtlUnit,
}

impl Ttl {
    /// Lifetime of every refresh credential.
    pub const REFRESH: Ttl = Ttl::days(REFRESH_TTL_DAYS);

    pub const fn new(value: u64, unit: TtlUnit) -> Self {
        Self { value, unit }
    }

    pub const fn days(value: u64) -> Self {
        Self::new(value, TtlUnit::Days)
    }

    pub const fn minutes(value: u64) -> Self {
        Self::new(value, TtlUnit::Minute)
    }

    pub const fn seconds(value: u64) -> Self {
        Self::new(value, TtlUnit::Second)
    }

    /// Total length in seconds (saturating).
    pub fn as_seconds(&self) -> u64 {
        self.value.saturating_mul(self.unit.seconds())
    }

    /// Compact duration expression, e.g. `7d`.
    pub fn expression(&self) -> String {
        format!("{}{}", self.value, self.unit.suffix())
    }

    /// Human-readable form reported to callers, e.g. `7 Days`.
    pub fn describe(&self) -> String {
        format!("{} {}", self.value, self.unit.label(self.value))
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression())
    }
}

/// Rejected duration expression.
#[derive(Debug, thiserror::Error)]
#[error("invalid ttl expression {0:?}: expected <number><d|m|s>, e.g. 7d")]
pub struct TtlParseError(String);

impl FromStr for Ttl {
    type Err = TtlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || TtlParseError(s.to_owned());

        let suffix = s.chars().last().ok_or_else(err)?;
        let unit = match suffix {
            'd' => TtlUnit::Days,
            'm' => TtlUnit::Minute,
            's' => TtlUnit::Second,
            _ => return Err(err()),
        };
        let value = s[..s.len() - 1].parse::<u64>().map_err(|_| err())?;
        Ok(Ttl::new(value, unit))
    }
}
