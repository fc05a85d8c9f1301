//! Credential lifecycle metrics
//!
//! - `credentials_issued_total` (counter)
//! - `credentials_refreshed_total` (counter): label `outcome` = rotated | reused
//! - `credential_failures_total` (counter): label `kind` = issue | persist | refresh | verify
//!
//! Calls are no-ops until the embedding process installs a recorder.

pub fn record_issued() {
    metrics::counter!("credentials_issued_total").increment(1);
}

pub fn record_refreshed(outcome: &'static str) {
    metrics::counter!("credentials_refreshed_total", "outcome" => outcome).increment(1);
}

pub fn record_failure(kind: &'static str) {
    metrics::counter!("credential_failures_total", "kind" => kind).increment(1);
}
