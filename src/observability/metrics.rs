//! Metrics emission.
//!
//! # Metrics
//! - `rpc_calls_total` (counter): remote calls by function and outcome
//! - `rpc_call_duration_seconds` (histogram): call latency by function
//! - `auth_verifications_total` (counter): envelope checks by outcome
//! - `chain_transactions_total` (counter): submissions by outcome
//!
//! # Design Decisions
//! - The library only emits through the `metrics` facade; the embedding
//!   application decides whether a recorder (e.g. Prometheus) is installed
//! - Label values are low-cardinality strings chosen by this crate

use std::time::Duration;

/// Record the outcome of a remote call.
pub fn record_rpc_call(function: &str, outcome: &'static str, elapsed: Duration) {
    metrics::counter!(
        "rpc_calls_total",
        "fn" => function.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("rpc_call_duration_seconds", "fn" => function.to_string())
        .record(elapsed.as_secs_f64());
}

/// Record an envelope verification outcome.
pub fn record_auth_verification(outcome: &'static str) {
    metrics::counter!("auth_verifications_total", "outcome" => outcome).increment(1);
}

/// Record how a chain transaction settled.
pub fn record_transaction(outcome: &'static str) {
    metrics::counter!("chain_transactions_total", "outcome" => outcome).increment(1);
}
