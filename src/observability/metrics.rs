//! Metrics collection.
//!
//! # Metrics
//! - `dedup_requests_total` (counter): submissions by outcome
//!   (`admitted`, `duplicate`, `bypassed`, `invalid`)
//! - `dedup_settled_total` (counter): settled calls by result
//!   (`completed`, `failed`, `cancelled`)
//! - `dedup_request_duration_seconds` (histogram): submit-to-settle latency
//! - `dedup_expired_total` (counter): entries freed by the expiry timer
//! - `dedup_cancelled_total` (counter): calls aborted by `cancel_all_pending`
//! - `dedup_pending_entries` (gauge): current registry size
//!
//! Recorded through the `metrics` facade; the embedding application decides
//! whether a recorder/exporter is installed.

use std::time::Instant;

use metrics::{counter, gauge, histogram};

pub fn record_submission(outcome: &'static str) {
    counter!("dedup_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_settled(result: &'static str, start: Instant) {
    counter!("dedup_settled_total", "result" => result).increment(1);
    histogram!("dedup_request_duration_seconds", "result" => result)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_expired() {
    counter!("dedup_expired_total").increment(1);
}

pub fn record_cancelled(count: usize) {
    counter!("dedup_cancelled_total").increment(count as u64);
}

pub fn record_pending(len: usize) {
    gauge!("dedup_pending_entries").set(len as f64);
}
