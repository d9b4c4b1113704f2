// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Process-wide Prometheus metric instruments.
//!
//! Mirrors `dashflow-streaming::metrics_utils`'s safe-registration pattern:
//! duplicate registration (e.g. two ingesters sharing this process) logs and
//! reuses the existing metric instead of panicking, since the upstream
//! `prometheus` registration macros panic on `AlreadyReg` and that is not an
//! acceptable failure mode for a long-running ingest process.

use prometheus::{Gauge, GaugeVec, IntCounter, IntCounterVec, Opts};
use std::sync::LazyLock;
use tracing::{debug, warn};

fn register_counter(name: &str, help: &str) -> IntCounter {
    let metric = match IntCounter::new(name, help) {
        Ok(m) => m,
        Err(e) => {
            warn!(metric = name, error = %e, "failed to construct counter");
            IntCounter::new(format!("{name}_invalid"), help)
                .expect("fallback counter name is always valid")
        }
    };
    match prometheus::default_registry().register(Box::new(metric.clone())) {
        Ok(()) => {}
        Err(prometheus::Error::AlreadyReg) => {
            debug!(metric = name, "counter already registered; reusing");
        }
        Err(e) => warn!(metric = name, error = %e, "counter registration failed"),
    }
    metric
}

fn register_counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let opts = Opts::new(name, help);
    let metric = match IntCounterVec::new(opts, labels) {
        Ok(m) => m,
        Err(e) => {
            warn!(metric = name, error = %e, "failed to construct counter vec");
            IntCounterVec::new(Opts::new(format!("{name}_invalid"), help), labels)
                .expect("fallback counter vec name is always valid")
        }
    };
    match prometheus::default_registry().register(Box::new(metric.clone())) {
        Ok(()) => {}
        Err(prometheus::Error::AlreadyReg) => {
            debug!(metric = name, "counter vec already registered; reusing");
        }
        Err(e) => warn!(metric = name, error = %e, "counter vec registration failed"),
    }
    metric
}

fn register_gauge_vec(name: &str, help: &str, labels: &[&str]) -> GaugeVec {
    let opts = Opts::new(name, help);
    let metric = match GaugeVec::new(opts, labels) {
        Ok(m) => m,
        Err(e) => {
            warn!(metric = name, error = %e, "failed to construct gauge vec");
            GaugeVec::new(Opts::new(format!("{name}_invalid"), help), labels)
                .expect("fallback gauge vec name is always valid")
        }
    };
    match prometheus::default_registry().register(Box::new(metric.clone())) {
        Ok(()) => {}
        Err(prometheus::Error::AlreadyReg) => {
            debug!(metric = name, "gauge vec already registered; reusing");
        }
        Err(e) => warn!(metric = name, error = %e, "gauge vec registration failed"),
    }
    metric
}

/// Number of broker entries successfully decoded, labeled by `{subject}`.
pub static PARSE_COUNT: LazyLock<IntCounterVec> =
    LazyLock::new(|| register_counter_vec("parse_count", "entries successfully decoded", &["subject"]));

/// Number of broker entries that failed to decode, labeled by `{subject}`.
pub static PARSE_ERRORS_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_counter_vec(
        "parse_errors_count",
        "entries that failed protobuf decoding",
        &["subject"],
    )
});

/// Number of entries read off the broker into the entry channel.
pub static ENTRIES_READ: LazyLock<IntCounterVec> =
    LazyLock::new(|| register_counter_vec("entries_read", "entries read from the broker", &["subject"]));

/// Number of rows flushed to the database across all batches.
pub static ENTRIES_SAVED: LazyLock<IntCounterVec> =
    LazyLock::new(|| register_counter_vec("entries_saved", "rows flushed to the database", &["subject"]));

/// Latest broker offset read per `{topic, partition, client_id}`.
pub static OFFSET_READ: LazyLock<GaugeVec> = LazyLock::new(|| {
    register_gauge_vec(
        "entries_kafka_offset_read",
        "latest broker offset read",
        &["topic", "partition", "client_id"],
    )
});

/// Latest broker offset committed per `{topic, partition, client_id}`.
pub static OFFSET_COMMITTED: LazyLock<GaugeVec> = LazyLock::new(|| {
    register_gauge_vec(
        "entries_kafka_offset_committed",
        "latest broker offset committed after a successful flush",
        &["topic", "partition", "client_id"],
    )
});

/// Number of messages successfully published to the broker, labeled by
/// `{subject}`. Not named in spec.md §6's metric list but grounded in §4.3's
/// "metrics on success/failure counts" requirement for the producer.
pub static PRODUCE_SUCCESS_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_counter_vec(
        "produce_success_count",
        "messages successfully published to the broker",
        &["subject"],
    )
});

/// Number of publish attempts that failed, labeled by `{subject}`.
pub static PRODUCE_FAILURE_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_counter_vec(
        "produce_failure_count",
        "publish attempts that failed",
        &["subject"],
    )
});

/// Convenience accessor for a single unlabeled gauge, used by tests and by
/// callers that don't need per-partition attribution.
#[must_use]
pub fn simple_gauge(name: &str, help: &str) -> Gauge {
    let metric = Gauge::new(name, help).unwrap_or_else(|_| {
        Gauge::new(format!("{name}_invalid"), help).expect("fallback gauge name is always valid")
    });
    let _ = prometheus::default_registry().register(Box::new(metric.clone()));
    metric
}
