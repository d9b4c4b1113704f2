// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Centralized environment variable names and typed accessors for
//! `vega-ingest`. Mirrors the shape of `dashflow-streaming::env_vars` so the
//! two binaries (`vega-agent`, `vega-ingest`) read configuration the same
//! way every other binary in this codebase does.

// =============================================================================
// Environment Variable Name Constants
// =============================================================================

/// Comma-separated ClickHouse endpoint addresses.
pub const CLICKHOUSE_ADDR: &str = "CLICKHOUSE_ADDR";
/// ClickHouse database name.
pub const CLICKHOUSE_DB: &str = "CLICKHOUSE_DB";
/// ClickHouse username.
pub const CLICKHOUSE_USER: &str = "CLICKHOUSE_USER";
/// ClickHouse password.
pub const CLICKHOUSE_PASSWORD: &str = "CLICKHOUSE_PASSWORD";

/// Comma-separated Kafka broker addresses.
pub const KAFKA_ADDR: &str = "KAFKA_ADDR";
/// Kafka SASL username (PLAIN); unset disables SASL.
pub const KAFKA_USER: &str = "KAFKA_USER";
/// Kafka SASL password.
pub const KAFKA_PASSWORD: &str = "KAFKA_PASSWORD";
/// Partition balancer: `least_bytes` (default), `hash`, `round_robin`.
pub const KAFKA_BALANCER: &str = "KAFKA_BALANCER";

/// Unix-domain socket path for the process-event sensor.
pub const VEGA_SENSOR_SOCK: &str = "VEGA_SENSOR_SOCK";
/// Unix-domain socket path for the flow observer.
pub const VEGA_OBSERVER_SOCK: &str = "VEGA_OBSERVER_SOCK";

/// Health/metrics endpoint port for the ingest binary.
pub const HEALTH_PORT: &str = "HEALTH_PORT";

// =============================================================================
// Typed helpers
// =============================================================================

/// Reads an environment variable as a string, returning `None` if unset.
#[must_use]
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Reads an environment variable as a string, returning `default` if unset.
#[must_use]
pub fn env_string_or_default(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Splits a comma-separated environment variable into a trimmed, non-empty
/// list of entries. Returns an empty `Vec` if unset or blank.
#[must_use]
pub fn env_csv(name: &str) -> Vec<String> {
    std::env::var(name)
        .ok()
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Reads an environment variable as a `u64`, returning `default` if unset or
/// invalid.
#[must_use]
pub fn env_u64_or_default(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

/// Reads an environment variable as a `u16`, returning `default` if unset or
/// invalid.
#[must_use]
pub fn env_u16_or_default(name: &str, default: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(default)
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Environment variable mutation is process-global; serialize tests that
    // touch it so they don't race under the test harness's thread pool.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env_var<F, R>(name: &str, value: Option<&str>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap();
        let original = env::var(name).ok();
        match value {
            Some(v) => env::set_var(name, v),
            None => env::remove_var(name),
        }
        let result = f();
        match original {
            Some(v) => env::set_var(name, v),
            None => env::remove_var(name),
        }
        result
    }

    #[test]
    #[allow(clippy::const_is_empty)]
    fn constants_are_defined() {
        assert_eq!(CLICKHOUSE_ADDR, "CLICKHOUSE_ADDR");
        assert_eq!(CLICKHOUSE_DB, "CLICKHOUSE_DB");
        assert_eq!(CLICKHOUSE_USER, "CLICKHOUSE_USER");
        assert_eq!(CLICKHOUSE_PASSWORD, "CLICKHOUSE_PASSWORD");
        assert_eq!(KAFKA_ADDR, "KAFKA_ADDR");
        assert_eq!(KAFKA_USER, "KAFKA_USER");
        assert_eq!(KAFKA_PASSWORD, "KAFKA_PASSWORD");
        assert_eq!(KAFKA_BALANCER, "KAFKA_BALANCER");
        assert!(!HEALTH_PORT.is_empty());
    }

    #[test]
    fn env_string_returns_none_when_unset() {
        with_env_var("VEGA_TEST_UNSET", None, || {
            assert!(env_string("VEGA_TEST_UNSET").is_none());
        });
    }

    #[test]
    fn env_string_or_default_returns_value_when_set() {
        with_env_var("VEGA_TEST_SET", Some("value"), || {
            assert_eq!(
                env_string_or_default("VEGA_TEST_SET", "default"),
                "value"
            );
        });
    }

    #[test]
    fn env_string_or_default_returns_default_when_unset() {
        with_env_var("VEGA_TEST_UNSET2", None, || {
            assert_eq!(
                env_string_or_default("VEGA_TEST_UNSET2", "default"),
                "default"
            );
        });
    }

    #[test]
    fn env_csv_splits_and_trims() {
        with_env_var("VEGA_TEST_CSV", Some("a, b ,c"), || {
            assert_eq!(
                env_csv("VEGA_TEST_CSV"),
                vec!["a".to_string(), "b".to_string(), "c".to_string()]
            );
        });
    }

    #[test]
    fn env_csv_drops_empty_entries() {
        with_env_var("VEGA_TEST_CSV_EMPTY", Some("a,,b,"), || {
            assert_eq!(
                env_csv("VEGA_TEST_CSV_EMPTY"),
                vec!["a".to_string(), "b".to_string()]
            );
        });
    }

    #[test]
    fn env_csv_empty_when_unset() {
        with_env_var("VEGA_TEST_CSV_UNSET", None, || {
            assert!(env_csv("VEGA_TEST_CSV_UNSET").is_empty());
        });
    }

    #[test]
    fn env_u64_or_default_parses_valid() {
        with_env_var("VEGA_TEST_U64", Some("12345"), || {
            assert_eq!(env_u64_or_default("VEGA_TEST_U64", 0), 12345);
        });
    }

    #[test]
    fn env_u64_or_default_falls_back_on_invalid() {
        with_env_var("VEGA_TEST_U64_BAD", Some("not-a-number"), || {
            assert_eq!(env_u64_or_default("VEGA_TEST_U64_BAD", 99), 99);
        });
    }

    #[test]
    fn env_u16_or_default_falls_back_on_overflow() {
        with_env_var("VEGA_TEST_U16_OVERFLOW", Some("70000"), || {
            assert_eq!(env_u16_or_default("VEGA_TEST_U16_OVERFLOW", 8080), 8080);
        });
    }
}
