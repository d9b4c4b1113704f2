// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Publishes marshaled protobuf payloads to a named subject.
//!
//! Contract (spec.md §4.3): `produce(subject, msg)` serializes once and
//! publishes; publish is fire-and-forget at the application level, the
//! broker library supplies at-least-once delivery to subscribers from its
//! own log. Per §5, failures are observable but not individually retried —
//! the supervisor restarts the whole ingester on hard failures instead.

use std::time::Duration;

use prost::Message;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tracing::warn;

use crate::env_vars;
use crate::metrics::{PRODUCE_FAILURE_COUNT, PRODUCE_SUCCESS_COUNT};
use crate::{Error, Result};

/// Writer parameters fixed by spec.md §6: `Async=true`, `BatchSize=10_000`,
/// `BatchTimeout=1s`.
pub const BATCH_SIZE: usize = 10_000;
/// Maximum time a produced message may sit buffered before a batch is sent.
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(1);
/// Queue timeout used for the (non-blocking) enqueue call itself.
const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maps `KAFKA_BALANCER` (spec.md §6: `least_bytes` default, `hash`,
/// `round_robin`) onto `rdkafka`'s `partitioner` producer config. An
/// unrecognized value is startup-fatal (SPEC_FULL.md §6 Rust binding note —
/// the original panics, this crate returns `Error::Config` instead).
pub fn partitioner_for_balancer(balancer: &str) -> Result<&'static str> {
    match balancer {
        "" | "least_bytes" => Ok("consistent_random"),
        "hash" => Ok("murmur2"),
        "round_robin" => Ok("round_robin"),
        other => Err(Error::Config(format!(
            "unrecognized {}: {other}",
            env_vars::KAFKA_BALANCER
        ))),
    }
}

/// Builds the shared `rdkafka` producer configuration.
pub fn producer_config(brokers: &str, balancer: &str, user: Option<&str>, password: Option<&str>) -> Result<ClientConfig> {
    let mut cfg = ClientConfig::new();
    cfg.set("bootstrap.servers", brokers)
        .set("message.timeout.ms", BATCH_TIMEOUT.as_millis().to_string())
        .set("queue.buffering.max.messages", BATCH_SIZE.to_string())
        .set("partitioner", partitioner_for_balancer(balancer)?)
        .set("enable.idempotence", "true");

    if let (Some(user), Some(password)) = (user, password) {
        cfg.set("security.protocol", "sasl_plaintext")
            .set("sasl.mechanisms", "PLAIN")
            .set("sasl.username", user)
            .set("sasl.password", password);
    }

    Ok(cfg)
}

/// Publishes marshaled protobuf payloads to named subjects on the bus.
pub struct BrokerProducer {
    producer: FutureProducer,
}

impl BrokerProducer {
    /// Builds a producer from an already-constructed `rdkafka` config.
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let producer: FutureProducer = cfg.create().map_err(Error::Kafka)?;
        Ok(Self { producer })
    }

    /// Marshals `msg` and publishes it to `subject`. Fire-and-forget: the
    /// enqueue itself is awaited (so a full local queue applies
    /// backpressure to the caller), but the broker's own acknowledgment is
    /// not waited on beyond that enqueue handshake.
    pub async fn produce(&self, subject: &str, msg: &impl Message) -> Result<()> {
        let mut payload = Vec::with_capacity(msg.encoded_len());
        msg.encode(&mut payload)?;

        let record: FutureRecord<'_, (), Vec<u8>> = FutureRecord::to(subject).payload(&payload);
        match self.producer.send(record, Timeout::After(ENQUEUE_TIMEOUT)).await {
            Ok(_) => {
                PRODUCE_SUCCESS_COUNT.with_label_values(&[subject]).inc();
                Ok(())
            }
            Err((err, _)) => {
                PRODUCE_FAILURE_COUNT.with_label_values(&[subject]).inc();
                warn!(subject, error = %err, "publish failed");
                Err(Error::Kafka(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balancer_mapping() {
        assert_eq!(partitioner_for_balancer("").unwrap(), "consistent_random");
        assert_eq!(partitioner_for_balancer("least_bytes").unwrap(), "consistent_random");
        assert_eq!(partitioner_for_balancer("hash").unwrap(), "murmur2");
        assert_eq!(partitioner_for_balancer("round_robin").unwrap(), "round_robin");
    }

    #[test]
    fn unrecognized_balancer_is_a_config_error() {
        let err = partitioner_for_balancer("bogus").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn producer_config_sets_bootstrap_servers() {
        let cfg = producer_config("broker-1:9092,broker-2:9092", "hash", None, None).unwrap();
        assert_eq!(
            cfg.get("bootstrap.servers"),
            Some("broker-1:9092,broker-2:9092")
        );
        assert_eq!(cfg.get("partitioner"), Some("murmur2"));
    }

    #[test]
    fn producer_config_wires_sasl_when_credentials_present() {
        let cfg = producer_config("broker:9092", "least_bytes", Some("user"), Some("pass")).unwrap();
        assert_eq!(cfg.get("sasl.username"), Some("user"));
        assert_eq!(cfg.get("security.protocol"), Some("sasl_plaintext"));
    }
}
