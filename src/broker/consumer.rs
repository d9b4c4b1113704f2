// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Subscribes to a subject, decodes entries, and forwards them onto a
//! bounded in-process channel toward the batch writer.
//!
//! Contract (spec.md §4.4): one message at a time, not auto-committed; a
//! decode failure increments `parse.errors_count` but is not fatal (skip,
//! let a later successful batch's commit subsume it); `entries.kafka.offset.read`
//! is recorded as a gauge on every fetch. Commit itself is never issued from
//! here — ownership of the commit point belongs to the Ingester
//! (spec.md §4.5), reached through [`crate::broker::OffsetCommitter`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message as _;
use rdkafka::{Offset, TopicPartitionList};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::entry::{Entry, OffsetCommitter, SharedCommitter};
use crate::metrics::{ENTRIES_READ, OFFSET_READ, PARSE_COUNT, PARSE_ERRORS_COUNT};
use crate::{Error, Result};

/// Reader parameters fixed by spec.md §6.
pub const MIN_BYTES: i64 = 25 * 1024;
pub const MAX_BYTES: i64 = 10 * 1024 * 1024;
pub const MAX_WAIT: Duration = Duration::from_secs(3);

/// Builds the shared `rdkafka` consumer configuration for `group_id`.
pub fn consumer_config(
    brokers: &str,
    group_id: &str,
    user: Option<&str>,
    password: Option<&str>,
) -> ClientConfig {
    let mut cfg = ClientConfig::new();
    cfg.set("bootstrap.servers", brokers)
        .set("group.id", group_id)
        .set("enable.auto.commit", "false")
        .set("enable.partition.eof", "false")
        .set("fetch.min.bytes", MIN_BYTES.to_string())
        .set("fetch.max.bytes", MAX_BYTES.to_string())
        .set("fetch.wait.max.ms", MAX_WAIT.as_millis().to_string())
        .set("auto.offset.reset", "latest");

    if let (Some(user), Some(password)) = (user, password) {
        cfg.set("security.protocol", "sasl_plaintext")
            .set("sasl.mechanisms", "PLAIN")
            .set("sasl.username", user)
            .set("sasl.password", password);
    }

    cfg
}

/// Subscribes by subject with a named consumer group and forwards decoded
/// entries onto a bounded channel.
pub struct BrokerConsumer {
    consumer: Arc<StreamConsumer>,
    subject: String,
    client_id: String,
}

impl BrokerConsumer {
    /// Builds a consumer subscribed to `subject`.
    pub fn new(cfg: &ClientConfig, subject: &str, client_id: impl Into<String>) -> Result<Self> {
        let consumer: StreamConsumer = cfg.create().map_err(Error::Kafka)?;
        consumer.subscribe(&[subject]).map_err(Error::Kafka)?;
        Ok(Self {
            consumer: Arc::new(consumer),
            subject: subject.to_string(),
            client_id: client_id.into(),
        })
    }

    /// A handle the Ingester can hold onto and commit through, independent
    /// of whether [`BrokerConsumer::consume`] has returned (spec.md §5:
    /// "stored behind an atomic pointer so the teardown path can close it
    /// even if `consume` has not returned yet" — here, simply an `Arc`
    /// clone, since Rust's ownership model already gives us that for free).
    #[must_use]
    pub fn committer(&self) -> SharedCommitter {
        Arc::new(RdKafkaCommitter {
            consumer: Arc::clone(&self.consumer),
        })
    }

    /// Runs until `cancel` fires, decoding each fetched message with
    /// `decode` and forwarding successes on `sender`. Drains cleanly on
    /// cancellation: no further fetches are issued, no commit is made here.
    pub async fn consume<D, F>(&self, cancel: CancellationToken, decode: F, sender: mpsc::Sender<Entry<D>>) -> Result<()>
    where
        D: Send + 'static,
        F: Fn(&[u8]) -> std::result::Result<D, prost::DecodeError> + Send + Sync,
    {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(subject = %self.subject, "consumer cancelled; draining cleanly");
                    return Ok(());
                }
                msg = self.consumer.recv() => {
                    let msg = match msg {
                        Ok(msg) => msg,
                        Err(KafkaError::MessageConsumption(err)) => {
                            warn!(subject = %self.subject, error = %err, "message consumption error");
                            return Err(Error::Kafka(KafkaError::MessageConsumption(err)));
                        }
                        Err(err) => return Err(Error::Kafka(err)),
                    };

                    let partition = msg.partition();
                    let offset = msg.offset();
                    ENTRIES_READ.with_label_values(&[&self.subject]).inc();
                    OFFSET_READ
                        .with_label_values(&[&self.subject, &partition.to_string(), &self.client_id])
                        .set(offset as f64);

                    let Some(payload) = msg.payload() else {
                        continue;
                    };

                    match decode(payload) {
                        Ok(decoded) => {
                            PARSE_COUNT.with_label_values(&[&self.subject]).inc();
                            let entry = Entry {
                                raw: payload.to_vec(),
                                topic: msg.topic().to_string(),
                                partition,
                                offset,
                                decoded,
                            };
                            if sender.send(entry).await.is_err() {
                                // Receiver (ingester) gone: treat as shutdown, not an error.
                                return Ok(());
                            }
                        }
                        Err(err) => {
                            PARSE_ERRORS_COUNT.with_label_values(&[&self.subject]).inc();
                            warn!(subject = %self.subject, error = %err, "decode failure; skipping entry");
                        }
                    }
                }
            }
        }
    }
}

struct RdKafkaCommitter {
    consumer: Arc<StreamConsumer>,
}

#[async_trait]
impl OffsetCommitter for RdKafkaCommitter {
    async fn commit(&self, topic: &str, partition: i32, offset: i64) -> Result<()> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(topic, partition, Offset::Offset(offset + 1))
            .map_err(Error::Kafka)?;
        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(Error::Kafka)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_config_sets_manual_commit() {
        let cfg = consumer_config("broker:9092", "vega.ingest.tetragon", None, None);
        assert_eq!(cfg.get("enable.auto.commit"), Some("false"));
        assert_eq!(cfg.get("group.id"), Some("vega.ingest.tetragon"));
        assert_eq!(cfg.get("fetch.min.bytes"), Some("25600"));
    }

    #[test]
    fn consumer_config_wires_sasl_when_credentials_present() {
        let cfg = consumer_config("broker:9092", "grp", Some("user"), Some("pass"));
        assert_eq!(cfg.get("sasl.username"), Some("user"));
    }
}
