// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Pub/sub broker bridge: publishes marshaled protobuf payloads on the
//! producer side, and subscribes/decodes/forwards them onto a bounded
//! in-process channel on the consumer side.
//!
//! Rust binding: `rdkafka`, matching `dashflow-streaming`'s Kafka stack.
//! Unlike `dashflow-streaming`'s producer (which frames messages through its
//! own length-prefixed `codec`), this bridge publishes raw marshaled
//! protobuf bytes directly, per spec.md §4.3/§6 ("publishes marshaled
//! protobuf payloads to named subjects").

pub mod consumer;
pub mod entry;
pub mod producer;

pub use consumer::BrokerConsumer;
pub use entry::{Entry, OffsetCommitter, SharedCommitter};
pub use producer::BrokerProducer;

/// Consumer group name for a given subject, per spec.md §6
/// (`vega.ingest.<subject>`).
#[must_use]
pub fn consumer_group(subject: &str) -> String {
    format!("vega.ingest.{subject}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_group_naming() {
        assert_eq!(consumer_group("tetragon"), "vega.ingest.tetragon");
        assert_eq!(consumer_group("hubble"), "vega.ingest.hubble");
    }
}
