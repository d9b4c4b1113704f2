// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The decoded broker message handed from consumer to ingester.

use async_trait::async_trait;
use std::sync::Arc;

use crate::Result;

/// A decoded broker message paired with its raw bytes and the coordinates
/// needed to commit its offset later (spec.md GLOSSARY: "Entry").
///
/// `D` is the decoded protobuf payload type (`GetEventsResponse` for the
/// `tetragon` subject, `GetFlowsResponse` for `hubble`).
#[derive(Debug, Clone)]
pub struct Entry<D> {
    /// Raw marshaled bytes as received from the broker, kept for parity
    /// with the upstream `Entry` shape even though the ingest path only
    /// ever consumes `decoded`.
    pub raw: Vec<u8>,
    /// Topic the message was read from (equal to the subject).
    pub topic: String,
    /// Partition the message was read from.
    pub partition: i32,
    /// This message's own offset within its partition.
    pub offset: i64,
    /// The decoded protobuf payload.
    pub decoded: D,
}

/// Abstracts "commit this partition's offset on the broker" away from the
/// concrete `rdkafka` consumer handle, so the Ingester's state machine
/// (src/ingest/ingester.rs) can be driven by a fake committer in tests
/// without a live broker (spec.md §8 scenario F, "commit-after-persist").
#[async_trait]
pub trait OffsetCommitter: Send + Sync {
    /// Commits `offset` (the last-read offset; the broker stores
    /// `offset + 1` as the next position to resume from) for `(topic,
    /// partition)`.
    async fn commit(&self, topic: &str, partition: i32, offset: i64) -> Result<()>;
}

/// Shared handle alias used throughout the ingest core.
pub type SharedCommitter = Arc<dyn OffsetCommitter>;
