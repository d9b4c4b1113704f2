// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The batch-writer (Ingester) state machine and its ClickHouse binding.

pub mod ingester;
pub mod sink;

pub use ingester::{AppendEntry, EndpointSink, Ingester, INGEST_HARD_TIMEOUT, INGEST_MAX_BATCH, INGEST_SOFT_TIMEOUT};
pub use sink::{BatchSink, ClickHouseBatchSink};
