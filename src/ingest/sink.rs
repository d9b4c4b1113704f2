// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The database side of one flushed block.
//!
//! `BatchSink` abstracts "write this block of rows, then finalize" away
//! from the concrete `clickhouse` client, the same way
//! [`crate::broker::OffsetCommitter`] abstracts the broker commit call —
//! so the Ingester's state machine can be driven by an in-memory fake in
//! tests (spec.md §8, scenarios D/E/F) without a live ClickHouse server.

use async_trait::async_trait;
use serde::Serialize;

use crate::{Error, Result};

/// One database round-trip: write every row in the block, then finalize.
/// A failure at either step means the whole block is lost (spec.md §3
/// Batch lifecycle: "On failure of the insert stream, the batch is
/// discarded without acknowledging the broker offset").
#[async_trait]
pub trait BatchSink<R>: Send + Sync
where
    R: Send + Sync,
{
    /// Idempotently creates the target table (`CREATE TABLE IF NOT
    /// EXISTS`, with the TTL clause appended) against this endpoint.
    async fn setup(&self, table: &str, ddl: &str) -> Result<()>;

    /// Writes `rows` as one flushed block into `table`.
    async fn write_block(&self, table: &str, rows: &[R]) -> Result<()>;
}

/// A `BatchSink` backed by a real `clickhouse::Client` for one endpoint.
pub struct ClickHouseBatchSink {
    client: clickhouse::Client,
}

impl ClickHouseBatchSink {
    /// Builds a sink dialing `addr` (e.g. `http://10.0.0.1:8123`) against
    /// `database` with the given credentials.
    #[must_use]
    pub fn new(addr: &str, database: &str, user: &str, password: &str) -> Self {
        let mut client = clickhouse::Client::default().with_url(addr).with_database(database);
        if !user.is_empty() {
            client = client.with_user(user);
        }
        if !password.is_empty() {
            client = client.with_password(password);
        }
        Self { client }
    }
}

#[async_trait]
impl<R> BatchSink<R> for ClickHouseBatchSink
where
    R: clickhouse::Row + Serialize + Send + Sync + 'static,
{
    async fn setup(&self, _table: &str, ddl: &str) -> Result<()> {
        self.client.query(ddl).execute().await.map_err(Error::ClickHouse)
    }

    async fn write_block(&self, table: &str, rows: &[R]) -> Result<()> {
        let mut insert = self.client.insert::<R>(table).await.map_err(Error::ClickHouse)?;
        for row in rows {
            insert.write(row).await.map_err(Error::ClickHouse)?;
        }
        insert.end().await.map_err(Error::ClickHouse)
    }
}
