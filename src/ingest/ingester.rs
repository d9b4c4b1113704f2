// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The batch-writer (Ingester) state machine — the core of this crate.
//!
//! Mirrors spec.md §4.5's state table exactly:
//!
//! | State | Event | Action | Next |
//! |---|---|---|---|
//! | Opening | dial+query start OK | bind input, reset schema | Accepting |
//! | Accepting | entry arrives, rows < MAX_BATCH | append; bump `latest_offset` | Accepting |
//! | Accepting | entry arrives, rows >= MAX_BATCH | flush this block | Flushing |
//! | Accepting | soft-timer tick, rows > 0 | flush this block | Flushing |
//! | Accepting | hard-timer tick | close insert stream | Closing |
//! | Accepting | ctx cancelled | return ctx error | Closing (error) |
//! | Flushing | driver round-trip OK | reset buffer | Accepting |
//! | Closing | stream closed OK, latest_offset > 0 | commit offset | Opening (loop) |
//! | Closing | stream closed error | close connection; surface error | terminal |
//!
//! Rust binding: there is no persistent "insert stream" object to keep
//! open across flushes the way the original's column-buffer driver does —
//! each flush is its own `clickhouse::Insert` write+end cycle (see
//! [`crate::ingest::sink::BatchSink`]). What persists across flushes within
//! one "insert stream" lifetime is the *endpoint choice*: the hard timer is
//! what rotates to a newly-chosen endpoint, exactly matching spec.md's
//! "choose one endpoint uniformly at random... at the start of each
//! insert-stream cycle".

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::sink::BatchSink;
use crate::broker::{Entry, SharedCommitter};
use crate::metrics::{ENTRIES_SAVED, OFFSET_COMMITTED};
use crate::Result;

/// Maximum lifetime of one insert stream (spec.md §4.5).
pub const INGEST_HARD_TIMEOUT: Duration = Duration::from_secs(15);
/// Maximum time a non-empty batch may buffer before a flush.
pub const INGEST_SOFT_TIMEOUT: Duration = Duration::from_millis(300);
/// Maximum rows per flushed block.
pub const INGEST_MAX_BATCH: usize = 10_000;

/// One configured database endpoint: an address paired with the sink that
/// writes to it.
pub struct EndpointSink<R> {
    /// Human-readable address, used only for logging/tracing.
    pub addr: String,
    /// The sink dialed against this endpoint.
    pub sink: Arc<dyn BatchSink<R>>,
}

/// Converts one decoded broker entry into zero or more rows. Injected by
/// the supervisor so the Ingester stays agnostic of the concrete row shape
/// (spec.md §4.5 "Append-entry hook", §9 "Polymorphism over event kinds").
/// An `Err` is logged at warning level by the caller and the entry is
/// dropped, but its offset is still tracked (spec.md §7 "poison-pill
/// isolation").
pub trait AppendEntry<D, R>: Send + Sync {
    fn append(&self, entry: &D) -> Result<Vec<R>>;
}

impl<D, R, F> AppendEntry<D, R> for F
where
    F: Fn(&D) -> Result<Vec<R>> + Send + Sync,
{
    fn append(&self, entry: &D) -> Result<Vec<R>> {
        self(entry)
    }
}

/// The batch-writer state machine for one event kind.
pub struct Ingester<D, R, A>
where
    A: AppendEntry<D, R>,
{
    subject: String,
    table: String,
    ddl: String,
    endpoints: Vec<EndpointSink<R>>,
    append: A,
    committer: SharedCommitter,
    client_id: String,
    _marker: PhantomData<D>,
}

impl<D, R, A> Ingester<D, R, A>
where
    D: Send + 'static,
    R: Send + Sync + 'static,
    A: AppendEntry<D, R>,
{
    /// Builds an ingester for one `(subject, table)` pair. `endpoints` must
    /// be non-empty; the supervisor validates this from configuration
    /// before constructing any ingester. `client_id` must match the
    /// identifier the broker consumer was built with, so
    /// `entries.kafka.offset.committed` carries the same `{topic,
    /// partition, client_id}` attribution as `entries.kafka.offset.read`
    /// (spec.md §6).
    pub fn new(
        subject: impl Into<String>,
        table: impl Into<String>,
        ddl: impl Into<String>,
        endpoints: Vec<EndpointSink<R>>,
        append: A,
        committer: SharedCommitter,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            table: table.into(),
            ddl: ddl.into(),
            endpoints,
            append,
            committer,
            client_id: client_id.into(),
            _marker: PhantomData,
        }
    }

    /// For each configured endpoint: dial, ping, and idempotently issue the
    /// DDL (with the retention TTL already appended by the caller). Any
    /// failure here is startup-fatal (spec.md §4.5 `setup`).
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn setup(&self) -> Result<()> {
        for endpoint in &self.endpoints {
            info!(addr = %endpoint.addr, "setting up table");
            endpoint.sink.setup(&self.table, &self.ddl).await?;
        }
        Ok(())
    }

    fn choose_endpoint(&self) -> &EndpointSink<R> {
        self.endpoints
            .choose(&mut rand::thread_rng())
            .unwrap_or(&self.endpoints[0])
    }

    /// Runs the batch-writer loop until `cancel` fires, the entry channel
    /// closes, or an unrecoverable error occurs.
    pub async fn ingest(&self, cancel: CancellationToken, mut entries: mpsc::Receiver<Entry<D>>) -> Result<()> {
        'reopen: loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let endpoint = self.choose_endpoint();
            info!(addr = %endpoint.addr, subject = %self.subject, "opening insert stream");

            let mut rows: Vec<R> = Vec::new();
            let mut latest_offsets: HashMap<(String, i32), i64> = HashMap::new();

            let mut soft_timer = interval(INGEST_SOFT_TIMEOUT);
            soft_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let hard_deadline = tokio::time::sleep(INGEST_HARD_TIMEOUT);
            tokio::pin!(hard_deadline);

            loop {
                tokio::select! {
                    biased;

                    () = cancel.cancelled() => {
                        return Ok(());
                    }

                    () = &mut hard_deadline => {
                        info!(addr = %endpoint.addr, subject = %self.subject, "hard timeout; rotating insert stream");
                        if !rows.is_empty() {
                            self.flush(endpoint, &mut rows, &mut latest_offsets).await?;
                        }
                        continue 'reopen;
                    }

                    _ = soft_timer.tick() => {
                        if !rows.is_empty() {
                            self.flush(endpoint, &mut rows, &mut latest_offsets).await?;
                        }
                    }

                    maybe_entry = entries.recv() => {
                        let Some(entry) = maybe_entry else {
                            if !rows.is_empty() {
                                self.flush(endpoint, &mut rows, &mut latest_offsets).await?;
                            }
                            return Ok(());
                        };

                        let key = (entry.topic.clone(), entry.partition);
                        latest_offsets
                            .entry(key)
                            .and_modify(|o| *o = (*o).max(entry.offset))
                            .or_insert(entry.offset);

                        match self.append.append(&entry.decoded) {
                            Ok(mut new_rows) => rows.append(&mut new_rows),
                            Err(err) => {
                                warn!(
                                    subject = %self.subject,
                                    error = %err,
                                    "append failed; dropping entry (offset still advances)"
                                );
                            }
                        }

                        if rows.len() >= INGEST_MAX_BATCH {
                            self.flush(endpoint, &mut rows, &mut latest_offsets).await?;
                        }
                    }
                }
            }
        }
    }

    /// Flushing: write the block, and only on success commit the
    /// max-offset-per-partition recorded since the last flush
    /// (spec.md §4.5 "Flushing"/"Closing", the at-least-once guarantee).
    async fn flush(
        &self,
        endpoint: &EndpointSink<R>,
        rows: &mut Vec<R>,
        latest_offsets: &mut HashMap<(String, i32), i64>,
    ) -> Result<()> {
        let block_len = rows.len();
        endpoint.sink.write_block(&self.table, rows).await?;
        ENTRIES_SAVED.with_label_values(&[&self.subject]).inc_by(block_len as u64);
        rows.clear();

        for ((topic, partition), offset) in latest_offsets.drain() {
            if offset > 0 {
                self.committer.commit(&topic, partition, offset).await?;
                OFFSET_COMMITTED
                    .with_label_values(&[&topic, &partition.to_string(), &self.client_id])
                    .set(offset as f64);
            }
        }
        Ok(())
    }
}
