// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Row schemas for the two target tables (`sec`, `flows`).
//!
//! Each submodule exposes a `clickhouse::Row`-deriving record struct, a
//! `ddl(table_name)` function producing that table's `CREATE TABLE`
//! statement, and a fallible `append`/`from_response` conversion from the
//! wire protobuf type into zero or more records.
//!
//! `vega-ingest` represents the "columnar buffer" the original batches rows
//! into as a plain `Vec<Record>`: the `clickhouse` crate's client encodes a
//! slice of rows directly over RowBinary, so there is no analog of
//! hand-rolled per-column append buffers here. What the original calls a
//! `Table` is, in this crate, just a growable `Vec` plus the two functions
//! above.

pub mod flow;
pub mod sec;

/// Table name used for the Sec ingester (overridable via the `-table`
/// CLI flag in the original; fixed here per `vega-ingest`'s single binary).
pub const SEC_TABLE: &str = "sec";
/// Table name used for the Flow ingester.
pub const FLOW_TABLE: &str = "flows";

/// Checks that every field name in `bindings` also appears as a bare
/// identifier in `ddl`. Used by each schema's tests to enforce the column
/// parity property (every bound column exists in the table's own DDL).
#[cfg(test)]
pub(crate) fn ddl_contains_all(ddl: &str, bindings: &[&str]) -> Result<(), String> {
    for name in bindings {
        let found = ddl
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .any(|tok| tok == *name);
        if !found {
            return Err(format!("column `{name}` missing from DDL"));
        }
    }
    Ok(())
}
