// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Thin gRPC clients over the two host-local Unix-domain-socket streams.
//!
//! Both clients share one contract: a short-deadline liveness probe must
//! succeed before the long-lived stream is opened, and the stream ends
//! cleanly (without error) on cancellation or server EOF.

pub mod flow_client;
pub mod sensor_client;
pub mod unix_channel;

use std::time::Duration;

/// Deadline for the liveness probe (`GetVersion`/`ServerStatus`) that must
/// succeed before either stream is opened.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
