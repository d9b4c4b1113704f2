// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Tracing/logging initialization shared by `vega-agent` and `vega-ingest`.

/// Initializes the global `tracing` subscriber from `RUST_LOG`, defaulting
/// to `info` when unset. Call once at the top of `main`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}
