// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Builds a `tonic` channel over a Unix-domain socket.
//!
//! Neither source (sensor, flow observer) is reachable over TCP; both are
//! host-local sidecars exposed only via `VEGA_SENSOR_SOCK`/`VEGA_OBSERVER_SOCK`.
//! `tonic::transport::Channel` only dials TCP/TLS out of the box, so this
//! wires a custom `tower::service_fn` connector around `UnixStream` instead,
//! the standard approach for UDS transports with `tonic`/`hyper`.

use std::path::PathBuf;

use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

use crate::{Error, Result};

/// Dials a Unix-domain socket at `path` and returns a connected `tonic`
/// channel. The URI passed to `Endpoint` is a placeholder; the connector
/// below ignores it and always dials `path`.
pub async fn connect(path: impl Into<PathBuf>) -> Result<Channel> {
    let path = path.into();
    let channel = Endpoint::try_from("http://[::]:50051")
        .map_err(Error::Transport)?
        .connect_with_connector(service_fn(move |_: Uri| {
            let path = path.clone();
            async move { UnixStream::connect(path).await.map(hyper_util::rt::TokioIo::new) }
        }))
        .await
        .map_err(Error::Transport)?;
    Ok(channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_fails_cleanly_when_socket_is_missing() {
        let err = connect("/nonexistent/vega-test.sock").await;
        assert!(err.is_err());
    }
}
