// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Client for the flow observer's Unix-socket gRPC stream.

use tonic::{Request, Status};
use tracing::{info, warn};

use super::{unix_channel, PROBE_TIMEOUT};
use crate::observer_proto::flow_observer_client::FlowObserverClient;
use crate::observer_proto::{GetFlowsRequest, GetFlowsResponse, ServerStatusRequest};
use crate::{Error, Result};

/// Thin wrapper over the flow observer's `FlowObserver` service.
pub struct FlowClient {
    inner: FlowObserverClient<tonic::transport::Channel>,
}

impl FlowClient {
    /// Dials the flow observer's Unix-domain socket. Does not probe yet;
    /// call [`FlowClient::probe`] before [`FlowClient::stream_flows`].
    pub async fn connect(socket_path: impl Into<std::path::PathBuf>) -> Result<Self> {
        let channel = unix_channel::connect(socket_path).await?;
        Ok(Self {
            inner: FlowObserverClient::new(channel),
        })
    }

    /// Short-deadline liveness probe (`ServerStatus`). Must succeed before
    /// streaming starts.
    pub async fn probe(&mut self) -> Result<u64> {
        let mut req = Request::new(ServerStatusRequest {});
        req.set_timeout(PROBE_TIMEOUT);
        let resp = self.inner.server_status(req).await?;
        Ok(resp.into_inner().seen_flows)
    }

    /// Opens the long-lived `GetFlows(follow=true)` server-stream and
    /// forwards decoded responses to `handler` until end-of-stream, remote
    /// cancellation, or a hard transport error.
    pub async fn stream_flows<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(GetFlowsResponse) + Send,
    {
        let mut stream = self
            .inner
            .get_flows(Request::new(GetFlowsRequest { follow: true }))
            .await?
            .into_inner();

        loop {
            match stream.message().await {
                Ok(Some(flow)) => handler(flow),
                Ok(None) => {
                    info!("flow observer stream ended cleanly (EOF)");
                    return Ok(());
                }
                Err(status) if status.code() == tonic::Code::Cancelled => {
                    info!("flow observer stream cancelled by remote; clean shutdown");
                    return Ok(());
                }
                Err(status) => {
                    warn!(error = %status, "flow observer stream transport error");
                    return Err(fatal(status));
                }
            }
        }
    }
}

fn fatal(status: Status) -> Error {
    Error::Grpc(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_fails_cleanly_when_socket_is_missing() {
        let err = FlowClient::connect("/nonexistent/vega-observer-test.sock").await;
        assert!(err.is_err());
    }
}
