// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Client for the process-event sensor's Unix-socket gRPC stream.

use tonic::{Request, Status};
use tracing::{info, warn};

use super::{unix_channel, PROBE_TIMEOUT};
use crate::sensor_proto::process_events_client::ProcessEventsClient;
use crate::sensor_proto::{GetEventsRequest, GetEventsResponse, GetVersionRequest};
use crate::{Error, Result};

/// Thin wrapper over the sensor's `ProcessEvents` service.
pub struct SensorClient {
    inner: ProcessEventsClient<tonic::transport::Channel>,
}

impl SensorClient {
    /// Dials the sensor's Unix-domain socket. Does not probe yet; call
    /// [`SensorClient::probe`] before [`SensorClient::stream_events`].
    pub async fn connect(socket_path: impl Into<std::path::PathBuf>) -> Result<Self> {
        let channel = unix_channel::connect(socket_path).await?;
        Ok(Self {
            inner: ProcessEventsClient::new(channel),
        })
    }

    /// Short-deadline liveness probe. Must succeed before streaming starts;
    /// the socket existing but the peer not answering is startup-fatal.
    pub async fn probe(&mut self) -> Result<String> {
        let mut req = Request::new(GetVersionRequest {});
        req.set_timeout(PROBE_TIMEOUT);
        let resp = self.inner.get_version(req).await?;
        Ok(resp.into_inner().version)
    }

    /// Opens the long-lived `GetEvents` server-stream and forwards decoded
    /// responses to `handler` until end-of-stream, remote cancellation, or a
    /// hard transport error.
    ///
    /// End-of-stream and the broker's `Cancelled` status are clean
    /// shutdowns (returns `Ok(())`); any other status is fatal and
    /// surfaces to the caller (the supervisor).
    pub async fn stream_events<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(GetEventsResponse) + Send,
    {
        let mut stream = self
            .inner
            .get_events(Request::new(GetEventsRequest { allow_list: vec![] }))
            .await?
            .into_inner();

        loop {
            match stream.message().await {
                Ok(Some(event)) => handler(event),
                Ok(None) => {
                    info!("sensor stream ended cleanly (EOF)");
                    return Ok(());
                }
                Err(status) if status.code() == tonic::Code::Cancelled => {
                    info!("sensor stream cancelled by remote; clean shutdown");
                    return Ok(());
                }
                Err(status) => {
                    warn!(error = %status, "sensor stream transport error");
                    return Err(fatal(status));
                }
            }
        }
    }
}

fn fatal(status: Status) -> Error {
    Error::Grpc(status)
}
