// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! `vega-agent`: dials the two host-local gRPC streams (process security
//! sensor, eBPF flow observer) and republishes every decoded message onto
//! the broker under its subject (spec.md §4.1/§4.2).
//!
//! Configuration is entirely environment-driven (spec.md §6); `clap` only
//! backs `--help`/`--version` the way the rest of this codebase's binaries
//! do, it does not parse any flags of its own.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use vega_ingest::broker::producer::producer_config;
use vega_ingest::broker::BrokerProducer;
use vega_ingest::observer_proto::GetFlowsResponse;
use vega_ingest::sensor_proto::GetEventsResponse;
use vega_ingest::sources::{flow_client::FlowClient, sensor_client::SensorClient};
use vega_ingest::supervisor::{BoxTask, Supervisor};
use vega_ingest::{env_vars, telemetry, Error, Result, FLOW_SUBJECT, SEC_SUBJECT};

#[derive(Parser)]
#[command(name = "vega-agent", version, about = "Streams kernel security events and flows onto the broker")]
struct Cli;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();
    let _cli = Cli::parse();

    let sensor_sock = require_env(env_vars::VEGA_SENSOR_SOCK)?;
    let observer_sock = require_env(env_vars::VEGA_OBSERVER_SOCK)?;

    let kafka_brokers = env_vars::env_csv(env_vars::KAFKA_ADDR).join(",");
    if kafka_brokers.is_empty() {
        return Err(Error::Config(format!("{} must name at least one broker", env_vars::KAFKA_ADDR)));
    }
    let balancer = env_vars::env_string_or_default(env_vars::KAFKA_BALANCER, "");
    let kafka_user = env_vars::env_string(env_vars::KAFKA_USER);
    let kafka_password = env_vars::env_string(env_vars::KAFKA_PASSWORD);

    let producer_cfg = producer_config(&kafka_brokers, &balancer, kafka_user.as_deref(), kafka_password.as_deref())?;
    let producer = Arc::new(BrokerProducer::new(&producer_cfg)?);

    let mut sensor_client = SensorClient::connect(sensor_sock).await?;
    let sensor_version = sensor_client.probe().await?;
    info!(version = %sensor_version, "connected to process security sensor");

    let mut flow_client = FlowClient::connect(observer_sock).await?;
    let seen_flows = flow_client.probe().await?;
    info!(seen_flows, "connected to flow observer");

    let supervisor = Supervisor::new();
    let cancel = supervisor.cancellation_token();

    let (sec_tx, mut sec_rx) = mpsc::unbounded_channel::<GetEventsResponse>();
    let (flow_tx, mut flow_rx) = mpsc::unbounded_channel::<GetFlowsResponse>();

    let sensor_cancel = cancel.clone();
    let sensor_stream: BoxTask = Box::pin(async move {
        let stream = sensor_client.stream_events(move |event| {
            let _ = sec_tx.send(event);
        });
        tokio::select! {
            res = stream => res,
            () = sensor_cancel.cancelled() => Ok(()),
        }
    });

    let flow_cancel = cancel.clone();
    let flow_stream: BoxTask = Box::pin(async move {
        let stream = flow_client.stream_flows(move |flow| {
            let _ = flow_tx.send(flow);
        });
        tokio::select! {
            res = stream => res,
            () = flow_cancel.cancelled() => Ok(()),
        }
    });

    let sec_producer = Arc::clone(&producer);
    let sec_forward: BoxTask = Box::pin(async move {
        while let Some(event) = sec_rx.recv().await {
            sec_producer.produce(SEC_SUBJECT, &event).await?;
        }
        Ok(())
    });

    let flow_producer = Arc::clone(&producer);
    let flow_forward: BoxTask = Box::pin(async move {
        while let Some(flow) = flow_rx.recv().await {
            flow_producer.produce(FLOW_SUBJECT, &flow).await?;
        }
        Ok(())
    });

    supervisor.run(vec![sensor_stream, sec_forward, flow_stream, flow_forward]).await
}

fn require_env(name: &str) -> Result<String> {
    env_vars::env_string(name).ok_or_else(|| Error::Config(format!("{name} must be set")))
}
