// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! `vega-ingest`: subscribes to both broker subjects and bulk-loads decoded
//! rows into the columnar store (spec.md §4.4/§4.5/§4.6).
//!
//! Configuration is entirely environment-driven (spec.md §6); `clap` only
//! backs `--help`/`--version`.

use std::sync::Arc;

use clap::Parser;
use prost::Message as _;

use vega_ingest::broker::consumer::consumer_config;
use vega_ingest::broker::{consumer_group, BrokerConsumer, Entry};
use vega_ingest::ingest::{BatchSink, ClickHouseBatchSink, EndpointSink, Ingester};
use vega_ingest::observer_proto::GetFlowsResponse;
use vega_ingest::schema::{flow, sec, FLOW_TABLE, SEC_TABLE};
use vega_ingest::sensor_proto::GetEventsResponse;
use vega_ingest::supervisor::{BoxTask, Supervisor};
use vega_ingest::{env_vars, telemetry, Error, Result, FLOW_SUBJECT, INGEST_TTL_CLAUSE, SEC_SUBJECT};

#[derive(Parser)]
#[command(name = "vega-ingest", version, about = "Bulk-loads streaming security events and flows into the columnar store")]
struct Cli;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();
    let _cli = Cli::parse();

    let clickhouse_addrs = env_vars::env_csv(env_vars::CLICKHOUSE_ADDR);
    if clickhouse_addrs.is_empty() {
        return Err(Error::Config(format!(
            "{} must name at least one endpoint",
            env_vars::CLICKHOUSE_ADDR
        )));
    }
    let clickhouse_db = env_vars::env_string_or_default(env_vars::CLICKHOUSE_DB, "default");
    let clickhouse_user = env_vars::env_string_or_default(env_vars::CLICKHOUSE_USER, "");
    let clickhouse_password = env_vars::env_string_or_default(env_vars::CLICKHOUSE_PASSWORD, "");

    let kafka_brokers = env_vars::env_csv(env_vars::KAFKA_ADDR).join(",");
    if kafka_brokers.is_empty() {
        return Err(Error::Config(format!("{} must name at least one broker", env_vars::KAFKA_ADDR)));
    }
    let kafka_user = env_vars::env_string(env_vars::KAFKA_USER);
    let kafka_password = env_vars::env_string(env_vars::KAFKA_PASSWORD);

    let sec_endpoints = endpoint_sinks::<sec::SecRow>(&clickhouse_addrs, &clickhouse_db, &clickhouse_user, &clickhouse_password);
    let flow_endpoints = endpoint_sinks::<flow::FlowRow>(&clickhouse_addrs, &clickhouse_db, &clickhouse_user, &clickhouse_password);

    const CLIENT_ID: &str = "vega-ingest";

    let sec_group = consumer_group(SEC_SUBJECT);
    let sec_consumer_cfg = consumer_config(&kafka_brokers, &sec_group, kafka_user.as_deref(), kafka_password.as_deref());
    let sec_consumer = BrokerConsumer::new(&sec_consumer_cfg, SEC_SUBJECT, CLIENT_ID)?;
    let sec_committer = sec_consumer.committer();

    let flow_group = consumer_group(FLOW_SUBJECT);
    let flow_consumer_cfg = consumer_config(&kafka_brokers, &flow_group, kafka_user.as_deref(), kafka_password.as_deref());
    let flow_consumer = BrokerConsumer::new(&flow_consumer_cfg, FLOW_SUBJECT, CLIENT_ID)?;
    let flow_committer = flow_consumer.committer();

    let sec_ddl = format!("{}\n    {INGEST_TTL_CLAUSE}", sec::ddl(SEC_TABLE));
    let flow_ddl = format!("{}\n    {INGEST_TTL_CLAUSE}", flow::ddl(FLOW_TABLE));

    let sec_ingester = Arc::new(Ingester::new(
        SEC_SUBJECT,
        SEC_TABLE,
        sec_ddl,
        sec_endpoints,
        |resp: &GetEventsResponse| -> Result<Vec<sec::SecRow>> { Ok(vec![sec::from_response(resp)?]) },
        sec_committer,
        CLIENT_ID,
    ));

    let flow_ingester = Arc::new(Ingester::new(
        FLOW_SUBJECT,
        FLOW_TABLE,
        flow_ddl,
        flow_endpoints,
        |resp: &GetFlowsResponse| -> Result<Vec<flow::FlowRow>> {
            match &resp.flow {
                Some(observed) => flow::from_flow(observed),
                None => Ok(Vec::new()),
            }
        },
        flow_committer,
        CLIENT_ID,
    ));

    let supervisor = Supervisor::new();
    let cancel = supervisor.cancellation_token();

    let sec_setup = Arc::clone(&sec_ingester);
    let flow_setup = Arc::clone(&flow_ingester);
    supervisor
        .setup_all(vec![
            Box::pin(async move { sec_setup.setup().await }),
            Box::pin(async move { flow_setup.setup().await }),
        ])
        .await?;

    let (sec_tx, sec_rx) = tokio::sync::mpsc::channel::<Entry<GetEventsResponse>>(vega_ingest::ENTRY_CHANNEL_CAPACITY);
    let (flow_tx, flow_rx) = tokio::sync::mpsc::channel::<Entry<GetFlowsResponse>>(vega_ingest::ENTRY_CHANNEL_CAPACITY);

    let sec_consume_cancel = cancel.clone();
    let sec_consume_task: BoxTask = Box::pin(async move {
        sec_consumer
            .consume(sec_consume_cancel, |payload: &[u8]| GetEventsResponse::decode(payload), sec_tx)
            .await
    });

    let sec_ingest_cancel = cancel.clone();
    let sec_ingest_task: BoxTask = Box::pin(async move { sec_ingester.ingest(sec_ingest_cancel, sec_rx).await });

    let flow_consume_cancel = cancel.clone();
    let flow_consume_task: BoxTask = Box::pin(async move {
        flow_consumer
            .consume(flow_consume_cancel, |payload: &[u8]| GetFlowsResponse::decode(payload), flow_tx)
            .await
    });

    let flow_ingest_cancel = cancel.clone();
    let flow_ingest_task: BoxTask = Box::pin(async move { flow_ingester.ingest(flow_ingest_cancel, flow_rx).await });

    supervisor
        .run(vec![sec_consume_task, sec_ingest_task, flow_consume_task, flow_ingest_task])
        .await
}

fn endpoint_sinks<R>(addrs: &[String], db: &str, user: &str, password: &str) -> Vec<EndpointSink<R>>
where
    R: clickhouse::Row + serde::Serialize + Send + Sync + 'static,
{
    addrs
        .iter()
        .map(|addr| EndpointSink {
            addr: addr.clone(),
            sink: Arc::new(ClickHouseBatchSink::new(addr, db, user, password)) as Arc<dyn BatchSink<R>>,
        })
        .collect()
}
