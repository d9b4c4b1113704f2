// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! `sec` table: one row per process-exec/process-exit security event.
//!
//! Only `ProcessExec` and `ProcessExit` events materialize rows; every other
//! `EventType` is a hard [`Error::UnknownSecEventKind`](crate::Error) for the
//! row it belongs to, matching the upstream sensor's behavior (see
//! SPEC_FULL.md §3).

use crate::sensor_proto::{get_events_response::Event, EventType, GetEventsResponse, Process as WireProcess};
use crate::{Error, Result};
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One flattened `Process`/`parent_process` pair, embedded twice in
/// [`SecRow`] under the `process_*`/`parent_process_*` column prefixes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessFields {
    pub exec_id: String,
    pub pid: u32,
    pub uid: u32,
    pub cwd: String,
    pub binary: String,
    pub args: String,
    pub flags: String,
    #[serde(with = "clickhouse::serde::time::datetime64::nanos")]
    pub start_time: OffsetDateTime,
    pub auid: u32,
    pub docker: String,
    pub parent_exec_id: String,
    pub refcnt: u32,
}

impl ProcessFields {
    fn from_wire(p: &WireProcess) -> Self {
        Self {
            exec_id: p.exec_id.clone(),
            pid: p.pid,
            uid: p.uid,
            cwd: p.cwd.clone(),
            binary: p.binary.clone(),
            args: p.arguments.clone(),
            flags: p.flags.clone(),
            start_time: timestamp_to_offset(p.start_time.as_ref()),
            auid: p.auid,
            docker: p.docker.clone(),
            parent_exec_id: p.parent_exec_id.clone(),
            refcnt: p.refcnt,
        }
    }
}

fn timestamp_to_offset(ts: Option<&prost_types::Timestamp>) -> OffsetDateTime {
    let Some(ts) = ts else {
        return OffsetDateTime::UNIX_EPOCH;
    };
    OffsetDateTime::from_unix_timestamp(ts.seconds)
        .map(|base| base + time::Duration::nanoseconds(i64::from(ts.nanos)))
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// A single `sec` table row, one-to-one with its columns.
///
/// `event_type` is bound here even though the upstream `sec.Table.Columns()`
/// never wires it into `Input()`/`Result()` (an apparent oversight there,
/// since `Append` does populate it) — this crate binds it on both sides so
/// the column-parity property (SPEC_FULL.md §8 property 1) holds.
#[derive(Debug, Clone, PartialEq, Row, Serialize, Deserialize)]
pub struct SecRow {
    #[serde(with = "clickhouse::serde::time::datetime64::nanos")]
    pub timestamp: OffsetDateTime,
    pub node_name: String,
    pub k8s_pod: String,
    pub k8s_ns: String,
    pub k8s_container: String,
    pub k8s_image: String,
    pub event_type: String,
    pub process_exec_id: String,
    pub process_pid: u32,
    pub process_uid: u32,
    pub process_cwd: String,
    pub process_binary: String,
    pub process_args: String,
    pub process_flags: String,
    #[serde(with = "clickhouse::serde::time::datetime64::nanos")]
    pub process_start_time: OffsetDateTime,
    pub process_auid: u32,
    pub process_docker: String,
    pub process_parent_exec_id: String,
    pub process_refcnt: u32,
    pub parent_process_exec_id: String,
    pub parent_process_pid: u32,
    pub parent_process_uid: u32,
    pub parent_process_cwd: String,
    pub parent_process_binary: String,
    pub parent_process_args: String,
    pub parent_process_flags: String,
    #[serde(with = "clickhouse::serde::time::datetime64::nanos")]
    pub parent_process_start_time: OffsetDateTime,
    pub parent_process_auid: u32,
    pub parent_process_docker: String,
    pub parent_process_parent_exec_id: String,
    pub parent_process_refcnt: u32,
    pub process_ancestors_json: String,
}

fn event_type_label(event_type: i32) -> &'static str {
    match EventType::try_from(event_type).unwrap_or(EventType::Unspecified) {
        EventType::Unspecified => "Unspecified",
        EventType::ProcessExec => "ProcessExec",
        EventType::ProcessExit => "ProcessExit",
        EventType::ProcessKprobe => "ProcessKprobe",
        EventType::ProcessTracepoint => "ProcessTracepoint",
        EventType::ProcessLoader => "ProcessLoader",
    }
}

fn flatten_process(p: Option<&WireProcess>) -> ProcessFields {
    p.map(ProcessFields::from_wire).unwrap_or_default()
}

/// Converts one `GetEventsResponse` into a single [`SecRow`], or a fatal
/// [`Error::UnknownSecEventKind`] when the event carries no row-materialization
/// path (anything other than `ProcessExec`/`ProcessExit`).
pub fn from_response(resp: &GetEventsResponse) -> Result<SecRow> {
    let (process, parent, pod, ancestors_json) = match &resp.event {
        Some(Event::ProcessExec(e)) => {
            let process = e.process.as_ref();
            let pod = process.and_then(|p| p.pod.as_ref());
            let ancestors_json = serde_json::to_string(&e.ancestors)?;
            (process, e.parent.as_ref(), pod, ancestors_json)
        }
        Some(Event::ProcessExit(e)) => {
            let process = e.process.as_ref();
            let pod = process.and_then(|p| p.pod.as_ref());
            (process, e.parent.as_ref(), pod, "null".to_string())
        }
        other => {
            let kind = other
                .as_ref()
                .map_or("<no event>".to_string(), |e| format!("{e:?}"));
            return Err(Error::UnknownSecEventKind(kind));
        }
    };

    let proc_fields = flatten_process(process);
    let parent_fields = flatten_process(parent);

    Ok(SecRow {
        timestamp: timestamp_to_offset(resp.time.as_ref()),
        node_name: resp.node_name.clone(),
        k8s_pod: pod.map(|p| p.name.clone()).unwrap_or_default(),
        k8s_ns: pod.map(|p| p.namespace.clone()).unwrap_or_default(),
        k8s_container: pod
            .and_then(|p| p.container.as_ref())
            .map(|c| c.name.clone())
            .unwrap_or_default(),
        k8s_image: pod
            .and_then(|p| p.container.as_ref())
            .map(|c| c.image_id.clone())
            .unwrap_or_default(),
        event_type: event_type_label(resp.event_type).to_string(),
        process_exec_id: proc_fields.exec_id,
        process_pid: proc_fields.pid,
        process_uid: proc_fields.uid,
        process_cwd: proc_fields.cwd,
        process_binary: proc_fields.binary,
        process_args: proc_fields.args,
        process_flags: proc_fields.flags,
        process_start_time: proc_fields.start_time,
        process_auid: proc_fields.auid,
        process_docker: proc_fields.docker,
        process_parent_exec_id: proc_fields.parent_exec_id,
        process_refcnt: proc_fields.refcnt,
        parent_process_exec_id: parent_fields.exec_id,
        parent_process_pid: parent_fields.pid,
        parent_process_uid: parent_fields.uid,
        parent_process_cwd: parent_fields.cwd,
        parent_process_binary: parent_fields.binary,
        parent_process_args: parent_fields.args,
        parent_process_flags: parent_fields.flags,
        parent_process_start_time: parent_fields.start_time,
        parent_process_auid: parent_fields.auid,
        parent_process_docker: parent_fields.docker,
        parent_process_parent_exec_id: parent_fields.parent_exec_id,
        parent_process_refcnt: parent_fields.refcnt,
        process_ancestors_json: ancestors_json,
    })
}

/// Column names bound by [`SecRow`], in declaration order. Identical for
/// both the insert and (future) query paths since both reuse this one type.
pub const COLUMNS: &[&str] = &[
    "timestamp",
    "node_name",
    "k8s_pod",
    "k8s_ns",
    "k8s_container",
    "k8s_image",
    "event_type",
    "process_exec_id",
    "process_pid",
    "process_uid",
    "process_cwd",
    "process_binary",
    "process_args",
    "process_flags",
    "process_start_time",
    "process_auid",
    "process_docker",
    "process_parent_exec_id",
    "process_refcnt",
    "parent_process_exec_id",
    "parent_process_pid",
    "parent_process_uid",
    "parent_process_cwd",
    "parent_process_binary",
    "parent_process_args",
    "parent_process_flags",
    "parent_process_start_time",
    "parent_process_auid",
    "parent_process_docker",
    "parent_process_parent_exec_id",
    "parent_process_refcnt",
    "process_ancestors_json",
];

/// Builds the `CREATE TABLE IF NOT EXISTS` statement for a `sec`-shaped
/// table. The TTL clause is appended separately at setup time (see
/// `crate::INGEST_TTL_CLAUSE`), matching the upstream split between
/// `sec.NewDDL` and `setupClickHouse`'s TTL append.
#[must_use]
pub fn ddl(table_name: &str) -> String {
    format!(
        r"
CREATE TABLE IF NOT EXISTS {table_name}
(
    timestamp                    DateTime64(9),
    INDEX timestamp_idx timestamp TYPE minmax GRANULARITY 1,
    node_name                    LowCardinality(String),

    k8s_pod       LowCardinality(String),
    k8s_container LowCardinality(String),
    k8s_ns        LowCardinality(String),
    k8s_image     LowCardinality(String),

    event_type Enum8(
        'Unspecified'       = 0,
        'ProcessExec'       = 1,
        'ProcessExit'       = 5,
        'ProcessKprobe'     = 9,
        'ProcessTracepoint' = 10,
        'ProcessLoader'     = 11
    ),

    process_exec_id        String,
    process_pid            UInt32,
    process_uid            UInt32,
    process_cwd            String,
    process_binary         String,
    process_args           String,
    process_flags          String,
    process_start_time     DateTime64(9),
    process_auid           UInt32,
    process_docker         String,
    process_parent_exec_id String,
    process_refcnt         UInt32,

    parent_process_exec_id        String,
    parent_process_pid            UInt32,
    parent_process_uid            UInt32,
    parent_process_cwd            String,
    parent_process_binary         String,
    parent_process_args           String,
    parent_process_flags          String,
    parent_process_start_time     DateTime64(9),
    parent_process_auid           UInt32,
    parent_process_docker         String,
    parent_process_parent_exec_id String,
    parent_process_refcnt         UInt32,

    process_ancestors_json String
)
    ENGINE = MergeTree()
        PARTITION BY toYearWeek(timestamp)
        ORDER BY (node_name, timestamp)
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor_proto::{Container, GetEventsResponse, Pod, ProcessExec, ProcessExit};

    fn wire_process(exec_id: &str) -> WireProcess {
        WireProcess {
            exec_id: exec_id.to_string(),
            pid: 42,
            uid: 0,
            cwd: "/".to_string(),
            binary: "/bin/sh".to_string(),
            arguments: String::new(),
            flags: String::new(),
            start_time: Some(prost_types::Timestamp {
                seconds: 1_700_000_000,
                nanos: 0,
            }),
            auid: 0,
            docker: String::new(),
            parent_exec_id: String::new(),
            refcnt: 1,
            pod: Some(Pod {
                namespace: "default".to_string(),
                name: "my-pod".to_string(),
                container: Some(Container {
                    name: "my-container".to_string(),
                    image_id: "sha256:abc".to_string(),
                }),
            }),
        }
    }

    #[test]
    fn ddl_contains_every_bound_column() {
        let ddl = ddl("sec");
        super::super::ddl_contains_all(&ddl, COLUMNS).unwrap();
    }

    #[test]
    fn process_exec_materializes_a_row() {
        let resp = GetEventsResponse {
            node_name: "node-a".to_string(),
            time: Some(prost_types::Timestamp {
                seconds: 1_700_000_001,
                nanos: 0,
            }),
            event_type: EventType::ProcessExec as i32,
            event: Some(Event::ProcessExec(ProcessExec {
                process: Some(wire_process("exec-1")),
                parent: Some(wire_process("exec-0")),
                ancestors: vec![],
            })),
        };

        let row = from_response(&resp).unwrap();
        assert_eq!(row.event_type, "ProcessExec");
        assert_eq!(row.process_exec_id, "exec-1");
        assert_eq!(row.parent_process_exec_id, "exec-0");
        assert_eq!(row.k8s_pod, "my-pod");
        assert_eq!(row.k8s_container, "my-container");
        assert_eq!(row.process_ancestors_json, "[]");
    }

    #[test]
    fn process_exit_sets_null_ancestors() {
        let resp = GetEventsResponse {
            node_name: "node-a".to_string(),
            time: Some(prost_types::Timestamp {
                seconds: 1_700_000_002,
                nanos: 0,
            }),
            event_type: EventType::ProcessExit as i32,
            event: Some(Event::ProcessExit(ProcessExit {
                process: Some(wire_process("exec-1")),
                parent: None,
            })),
        };

        let row = from_response(&resp).unwrap();
        assert_eq!(row.process_ancestors_json, "null");
        assert_eq!(row.parent_process_exec_id, "");
    }

    #[test]
    fn unhandled_event_kind_is_a_hard_error() {
        let resp = GetEventsResponse {
            node_name: "node-a".to_string(),
            time: None,
            event_type: EventType::ProcessKprobe as i32,
            event: Some(Event::ProcessKprobe(crate::sensor_proto::ProcessKprobe {
                process: Some(wire_process("exec-1")),
            })),
        };

        let err = from_response(&resp).unwrap_err();
        assert!(matches!(err, Error::UnknownSecEventKind(_)));
    }

    #[test]
    fn missing_event_is_a_hard_error() {
        let resp = GetEventsResponse {
            node_name: "node-a".to_string(),
            time: None,
            event_type: EventType::Unspecified as i32,
            event: None,
        };

        assert!(from_response(&resp).is_err());
    }
}
