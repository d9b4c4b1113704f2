// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

use thiserror::Error;

/// Error types for the vega-ingest streaming core.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// gRPC call/stream failed with a non-retryable status.
    #[error("grpc error: {0}")]
    Grpc(#[from] tonic::Status),

    /// Failed to establish the gRPC transport (e.g. Unix socket connect).
    #[error("grpc transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Kafka client/broker error.
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// ClickHouse client/driver error.
    #[error("clickhouse error: {0}")]
    ClickHouse(#[from] clickhouse::error::Error),

    /// Protobuf decode error (malformed broker payload).
    #[error("protobuf decode error: {0}")]
    ProtobufDecode(#[from] prost::DecodeError),

    /// Protobuf encode error.
    #[error("protobuf encode error: {0}")]
    ProtobufEncode(#[from] prost::EncodeError),

    /// JSON (de)serialization error, e.g. marshaling `process_ancestors_json`.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (Unix socket dial, file access).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing environment-derived configuration; startup-fatal.
    #[error("configuration error: {0}")]
    Config(String),

    /// A Sec event carried an event kind with no row-materialization path
    /// (only `ProcessExec`/`ProcessExit` are handled; see SPEC_FULL.md §3).
    #[error("unknown sec event kind: {0}")]
    UnknownSecEventKind(String),

    /// An IP address field failed to parse; fatal for the row it belongs to.
    #[error("invalid ip address: {0}")]
    InvalidIpAddress(String),

    /// A schema's input/result column binding diverged from its own DDL.
    #[error("schema/DDL mismatch: {0}")]
    SchemaMismatch(String),
}

/// Result type for vega-ingest operations.
pub type Result<T> = std::result::Result<T, Error>;

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = Error::Config("KAFKA_ADDR must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: KAFKA_ADDR must not be empty"
        );
    }

    #[test]
    fn unknown_sec_event_kind_display() {
        let err = Error::UnknownSecEventKind("ProcessLoader".to_string());
        assert_eq!(err.to_string(), "unknown sec event kind: ProcessLoader");
    }

    #[test]
    fn invalid_ip_address_display() {
        let err = Error::InvalidIpAddress("not-an-ip".to_string());
        assert_eq!(err.to_string(), "invalid ip address: not-an-ip");
    }

    #[test]
    fn schema_mismatch_display() {
        let err = Error::SchemaMismatch("column count mismatch".to_string());
        assert_eq!(err.to_string(), "schema/DDL mismatch: column count mismatch");
    }

    #[test]
    fn json_error_from() {
        let json_err = serde_json::from_str::<i32>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "socket missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("socket missing"));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }

    #[test]
    fn error_propagation_with_question_mark() {
        fn fails() -> Result<()> {
            Err(Error::Config("bad".to_string()))
        }
        fn calls() -> Result<()> {
            fails()?;
            Ok(())
        }
        assert!(calls().is_err());
    }
}
