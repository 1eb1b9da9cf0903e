//! Error types for the Sparkplug edge node.

use crate::types::DataType;
use thiserror::Error;

/// Result type alias for Sparkplug operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur when running a Sparkplug edge node.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to connect to the MQTT broker.
    #[error("Failed to connect to broker: {0}")]
    ConnectionFailed(String),

    /// A transport operation other than connect or publish failed.
    #[error("Operation failed: {operation}: {details}")]
    OperationFailed {
        /// The operation that failed
        operation: &'static str,
        /// Additional details about the failure
        details: String,
    },

    /// Failed to publish a message.
    #[error("Failed to publish {message_type}: {details}")]
    PublishFailed {
        /// The type of message that failed to publish
        message_type: &'static str,
        /// Additional details about the failure
        details: String,
    },

    /// Failed to parse a payload.
    #[error("Failed to parse payload: {0}")]
    ParseFailed(#[from] prost::DecodeError),

    /// Failed to parse a primary host STATE payload.
    #[error("Invalid host state payload: {0}")]
    StatePayload(#[from] serde_json::Error),

    /// A topic string is not a valid Sparkplug node or STATE topic.
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    /// Invalid metric index.
    #[error("Invalid metric index: {index} (payload has {count} metrics)")]
    InvalidMetricIndex {
        /// The invalid index that was requested
        index: usize,
        /// The actual metric count in the payload
        count: usize,
    },

    /// The named metric is not registered.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// No command is registered under this name.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// A metric with this name is already registered.
    #[error("Metric already exists: {0}")]
    DuplicateMetric(String),

    /// A value does not match the declared datatype.
    #[error("Type mismatch: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        /// The declared datatype
        expected: DataType,
        /// The datatype of the supplied value
        actual: DataType,
    },

    /// A DataSet row or header does not have one element per column.
    #[error("DataSet arity mismatch: expected {expected} elements, got {actual}")]
    RowArity {
        /// Number of columns
        expected: usize,
        /// Number of supplied elements
        actual: usize,
    },

    /// The datatype has no encoding in this implementation.
    #[error("Unsupported datatype: {0:?}")]
    UnsupportedDataType(DataType),

    /// A datatype code on the wire does not name a Sparkplug datatype.
    #[error("Invalid datatype code: {0}")]
    InvalidDataTypeCode(u32),

    /// A packed array has a byte length that cannot hold whole elements.
    #[error("Invalid {datatype:?} length: {len} bytes is not valid for element width {width}")]
    InvalidArrayLength {
        /// The array datatype being decoded
        datatype: DataType,
        /// The byte length received
        len: usize,
        /// The element width in bytes
        width: usize,
    },

    /// A decoded metric carries no value slot matching its datatype.
    #[error("Metric {name:?} has no value for datatype {datatype:?}")]
    MissingValue {
        /// The metric name, if present
        name: Option<String>,
        /// The datatype the value was extracted for
        datatype: DataType,
    },

    /// A decoded metric carries no datatype and none was known.
    #[error("Metric {0:?} has no datatype")]
    MissingDataType(Option<String>),

    /// Reading or writing the bdSeq store failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// UTF-8 conversion error.
    #[error("Invalid UTF-8 string: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    /// String contains null byte.
    #[error("String contains null byte: {0}")]
    NulError(#[from] std::ffi::NulError),
}
