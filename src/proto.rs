//! Sparkplug B wire schema.
//!
//! Hand-written `prost` messages mirroring `sparkplug_b.proto`
//! (package `org.eclipse.tahu.protobuf`). Field numbers and proto2 field
//! rules match the published schema so payloads interoperate with standard
//! host applications. Template, PropertySet and extension values are not
//! modelled; the decoder skips them as unknown fields.

/// Top-level Sparkplug B payload.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Payload {
    /// Payload timestamp in milliseconds since Unix epoch.
    #[prost(uint64, optional, tag = "1")]
    pub timestamp: Option<u64>,
    /// Metrics in publish order.
    #[prost(message, repeated, tag = "2")]
    pub metrics: Vec<Metric>,
    /// Message sequence number.
    #[prost(uint64, optional, tag = "3")]
    pub seq: Option<u64>,
    /// Payload UUID.
    #[prost(string, optional, tag = "4")]
    pub uuid: Option<String>,
    /// Opaque payload body.
    #[prost(bytes = "vec", optional, tag = "5")]
    pub body: Option<Vec<u8>>,
}

/// A single metric on the wire.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Metric {
    /// Metric name.
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    /// Metric alias.
    #[prost(uint64, optional, tag = "2")]
    pub alias: Option<u64>,
    /// Metric timestamp in milliseconds since Unix epoch.
    #[prost(uint64, optional, tag = "3")]
    pub timestamp: Option<u64>,
    /// Datatype code.
    #[prost(uint32, optional, tag = "4")]
    pub datatype: Option<u32>,
    /// Historical flag.
    #[prost(bool, optional, tag = "5")]
    pub is_historical: Option<bool>,
    /// Transient flag.
    #[prost(bool, optional, tag = "6")]
    pub is_transient: Option<bool>,
    /// Null flag.
    #[prost(bool, optional, tag = "7")]
    pub is_null: Option<bool>,
    /// Metric metadata.
    #[prost(message, optional, tag = "8")]
    pub metadata: Option<MetaData>,
    /// The value slot.
    #[prost(oneof = "metric::Value", tags = "10, 11, 12, 13, 14, 15, 16, 17")]
    pub value: Option<metric::Value>,
}

/// Nested types for [`Metric`].
pub mod metric {
    /// Metric value slots.
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Value {
        /// 32-bit integer slot.
        #[prost(uint32, tag = "10")]
        IntValue(u32),
        /// 64-bit integer slot.
        #[prost(uint64, tag = "11")]
        LongValue(u64),
        /// 32-bit float slot.
        #[prost(float, tag = "12")]
        FloatValue(f32),
        /// 64-bit float slot.
        #[prost(double, tag = "13")]
        DoubleValue(f64),
        /// Boolean slot.
        #[prost(bool, tag = "14")]
        BooleanValue(bool),
        /// UTF-8 string slot.
        #[prost(string, tag = "15")]
        StringValue(String),
        /// Raw byte slot.
        #[prost(bytes, tag = "16")]
        BytesValue(Vec<u8>),
        /// DataSet slot.
        #[prost(message, tag = "17")]
        DatasetValue(super::DataSet),
    }
}

/// Metric metadata.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MetaData {
    /// Multi-part flag.
    #[prost(bool, optional, tag = "1")]
    pub is_multi_part: Option<bool>,
    /// Content type.
    #[prost(string, optional, tag = "2")]
    pub content_type: Option<String>,
    /// Size in bytes.
    #[prost(uint64, optional, tag = "3")]
    pub size: Option<u64>,
    /// Multi-part sequence.
    #[prost(uint64, optional, tag = "4")]
    pub seq: Option<u64>,
    /// File name.
    #[prost(string, optional, tag = "5")]
    pub file_name: Option<String>,
    /// File type.
    #[prost(string, optional, tag = "6")]
    pub file_type: Option<String>,
    /// MD5 checksum.
    #[prost(string, optional, tag = "7")]
    pub md5: Option<String>,
    /// Description.
    #[prost(string, optional, tag = "8")]
    pub description: Option<String>,
}

/// DataSet on the wire.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DataSet {
    /// Column count.
    #[prost(uint64, optional, tag = "1")]
    pub num_of_columns: Option<u64>,
    /// Column names.
    #[prost(string, repeated, tag = "2")]
    pub columns: Vec<String>,
    /// Column datatype codes.
    #[prost(uint32, repeated, packed = "false", tag = "3")]
    pub types: Vec<u32>,
    /// Rows.
    #[prost(message, repeated, tag = "4")]
    pub rows: Vec<Row>,
}

/// A DataSet row.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Row {
    /// One element per column.
    #[prost(message, repeated, tag = "1")]
    pub elements: Vec<DataSetValue>,
}

/// A DataSet element.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DataSetValue {
    /// The value slot.
    #[prost(oneof = "data_set_value::Value", tags = "1, 2, 3, 4, 5, 6")]
    pub value: Option<data_set_value::Value>,
}

/// Nested types for [`DataSetValue`].
pub mod data_set_value {
    /// DataSet element value slots.
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Value {
        /// 32-bit integer slot.
        #[prost(uint32, tag = "1")]
        IntValue(u32),
        /// 64-bit integer slot.
        #[prost(uint64, tag = "2")]
        LongValue(u64),
        /// 32-bit float slot.
        #[prost(float, tag = "3")]
        FloatValue(f32),
        /// 64-bit float slot.
        #[prost(double, tag = "4")]
        DoubleValue(f64),
        /// Boolean slot.
        #[prost(bool, tag = "5")]
        BooleanValue(bool),
        /// UTF-8 string slot.
        #[prost(string, tag = "6")]
        StringValue(String),
    }
}
