//! Common types for the Sparkplug API.

use crate::dataset::DataSet;
use crate::error::Error;

/// Sparkplug B data types, numbered as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DataType {
    /// Unknown or unsupported type
    Unknown = 0,
    /// Signed 8-bit integer
    Int8 = 1,
    /// Signed 16-bit integer
    Int16 = 2,
    /// Signed 32-bit integer
    Int32 = 3,
    /// Signed 64-bit integer
    Int64 = 4,
    /// Unsigned 8-bit integer
    UInt8 = 5,
    /// Unsigned 16-bit integer
    UInt16 = 6,
    /// Unsigned 32-bit integer
    UInt32 = 7,
    /// Unsigned 64-bit integer
    UInt64 = 8,
    /// 32-bit floating point
    Float = 9,
    /// 64-bit floating point
    Double = 10,
    /// Boolean value
    Boolean = 11,
    /// String value
    String = 12,
    /// DateTime value (milliseconds since Unix epoch)
    DateTime = 13,
    /// Text value
    Text = 14,
    /// UUID carried as a string
    Uuid = 15,
    /// Tabular value
    DataSet = 16,
    /// Raw bytes
    Bytes = 17,
    /// File contents
    File = 18,
    /// Template (not implemented)
    Template = 19,
    /// Property set (not implemented)
    PropertySet = 20,
    /// Property set list (not implemented)
    PropertySetList = 21,
    /// Packed signed 8-bit integers
    Int8Array = 22,
    /// Packed signed 16-bit integers
    Int16Array = 23,
    /// Packed signed 32-bit integers
    Int32Array = 24,
    /// Packed signed 64-bit integers
    Int64Array = 25,
    /// Packed unsigned 8-bit integers
    UInt8Array = 26,
    /// Packed unsigned 16-bit integers
    UInt16Array = 27,
    /// Packed unsigned 32-bit integers
    UInt32Array = 28,
    /// Packed unsigned 64-bit integers
    UInt64Array = 29,
    /// Packed 32-bit floats
    FloatArray = 30,
    /// Packed 64-bit floats
    DoubleArray = 31,
    /// Count-prefixed bit-packed booleans
    BooleanArray = 32,
    /// NUL-terminated strings
    StringArray = 33,
    /// Packed DateTime values
    DateTimeArray = 34,
}

impl DataType {
    /// Returns the wire code of this datatype.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Returns the element width in bytes for fixed-width array types.
    pub fn element_width(self) -> Option<usize> {
        match self {
            DataType::Int8Array | DataType::UInt8Array => Some(1),
            DataType::Int16Array | DataType::UInt16Array => Some(2),
            DataType::Int32Array | DataType::UInt32Array | DataType::FloatArray => Some(4),
            DataType::Int64Array
            | DataType::UInt64Array
            | DataType::DoubleArray
            | DataType::DateTimeArray => Some(8),
            _ => None,
        }
    }

    /// Returns true for the scalar types a DataSet column may hold.
    pub fn is_dataset_scalar(self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float
                | DataType::Double
                | DataType::Boolean
                | DataType::String
                | DataType::DateTime
                | DataType::Text
                | DataType::Uuid
        )
    }
}

impl TryFrom<u32> for DataType {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self, Error> {
        let dt = match code {
            0 => DataType::Unknown,
            1 => DataType::Int8,
            2 => DataType::Int16,
            3 => DataType::Int32,
            4 => DataType::Int64,
            5 => DataType::UInt8,
            6 => DataType::UInt16,
            7 => DataType::UInt32,
            8 => DataType::UInt64,
            9 => DataType::Float,
            10 => DataType::Double,
            11 => DataType::Boolean,
            12 => DataType::String,
            13 => DataType::DateTime,
            14 => DataType::Text,
            15 => DataType::Uuid,
            16 => DataType::DataSet,
            17 => DataType::Bytes,
            18 => DataType::File,
            19 => DataType::Template,
            20 => DataType::PropertySet,
            21 => DataType::PropertySetList,
            22 => DataType::Int8Array,
            23 => DataType::Int16Array,
            24 => DataType::Int32Array,
            25 => DataType::Int64Array,
            26 => DataType::UInt8Array,
            27 => DataType::UInt16Array,
            28 => DataType::UInt32Array,
            29 => DataType::UInt64Array,
            30 => DataType::FloatArray,
            31 => DataType::DoubleArray,
            32 => DataType::BooleanArray,
            33 => DataType::StringArray,
            34 => DataType::DateTimeArray,
            other => return Err(Error::InvalidDataTypeCode(other)),
        };
        Ok(dt)
    }
}

/// Metric value type.
///
/// Each variant names exactly one Sparkplug datatype, so a value always knows
/// how it is carried on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// Signed 8-bit integer value
    Int8(i8),
    /// Signed 16-bit integer value
    Int16(i16),
    /// Signed 32-bit integer value
    Int32(i32),
    /// Signed 64-bit integer value
    Int64(i64),
    /// Unsigned 8-bit integer value
    UInt8(u8),
    /// Unsigned 16-bit integer value
    UInt16(u16),
    /// Unsigned 32-bit integer value
    UInt32(u32),
    /// Unsigned 64-bit integer value
    UInt64(u64),
    /// 32-bit floating point value
    Float(f32),
    /// 64-bit floating point value
    Double(f64),
    /// Boolean value
    Boolean(bool),
    /// String value
    String(String),
    /// DateTime value in milliseconds since Unix epoch
    DateTime(u64),
    /// Text value
    Text(String),
    /// UUID value
    Uuid(String),
    /// DataSet value
    DataSet(DataSet),
    /// Bytes value
    Bytes(Vec<u8>),
    /// File value
    File(Vec<u8>),
    /// Int8 array
    Int8Array(Vec<i8>),
    /// Int16 array
    Int16Array(Vec<i16>),
    /// Int32 array
    Int32Array(Vec<i32>),
    /// Int64 array
    Int64Array(Vec<i64>),
    /// UInt8 array
    UInt8Array(Vec<u8>),
    /// UInt16 array
    UInt16Array(Vec<u16>),
    /// UInt32 array
    UInt32Array(Vec<u32>),
    /// UInt64 array
    UInt64Array(Vec<u64>),
    /// Float array
    FloatArray(Vec<f32>),
    /// Double array
    DoubleArray(Vec<f64>),
    /// Boolean array
    BooleanArray(Vec<bool>),
    /// String array
    StringArray(Vec<String>),
    /// DateTime array
    DateTimeArray(Vec<u64>),
    /// Null value
    Null,
}

impl MetricValue {
    /// Returns the datatype this value is carried as, or `None` for `Null`.
    pub fn datatype(&self) -> Option<DataType> {
        let dt = match self {
            MetricValue::Int8(_) => DataType::Int8,
            MetricValue::Int16(_) => DataType::Int16,
            MetricValue::Int32(_) => DataType::Int32,
            MetricValue::Int64(_) => DataType::Int64,
            MetricValue::UInt8(_) => DataType::UInt8,
            MetricValue::UInt16(_) => DataType::UInt16,
            MetricValue::UInt32(_) => DataType::UInt32,
            MetricValue::UInt64(_) => DataType::UInt64,
            MetricValue::Float(_) => DataType::Float,
            MetricValue::Double(_) => DataType::Double,
            MetricValue::Boolean(_) => DataType::Boolean,
            MetricValue::String(_) => DataType::String,
            MetricValue::DateTime(_) => DataType::DateTime,
            MetricValue::Text(_) => DataType::Text,
            MetricValue::Uuid(_) => DataType::Uuid,
            MetricValue::DataSet(_) => DataType::DataSet,
            MetricValue::Bytes(_) => DataType::Bytes,
            MetricValue::File(_) => DataType::File,
            MetricValue::Int8Array(_) => DataType::Int8Array,
            MetricValue::Int16Array(_) => DataType::Int16Array,
            MetricValue::Int32Array(_) => DataType::Int32Array,
            MetricValue::Int64Array(_) => DataType::Int64Array,
            MetricValue::UInt8Array(_) => DataType::UInt8Array,
            MetricValue::UInt16Array(_) => DataType::UInt16Array,
            MetricValue::UInt32Array(_) => DataType::UInt32Array,
            MetricValue::UInt64Array(_) => DataType::UInt64Array,
            MetricValue::FloatArray(_) => DataType::FloatArray,
            MetricValue::DoubleArray(_) => DataType::DoubleArray,
            MetricValue::BooleanArray(_) => DataType::BooleanArray,
            MetricValue::StringArray(_) => DataType::StringArray,
            MetricValue::DateTimeArray(_) => DataType::DateTimeArray,
            MetricValue::Null => return None,
        };
        Some(dt)
    }

    /// Returns true if the value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, MetricValue::Null)
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Boolean(v)
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        MetricValue::Int32(v)
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int64(v)
    }
}

impl From<f32> for MetricValue {
    fn from(v: f32) -> Self {
        MetricValue::Float(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Double(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::String(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::String(v)
    }
}

impl From<DataSet> for MetricValue {
    fn from(v: DataSet) -> Self {
        MetricValue::DataSet(v)
    }
}

/// Metric information.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Metric name (if present)
    pub name: Option<String>,
    /// Metric alias (if present)
    pub alias: Option<u64>,
    /// Metric timestamp in milliseconds since Unix epoch (if present)
    pub timestamp: Option<u64>,
    /// Data type
    pub datatype: DataType,
    /// Metric value (or Null)
    pub value: MetricValue,
}

impl Metric {
    /// Creates a named metric whose datatype follows from its value.
    ///
    /// A `Null` value produces a metric of datatype `Unknown`; use
    /// [`Metric::null`] to keep the declared type.
    pub fn new(name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        let value = value.into();
        Self {
            name: Some(name.into()),
            alias: None,
            timestamp: None,
            datatype: value.datatype().unwrap_or(DataType::Unknown),
            value,
        }
    }

    /// Creates a named null metric of the given datatype.
    pub fn null(name: impl Into<String>, datatype: DataType) -> Self {
        Self {
            name: Some(name.into()),
            alias: None,
            timestamp: None,
            datatype,
            value: MetricValue::Null,
        }
    }

    /// Sets the alias.
    pub fn with_alias(mut self, alias: u64) -> Self {
        self.alias = Some(alias);
        self
    }

    /// Sets the metric timestamp.
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Current time in milliseconds since Unix epoch.
pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
