//! Sparkplug payload building and parsing.
//!
//! [`PayloadBuilder`] turns [`Metric`]s into the Sparkplug B binary format and
//! [`Payload`] reads it back. Scalar values map directly onto the wire value
//! slots; array values are packed into the bytes slot:
//!
//! - fixed-width numeric arrays as little-endian elements,
//! - boolean arrays as a 4-byte little-endian count followed by bits packed
//!   most-significant-bit first,
//! - string arrays as NUL-terminated UTF-8 strings, back to back.

use crate::dataset::DataSet;
use crate::error::{Error, Result};
use crate::proto::{self, data_set_value, metric::Value};
use crate::types::{DataType, Metric, MetricValue};
use prost::Message as _;
use std::ffi::CString;

/// A Sparkplug payload builder for creating NBIRTH, NDATA, and other messages.
///
/// # Example
///
/// ```
/// use sparkplug_edge::{Metric, Payload, PayloadBuilder};
///
/// let mut builder = PayloadBuilder::new();
/// builder
///     .set_seq(0)
///     .add_metric(&Metric::new("Temperature", 20.5))?
///     .add_metric(&Metric::new("Active", true))?;
///
/// let bytes = builder.serialize();
/// let payload = Payload::parse(&bytes)?;
/// assert_eq!(payload.metric_count(), 2);
/// # Ok::<(), sparkplug_edge::Error>(())
/// ```
#[derive(Clone, Default)]
pub struct PayloadBuilder {
    inner: proto::Payload,
}

impl PayloadBuilder {
    /// Creates a new, empty payload builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the payload-level timestamp in milliseconds since Unix epoch.
    pub fn set_timestamp(&mut self, timestamp: u64) -> &mut Self {
        self.inner.timestamp = Some(timestamp);
        self
    }

    /// Sets the sequence number.
    pub fn set_seq(&mut self, seq: u64) -> &mut Self {
        self.inner.seq = Some(seq);
        self
    }

    /// Sets the payload UUID.
    pub fn set_uuid(&mut self, uuid: impl Into<String>) -> &mut Self {
        self.inner.uuid = Some(uuid.into());
        self
    }

    /// Sets the opaque payload body.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.inner.body = Some(body.into());
        self
    }

    /// Adds a metric.
    ///
    /// Returns an error, leaving the payload unchanged, if the metric cannot
    /// be encoded.
    pub fn add_metric(&mut self, metric: &Metric) -> Result<&mut Self> {
        let encoded = encode_metric(metric)?;
        self.inner.metrics.push(encoded);
        Ok(self)
    }

    /// Adds every metric that can be encoded.
    ///
    /// Metrics that fail to encode are logged and skipped; the rest are
    /// still added.
    pub fn add_metrics<'a>(&mut self, metrics: impl IntoIterator<Item = &'a Metric>) -> &mut Self {
        for metric in metrics {
            if let Err(e) = self.add_metric(metric) {
                log::warn!("Skipping metric {:?}: {}", metric.name, e);
            }
        }
        self
    }

    /// Number of metrics added so far.
    pub fn metric_count(&self) -> usize {
        self.inner.metrics.len()
    }

    /// Serializes the payload to binary protobuf format.
    pub fn serialize(&self) -> Vec<u8> {
        self.inner.encode_to_vec()
    }
}

/// A parsed Sparkplug payload (read-only).
///
/// Every wire field is kept as an optional value; use [`Payload::metrics`]
/// or [`extract_value`] to get typed values.
#[derive(Clone, Debug)]
pub struct Payload {
    inner: proto::Payload,
}

impl Payload {
    /// Parses a payload from binary protobuf data.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let inner = proto::Payload::decode(data)?;
        Ok(Self { inner })
    }

    /// Gets the payload timestamp, if present.
    pub fn timestamp(&self) -> Option<u64> {
        self.inner.timestamp
    }

    /// Gets the sequence number, if present.
    pub fn seq(&self) -> Option<u64> {
        self.inner.seq
    }

    /// Gets the payload UUID, if present.
    pub fn uuid(&self) -> Option<&str> {
        self.inner.uuid.as_deref()
    }

    /// Gets the payload body, if present.
    pub fn body(&self) -> Option<&[u8]> {
        self.inner.body.as_deref()
    }

    /// Gets the number of metrics in the payload.
    pub fn metric_count(&self) -> usize {
        self.inner.metrics.len()
    }

    /// The metrics exactly as decoded from the wire.
    pub fn raw_metrics(&self) -> &[proto::Metric] {
        &self.inner.metrics
    }

    /// Gets a metric by index.
    pub fn metric_at(&self, index: usize) -> Result<Metric> {
        let raw = self
            .inner
            .metrics
            .get(index)
            .ok_or(Error::InvalidMetricIndex {
                index,
                count: self.metric_count(),
            })?;
        decode_metric(raw, None)
    }

    /// Returns an iterator over the metrics.
    ///
    /// A metric that fails to decode yields an error without affecting the
    /// others.
    pub fn metrics(&self) -> impl Iterator<Item = Result<Metric>> + '_ {
        self.inner.metrics.iter().map(|m| decode_metric(m, None))
    }
}

/// Encodes one metric into its wire form.
pub fn encode_metric(metric: &Metric) -> Result<proto::Metric> {
    if matches!(
        metric.datatype,
        DataType::Unknown | DataType::Template | DataType::PropertySet | DataType::PropertySetList
    ) {
        return Err(Error::UnsupportedDataType(metric.datatype));
    }

    let mut out = proto::Metric {
        name: metric.name.clone(),
        alias: metric.alias,
        timestamp: metric.timestamp,
        datatype: Some(metric.datatype.code()),
        ..Default::default()
    };

    match metric.value.datatype() {
        None => out.is_null = Some(true),
        Some(actual) if actual != metric.datatype => {
            return Err(Error::TypeMismatch {
                expected: metric.datatype,
                actual,
            });
        }
        Some(_) => out.value = Some(encode_value(&metric.value)?),
    }
    Ok(out)
}

/// Encodes a non-null value into its wire slot.
fn encode_value(value: &MetricValue) -> Result<Value> {
    let slot = match value {
        MetricValue::Int8(v) => Value::IntValue(*v as i32 as u32),
        MetricValue::Int16(v) => Value::IntValue(*v as i32 as u32),
        MetricValue::Int32(v) => Value::IntValue(*v as u32),
        MetricValue::UInt8(v) => Value::IntValue(u32::from(*v)),
        MetricValue::UInt16(v) => Value::IntValue(u32::from(*v)),
        MetricValue::UInt32(v) => Value::IntValue(*v),
        MetricValue::Int64(v) => Value::LongValue(*v as u64),
        MetricValue::UInt64(v) | MetricValue::DateTime(v) => Value::LongValue(*v),
        MetricValue::Float(v) => Value::FloatValue(*v),
        MetricValue::Double(v) => Value::DoubleValue(*v),
        MetricValue::Boolean(v) => Value::BooleanValue(*v),
        MetricValue::String(v) | MetricValue::Text(v) | MetricValue::Uuid(v) => {
            Value::StringValue(v.clone())
        }
        MetricValue::Bytes(v) | MetricValue::File(v) => Value::BytesValue(v.clone()),
        MetricValue::DataSet(ds) => Value::DatasetValue(encode_dataset(ds)?),
        MetricValue::Int8Array(v) => Value::BytesValue(pack(v, i8::to_le_bytes)),
        MetricValue::Int16Array(v) => Value::BytesValue(pack(v, i16::to_le_bytes)),
        MetricValue::Int32Array(v) => Value::BytesValue(pack(v, i32::to_le_bytes)),
        MetricValue::Int64Array(v) => Value::BytesValue(pack(v, i64::to_le_bytes)),
        MetricValue::UInt8Array(v) => Value::BytesValue(v.clone()),
        MetricValue::UInt16Array(v) => Value::BytesValue(pack(v, u16::to_le_bytes)),
        MetricValue::UInt32Array(v) => Value::BytesValue(pack(v, u32::to_le_bytes)),
        MetricValue::UInt64Array(v) | MetricValue::DateTimeArray(v) => {
            Value::BytesValue(pack(v, u64::to_le_bytes))
        }
        MetricValue::FloatArray(v) => Value::BytesValue(pack(v, f32::to_le_bytes)),
        MetricValue::DoubleArray(v) => Value::BytesValue(pack(v, f64::to_le_bytes)),
        MetricValue::BooleanArray(v) => Value::BytesValue(pack_bools(v)),
        MetricValue::StringArray(v) => Value::BytesValue(pack_strings(v)?),
        MetricValue::Null => {
            return Err(Error::MissingValue {
                name: None,
                datatype: DataType::Unknown,
            })
        }
    };
    Ok(slot)
}

fn encode_dataset(ds: &DataSet) -> Result<proto::DataSet> {
    let rows = ds
        .rows()
        .iter()
        .map(|row| {
            let elements = row
                .iter()
                .map(|element| {
                    encode_dataset_value(element).map(|value| proto::DataSetValue {
                        value: Some(value),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(proto::Row { elements })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(proto::DataSet {
        num_of_columns: Some(ds.num_of_columns() as u64),
        columns: ds.columns().to_vec(),
        types: ds.types().iter().map(|dt| dt.code()).collect(),
        rows,
    })
}

fn encode_dataset_value(value: &MetricValue) -> Result<data_set_value::Value> {
    use data_set_value::Value as V;

    let slot = match value {
        MetricValue::Int8(v) => V::IntValue(*v as i32 as u32),
        MetricValue::Int16(v) => V::IntValue(*v as i32 as u32),
        MetricValue::Int32(v) => V::IntValue(*v as u32),
        MetricValue::UInt8(v) => V::IntValue(u32::from(*v)),
        MetricValue::UInt16(v) => V::IntValue(u32::from(*v)),
        MetricValue::UInt32(v) => V::IntValue(*v),
        MetricValue::Int64(v) => V::LongValue(*v as u64),
        MetricValue::UInt64(v) | MetricValue::DateTime(v) => V::LongValue(*v),
        MetricValue::Float(v) => V::FloatValue(*v),
        MetricValue::Double(v) => V::DoubleValue(*v),
        MetricValue::Boolean(v) => V::BooleanValue(*v),
        MetricValue::String(v) | MetricValue::Text(v) | MetricValue::Uuid(v) => {
            V::StringValue(v.clone())
        }
        other => {
            return Err(Error::UnsupportedDataType(
                other.datatype().unwrap_or(DataType::Unknown),
            ))
        }
    };
    Ok(slot)
}

/// Decodes a wire metric into a typed [`Metric`].
///
/// `hint` is used as the datatype when the metric carries none.
pub fn decode_metric(metric: &proto::Metric, hint: Option<DataType>) -> Result<Metric> {
    let datatype = resolve_datatype(metric, hint)?;
    Ok(Metric {
        name: metric.name.clone(),
        alias: metric.alias,
        timestamp: metric.timestamp,
        datatype,
        value: extract_value(metric, hint)?,
    })
}

fn resolve_datatype(metric: &proto::Metric, hint: Option<DataType>) -> Result<DataType> {
    match metric.datatype {
        Some(code) => DataType::try_from(code),
        None => hint.ok_or_else(|| Error::MissingDataType(metric.name.clone())),
    }
}

/// Extracts the typed value of a decoded metric.
///
/// The metric's own datatype takes precedence; `hint` (typically the
/// datatype from the last birth) is used when the wire omits it.
pub fn extract_value(metric: &proto::Metric, hint: Option<DataType>) -> Result<MetricValue> {
    let datatype = resolve_datatype(metric, hint)?;
    if metric.is_null == Some(true) {
        return Ok(MetricValue::Null);
    }

    let missing = || Error::MissingValue {
        name: metric.name.clone(),
        datatype,
    };
    let slot = metric.value.as_ref().ok_or_else(missing)?;

    let value = match (datatype, slot) {
        (DataType::Int8, Value::IntValue(v)) => MetricValue::Int8(*v as i8),
        (DataType::Int16, Value::IntValue(v)) => MetricValue::Int16(*v as i16),
        (DataType::Int32, Value::IntValue(v)) => MetricValue::Int32(*v as i32),
        (DataType::UInt8, Value::IntValue(v)) => MetricValue::UInt8(*v as u8),
        (DataType::UInt16, Value::IntValue(v)) => MetricValue::UInt16(*v as u16),
        (DataType::UInt32, Value::IntValue(v)) => MetricValue::UInt32(*v),
        (DataType::Int64, Value::LongValue(v)) => MetricValue::Int64(*v as i64),
        (DataType::UInt64, Value::LongValue(v)) => MetricValue::UInt64(*v),
        (DataType::DateTime, Value::LongValue(v)) => MetricValue::DateTime(*v),
        (DataType::Float, Value::FloatValue(v)) => MetricValue::Float(*v),
        (DataType::Double, Value::DoubleValue(v)) => MetricValue::Double(*v),
        (DataType::Boolean, Value::BooleanValue(v)) => MetricValue::Boolean(*v),
        (DataType::String, Value::StringValue(v)) => MetricValue::String(v.clone()),
        (DataType::Text, Value::StringValue(v)) => MetricValue::Text(v.clone()),
        (DataType::Uuid, Value::StringValue(v)) => MetricValue::Uuid(v.clone()),
        (DataType::Bytes, Value::BytesValue(v)) => MetricValue::Bytes(v.clone()),
        (DataType::File, Value::BytesValue(v)) => MetricValue::File(v.clone()),
        (DataType::DataSet, Value::DatasetValue(ds)) => MetricValue::DataSet(decode_dataset(ds)?),
        (DataType::Int8Array, Value::BytesValue(b)) => {
            MetricValue::Int8Array(unpack(DataType::Int8Array, b, i8::from_le_bytes)?)
        }
        (DataType::Int16Array, Value::BytesValue(b)) => {
            MetricValue::Int16Array(unpack(DataType::Int16Array, b, i16::from_le_bytes)?)
        }
        (DataType::Int32Array, Value::BytesValue(b)) => {
            MetricValue::Int32Array(unpack(DataType::Int32Array, b, i32::from_le_bytes)?)
        }
        (DataType::Int64Array, Value::BytesValue(b)) => {
            MetricValue::Int64Array(unpack(DataType::Int64Array, b, i64::from_le_bytes)?)
        }
        (DataType::UInt8Array, Value::BytesValue(b)) => MetricValue::UInt8Array(b.clone()),
        (DataType::UInt16Array, Value::BytesValue(b)) => {
            MetricValue::UInt16Array(unpack(DataType::UInt16Array, b, u16::from_le_bytes)?)
        }
        (DataType::UInt32Array, Value::BytesValue(b)) => {
            MetricValue::UInt32Array(unpack(DataType::UInt32Array, b, u32::from_le_bytes)?)
        }
        (DataType::UInt64Array, Value::BytesValue(b)) => {
            MetricValue::UInt64Array(unpack(DataType::UInt64Array, b, u64::from_le_bytes)?)
        }
        (DataType::DateTimeArray, Value::BytesValue(b)) => {
            MetricValue::DateTimeArray(unpack(DataType::DateTimeArray, b, u64::from_le_bytes)?)
        }
        (DataType::FloatArray, Value::BytesValue(b)) => {
            MetricValue::FloatArray(unpack(DataType::FloatArray, b, f32::from_le_bytes)?)
        }
        (DataType::DoubleArray, Value::BytesValue(b)) => {
            MetricValue::DoubleArray(unpack(DataType::DoubleArray, b, f64::from_le_bytes)?)
        }
        (DataType::BooleanArray, Value::BytesValue(b)) => MetricValue::BooleanArray(unpack_bools(b)?),
        (DataType::StringArray, Value::BytesValue(b)) => MetricValue::StringArray(unpack_strings(b)?),
        (
            DataType::Unknown
            | DataType::Template
            | DataType::PropertySet
            | DataType::PropertySetList,
            _,
        ) => return Err(Error::UnsupportedDataType(datatype)),
        _ => return Err(missing()),
    };
    Ok(value)
}

fn decode_dataset(ds: &proto::DataSet) -> Result<DataSet> {
    let types = ds
        .types
        .iter()
        .map(|code| DataType::try_from(*code))
        .collect::<Result<Vec<_>>>()?;
    if let Some(n) = ds.num_of_columns {
        if n as usize != ds.columns.len() {
            return Err(Error::RowArity {
                expected: n as usize,
                actual: ds.columns.len(),
            });
        }
    }

    let mut out = DataSet::new(ds.columns.iter().cloned(), types.iter().copied())?;
    for row in &ds.rows {
        if row.elements.len() != types.len() {
            return Err(Error::RowArity {
                expected: types.len(),
                actual: row.elements.len(),
            });
        }
        let elements = row
            .elements
            .iter()
            .zip(&types)
            .map(|(element, dt)| decode_dataset_value(*dt, element))
            .collect::<Result<Vec<_>>>()?;
        out.add_row(elements)?;
    }
    Ok(out)
}

fn decode_dataset_value(datatype: DataType, element: &proto::DataSetValue) -> Result<MetricValue> {
    use data_set_value::Value as V;

    let missing = || Error::MissingValue {
        name: None,
        datatype,
    };
    let slot = element.value.as_ref().ok_or_else(missing)?;
    let value = match (datatype, slot) {
        (DataType::Int8, V::IntValue(v)) => MetricValue::Int8(*v as i8),
        (DataType::Int16, V::IntValue(v)) => MetricValue::Int16(*v as i16),
        (DataType::Int32, V::IntValue(v)) => MetricValue::Int32(*v as i32),
        (DataType::UInt8, V::IntValue(v)) => MetricValue::UInt8(*v as u8),
        (DataType::UInt16, V::IntValue(v)) => MetricValue::UInt16(*v as u16),
        (DataType::UInt32, V::IntValue(v)) => MetricValue::UInt32(*v),
        (DataType::Int64, V::LongValue(v)) => MetricValue::Int64(*v as i64),
        (DataType::UInt64, V::LongValue(v)) => MetricValue::UInt64(*v),
        (DataType::DateTime, V::LongValue(v)) => MetricValue::DateTime(*v),
        (DataType::Float, V::FloatValue(v)) => MetricValue::Float(*v),
        (DataType::Double, V::DoubleValue(v)) => MetricValue::Double(*v),
        (DataType::Boolean, V::BooleanValue(v)) => MetricValue::Boolean(*v),
        (DataType::String, V::StringValue(v)) => MetricValue::String(v.clone()),
        (DataType::Text, V::StringValue(v)) => MetricValue::Text(v.clone()),
        (DataType::Uuid, V::StringValue(v)) => MetricValue::Uuid(v.clone()),
        _ => return Err(missing()),
    };
    Ok(value)
}

fn pack<T, const N: usize>(values: &[T], to_le: impl Fn(T) -> [u8; N]) -> Vec<u8>
where
    T: Copy,
{
    let mut out = Vec::with_capacity(values.len() * N);
    for v in values {
        out.extend_from_slice(&to_le(*v));
    }
    out
}

fn unpack<T, const N: usize>(
    datatype: DataType,
    bytes: &[u8],
    from_le: impl Fn([u8; N]) -> T,
) -> Result<Vec<T>> {
    if bytes.len() % N != 0 {
        return Err(Error::InvalidArrayLength {
            datatype,
            len: bytes.len(),
            width: N,
        });
    }
    Ok(bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut buf = [0u8; N];
            buf.copy_from_slice(chunk);
            from_le(buf)
        })
        .collect())
}

fn pack_bools(values: &[bool]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + values.len().div_ceil(8));
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for chunk in values.chunks(8) {
        let mut byte = 0u8;
        for (i, bit) in chunk.iter().enumerate() {
            if *bit {
                byte |= 0x80 >> i;
            }
        }
        out.push(byte);
    }
    out
}

fn unpack_bools(bytes: &[u8]) -> Result<Vec<bool>> {
    let invalid = || Error::InvalidArrayLength {
        datatype: DataType::BooleanArray,
        len: bytes.len(),
        width: 1,
    };
    if bytes.len() < 4 {
        return Err(invalid());
    }
    let mut count = [0u8; 4];
    count.copy_from_slice(&bytes[..4]);
    let count = u32::from_le_bytes(count) as usize;

    let bits = &bytes[4..];
    if bits.len() != count.div_ceil(8) {
        return Err(invalid());
    }
    Ok((0..count)
        .map(|i| bits[i / 8] & (0x80 >> (i % 8)) != 0)
        .collect())
}

fn pack_strings(values: &[String]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for v in values {
        out.extend_from_slice(CString::new(v.as_str())?.as_bytes_with_nul());
    }
    Ok(out)
}

fn unpack_strings(bytes: &[u8]) -> Result<Vec<String>> {
    let Some((&last, body)) = bytes.split_last() else {
        return Ok(Vec::new());
    };
    if last != 0 {
        return Err(Error::InvalidArrayLength {
            datatype: DataType::StringArray,
            len: bytes.len(),
            width: 1,
        });
    }
    body.split(|b| *b == 0)
        .map(|s| Ok(std::str::from_utf8(s)?.to_string()))
        .collect()
}
