//! The node's metric table.

use crate::error::{Error, Result};
use crate::types::{DataType, Metric, MetricValue};
use indexmap::IndexMap;

/// Values within this distance of each other count as unchanged floats.
pub const FLOAT_TOLERANCE: f64 = 1e-5;

/// Datatype and current value of a registered metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEntry {
    /// Declared datatype.
    pub datatype: DataType,
    /// Current value.
    pub value: MetricValue,
    /// Optional alias announced in the birth certificate.
    pub alias: Option<u64>,
}

/// Insertion-ordered mapping from metric name to [`MetricEntry`].
///
/// Iteration order is registration order, which is also the order metrics
/// appear in a birth certificate.
#[derive(Debug, Clone, Default)]
pub struct MetricStore {
    entries: IndexMap<String, MetricEntry>,
}

impl MetricStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new metric.
    ///
    /// Fails if the name is taken or the value does not match `datatype`.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        datatype: DataType,
        value: MetricValue,
    ) -> Result<()> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(Error::DuplicateMetric(name));
        }
        check_type(datatype, &value)?;
        self.entries.insert(
            name,
            MetricEntry {
                datatype,
                value,
                alias: None,
            },
        );
        Ok(())
    }

    /// Removes a metric, returning its entry. Unknown names are a no-op.
    pub fn remove(&mut self, name: &str) -> Option<MetricEntry> {
        self.entries.shift_remove(name)
    }

    /// Stores a new value for an existing metric.
    ///
    /// Returns `Ok(true)` if the value changed and `Ok(false)` if it is
    /// equivalent to the stored one, in which case nothing is written.
    pub fn update(&mut self, name: &str, value: MetricValue) -> Result<bool> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| Error::UnknownMetric(name.to_string()))?;
        check_type(entry.datatype, &value)?;
        if values_equivalent(&entry.value, &value) {
            return Ok(false);
        }
        entry.value = value;
        Ok(true)
    }

    /// Sets the alias announced for a metric.
    pub fn set_alias(&mut self, name: &str, alias: u64) -> Result<()> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| Error::UnknownMetric(name.to_string()))?;
        entry.alias = Some(alias);
        Ok(())
    }

    /// Looks up a metric.
    pub fn get(&self, name: &str) -> Option<&MetricEntry> {
        self.entries.get(name)
    }

    /// Returns the declared datatype of a metric.
    pub fn datatype(&self, name: &str) -> Option<DataType> {
        self.entries.get(name).map(|e| e.datatype)
    }

    /// Returns true if the metric is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered metrics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no metrics are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates names and entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Builds a wire-ready [`Metric`] for one entry, stamped with `timestamp`.
    pub fn snapshot(&self, name: &str, timestamp: u64) -> Option<Metric> {
        self.entries.get(name).map(|e| to_metric(name, e, timestamp))
    }

    /// Builds wire-ready metrics for every entry, in registration order.
    pub fn snapshot_all(&self, timestamp: u64) -> Vec<Metric> {
        self.entries
            .iter()
            .map(|(name, e)| to_metric(name, e, timestamp))
            .collect()
    }
}

fn to_metric(name: &str, entry: &MetricEntry, timestamp: u64) -> Metric {
    Metric {
        name: Some(name.to_string()),
        alias: entry.alias,
        timestamp: Some(timestamp),
        datatype: entry.datatype,
        value: entry.value.clone(),
    }
}

fn check_type(expected: DataType, value: &MetricValue) -> Result<()> {
    match value.datatype() {
        Some(actual) if actual != expected => Err(Error::TypeMismatch { expected, actual }),
        _ => Ok(()),
    }
}

/// Report-by-exception comparison.
///
/// Two values are equivalent if they are equal, or if both are floats of the
/// same width that differ by less than [`FLOAT_TOLERANCE`]. Values of
/// different kinds are never equivalent.
pub fn values_equivalent(a: &MetricValue, b: &MetricValue) -> bool {
    match (a, b) {
        (MetricValue::Float(x), MetricValue::Float(y)) => {
            x == y || (f64::from(*x) - f64::from(*y)).abs() < FLOAT_TOLERANCE
        }
        (MetricValue::Double(x), MetricValue::Double(y)) => {
            x == y || (x - y).abs() < FLOAT_TOLERANCE
        }
        _ => a == b,
    }
}
