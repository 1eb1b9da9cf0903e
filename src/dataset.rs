//! Sparkplug DataSet values.

use crate::error::{Error, Result};
use crate::types::{DataType, MetricValue};

/// A table of typed columns.
///
/// Every row holds exactly one element per column, and each element matches
/// its column's declared datatype. Only scalar types are allowed as columns.
///
/// # Example
///
/// ```
/// use sparkplug_edge::{DataSet, DataType, MetricValue};
///
/// let mut ds = DataSet::new(["id", "label"], [DataType::Int32, DataType::String])?;
/// ds.add_row(vec![MetricValue::Int32(1), MetricValue::String("pump".into())])?;
/// assert_eq!(ds.rows().len(), 1);
/// # Ok::<(), sparkplug_edge::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    columns: Vec<String>,
    types: Vec<DataType>,
    rows: Vec<Vec<MetricValue>>,
}

impl DataSet {
    /// Creates an empty DataSet with the given column names and types.
    pub fn new<C, T>(columns: C, types: T) -> Result<Self>
    where
        C: IntoIterator,
        C::Item: Into<String>,
        T: IntoIterator<Item = DataType>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let types: Vec<DataType> = types.into_iter().collect();
        if columns.len() != types.len() {
            return Err(Error::RowArity {
                expected: columns.len(),
                actual: types.len(),
            });
        }
        if let Some(dt) = types.iter().find(|dt| !dt.is_dataset_scalar()) {
            return Err(Error::UnsupportedDataType(*dt));
        }
        Ok(Self {
            columns,
            types,
            rows: Vec::new(),
        })
    }

    /// Appends a row after checking its arity and element types.
    ///
    /// On error the DataSet is left unchanged.
    pub fn add_row(&mut self, elements: Vec<MetricValue>) -> Result<&mut Self> {
        if elements.len() != self.columns.len() {
            return Err(Error::RowArity {
                expected: self.columns.len(),
                actual: elements.len(),
            });
        }
        for (element, expected) in elements.iter().zip(&self.types) {
            let actual = element.datatype().unwrap_or(DataType::Unknown);
            if actual != *expected {
                return Err(Error::TypeMismatch {
                    expected: *expected,
                    actual,
                });
            }
        }
        self.rows.push(elements);
        Ok(self)
    }

    /// Number of columns.
    pub fn num_of_columns(&self) -> usize {
        self.columns.len()
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Column datatypes in order.
    pub fn types(&self) -> &[DataType] {
        &self.types
    }

    /// Rows in insertion order.
    pub fn rows(&self) -> &[Vec<MetricValue>] {
        &self.rows
    }
}
