use crate::error::CoreError;
use crate::value::{FromValue, Json, Value};
use serde::de::DeserializeOwned;

/// One result row, decoded into owned values and keyed by column name.
///
/// Column order follows the statement's projection. When a joined select returns
/// two columns with the same name, lookups by name resolve to the first one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Appends a column, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((name.into(), value.into()));
    }

    /// The raw value of a column, or `None` if the row has no such column.
    pub fn column(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// The typed value of a column.
    ///
    /// Missing columns, SQL `NULL` (for non-`Option` targets) and values of another
    /// kind all yield `None`.
    pub fn get<T: FromValue>(&self, name: &str) -> Option<T> {
        self.column(name).and_then(T::from_value)
    }

    /// Deserializes a JSON document column.
    ///
    /// Returns `Ok(None)` when the column is missing or not JSON, and an error when
    /// the document does not match `T`.
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, CoreError> {
        match self.column(name) {
            Some(value) => Ok(Json::<T>::from_column(value)?.map(|json| json.0)),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}
