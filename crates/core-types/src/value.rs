use crate::error::CoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// A single SQL value, either bound for rendering into a statement or decoded from a row.
///
/// The variant set is closed: every way a value can be written into SQL text is
/// decided by its variant alone (see [`Value::to_sql_literal`]).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Bool(bool),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    JsonList(Vec<serde_json::Value>),
}

impl Value {
    /// Serializes `value` into a JSON document value.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, CoreError> {
        Ok(Value::Json(serde_json::to_value(value)?))
    }

    /// Serializes every item into a JSON document collection.
    pub fn json_list<'a, T, I>(items: I) -> Result<Self, CoreError>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let docs = items
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::JsonList(docs))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value is the "empty" value of its type.
    ///
    /// A primary key holding its zero value marks a record that has not been inserted yet.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Int(n) => *n == 0,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Renders the value as a literal for `INSERT`/`UPDATE` statements.
    ///
    /// Integers are written bare, JSON documents and byte strings carry a type cast,
    /// `Null` is the `NULL` keyword and everything else is a quoted string.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Json(doc) => format!("{}::jsonb", quote(&doc.to_string())),
            Value::JsonList(docs) => {
                let items: Vec<String> = docs.iter().map(|d| d.to_string()).collect();
                format!("{}::jsonb", quote(&format!("[{}]", items.join(","))))
            }
            Value::Bytes(bytes) => format!("{}::bytea", quote(&hex(bytes))),
            other => quote(&other.to_string()),
        }
    }

    /// Renders the value as a substituted positional parameter.
    ///
    /// Only pre-formatted JSON/binary literals and `NULL` stay unquoted; everything
    /// else, integers included, is quoted.
    pub fn to_sql_param(&self) -> String {
        match self {
            Value::Null | Value::Json(_) | Value::JsonList(_) | Value::Bytes(_) => {
                self.to_sql_literal()
            }
            other => quote(&other.to_string()),
        }
    }
}

/// Wraps text in single quotes, doubling any embedded quote.
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(bytes) => f.write_str(&hex(bytes)),
            Value::Json(doc) => write!(f, "{doc}"),
            Value::JsonList(docs) => {
                let items: Vec<String> = docs.iter().map(|d| d.to_string()).collect();
                write!(f, "[{}]", items.join(","))
            }
        }
    }
}

macro_rules! int_into_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Int(i64::from(n))
            }
        })*
    };
}

int_into_value!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(f64::from(x))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Text(c.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(s.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Bytes(bytes.to_vec())
    }
}

impl From<serde_json::Value> for Value {
    fn from(doc: serde_json::Value) -> Self {
        Value::Json(doc)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

/// Conversion from a decoded column value back into a Rust field type.
///
/// Returns `None` when the value has a different kind, so callers can keep the
/// field's previous value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! int_from_value {
    ($($t:ty),*) => {
        $(impl FromValue for $t {
            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::Int(n) => <$t>::try_from(*n).ok(),
                    _ => None,
                }
            }
        })*
    };
}

int_from_value!(i8, i16, i32, i64, u8, u16, u32);

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Option<Self> {
        f64::from_value(value).map(|x| x as f32)
    }
}

impl FromValue for char {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) => s.chars().next(),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bytes(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Json(doc) => Some(doc.clone()),
            Value::JsonList(docs) => Some(serde_json::Value::Array(docs.clone())),
            _ => None,
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Marks a field as a JSON document column.
///
/// A `Json<T>` field maps to `jsonb`; a `Vec<Json<T>>` field maps to a `jsonb` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Json<T>(pub T);

impl<T: Serialize> Json<T> {
    pub fn to_value(&self) -> Result<Value, CoreError> {
        Value::json(&self.0)
    }
}

impl<T: DeserializeOwned> Json<T> {
    /// Decodes a JSON column value. Non-JSON values yield `Ok(None)`.
    pub fn from_column(value: &Value) -> Result<Option<Self>, CoreError> {
        match value {
            Value::Json(doc) => Ok(Some(Json(serde_json::from_value(doc.clone())?))),
            Value::JsonList(docs) => Ok(Some(Json(serde_json::from_value(
                serde_json::Value::Array(docs.clone()),
            )?))),
            _ => Ok(None),
        }
    }
}

impl<T> std::ops::Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> std::ops::DerefMut for Json<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}
