use serde::{Deserialize, Serialize};
use std::fmt;

/// The SQL column type a record field maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Integer,
    BigInt,
    Boolean,
    Char,
    Double,
    Bytes,
    Json,
    JsonList,
    Xml,
    Text,
}

impl ColumnKind {
    /// Returns true for the integer widths that can back a serial key or a foreign key.
    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::BigInt)
    }

    /// The Postgres type name used in `CREATE TABLE`.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "int",
            ColumnKind::BigInt => "bigint",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Char => "char",
            ColumnKind::Double => "double precision",
            ColumnKind::Bytes => "bytea",
            ColumnKind::Json | ColumnKind::JsonList => "jsonb",
            ColumnKind::Xml => "xml",
            ColumnKind::Text => "text",
        }
    }

    /// The `DEFAULT` expression for a non-key column, if the kind has one.
    pub fn default_value(&self) -> Option<&'static str> {
        match self {
            ColumnKind::Integer | ColumnKind::BigInt | ColumnKind::Double => Some("0"),
            ColumnKind::Boolean => Some("false"),
            ColumnKind::Char => Some("' '"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JoinType {
    #[default]
    Inner,
    Outer,
    Left,
    Right,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Postgres has no bare `OUTER JOIN`; an outer join on both sides is `FULL OUTER`.
        let keyword = match self {
            JoinType::Inner => "INNER",
            JoinType::Outer => "FULL OUTER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
        };
        f.write_str(keyword)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("ASC"),
            SortOrder::Desc => f.write_str("DESC"),
        }
    }
}
