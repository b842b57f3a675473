//! # pgtable ORM Crate
//!
//! This crate maps application records to Postgres tables. It derives a table
//! layout from each record's field registration, renders every statement as
//! SQL text and runs it through the `database` crate.
//!
//! ## Architectural Principles
//!
//! - **Explicit Schemas:** records list their fields through the `Record`
//!   trait. There is no runtime reflection; the first field is the key.
//! - **Pure Statement Synthesis:** `statements` and `query` only build strings
//!   and can be tested without a database.
//! - **Typed Filters:** `WHERE`, `HAVING` and join conditions are `Predicate`
//!   trees. Identifiers are always quoted and values always escaped.
//! - **Borrow Per Statement:** a `Table` takes a pool connection for each
//!   statement and gives it back on success and failure, unless it was bound to
//!   a caller's connection.
//!
//! ## Public API
//!
//! - `Record` / `Field` / `ColumnType`: describing a record type.
//! - `Schema`: the validated layout derived from a record.
//! - `Table`: the CRUD and query façade.
//! - `Select`, `Join`, `OrderBy`, `Predicate`, `Column`: the select builder.
//! - `Catalog`: creating and dropping several related tables together.

pub mod catalog;
pub mod filter;
pub mod query;
pub mod record;
pub mod schema;
pub mod statements;
pub mod table;

pub use catalog::Catalog;
pub use filter::{Column, CompareOp, Operand, Predicate, col, lit, param};
pub use query::{Join, OrderBy, Select};
pub use record::{ColumnType, Field, Record};
pub use schema::{ForeignKey, Schema};
pub use table::Table;

// Re-exported so record implementations need only this crate.
pub use core_types::{ColumnKind, CoreError, Cursor, Json, JoinType, Row, SortOrder, Value};
pub use database::{DbError, Pool};
