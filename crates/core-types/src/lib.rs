pub mod enums;
pub mod error;
pub mod row;
pub mod structs;
pub mod value;

// Re-export the core types to provide a clean public API.
pub use enums::{ColumnKind, JoinType, SortOrder};
pub use error::CoreError;
pub use row::Row;
pub use structs::Cursor;
pub use value::{FromValue, Json, Value, quote};
