use crate::error::DbError;
use async_trait::async_trait;
use core_types::Row;

/// One physical connection to the database.
///
/// Implementations send literal SQL text and return every row the statement
/// produced, already decoded into owned [`Row`]s.
#[async_trait]
pub trait Connection: Send {
    async fn execute(&mut self, sql: &str) -> Result<Vec<Row>, DbError>;

    /// Whether the connection is known to be unusable, e.g. after its socket failed.
    ///
    /// The pool discards closed connections instead of handing them out again.
    fn is_closed(&self) -> bool {
        false
    }

    /// Terminates the connection gracefully.
    async fn close(self: Box<Self>) -> Result<(), DbError>;
}

/// Opens new physical connections for the pool.
#[async_trait]
pub trait ConnectionSource: Send + Sync + 'static {
    async fn open(&self) -> Result<Box<dyn Connection>, DbError>;
}
