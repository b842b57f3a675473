use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("No database connection is available: the pool is closed.")]
    ConnectionNotFound,

    #[error("Failed to connect to the database: {0}")]
    ConnectFailed(String),

    #[error("The requested record was not found in the database.")]
    RecordNotFound,

    #[error("The record was not saved: the database returned no key.")]
    RecordNotSaved,

    #[error("The supplied password does not match.")]
    PasswordMismatch,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Database driver error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}
