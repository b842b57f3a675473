use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid schema for table {0}: {1}")]
    InvalidSchema(String, String),

    #[error("Invalid filter expression at position {position}: {message}")]
    InvalidFilter { position: usize, message: String },

    #[error("The statement references ${0} but no such parameter was supplied.")]
    MissingParameter(usize),

    #[error("Expected {expected} values for the listed columns, got {actual}.")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("An error occurred during JSON serialization/deserialization: {0}")]
    Json(#[from] serde_json::Error),
}
