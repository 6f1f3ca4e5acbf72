// src/error.rs
// Error taxonomy shared by the scheduler, its stores and the service layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Rating must be between 1 and 10, got {0}")]
    InvalidRating(i32),

    #[error("Card not found: {0}")]
    NotFound(String),

    #[error("Write conflict on {problem_id}: expected version {expected}, found {found}")]
    Conflict {
        problem_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Problem already enrolled: {0}")]
    AlreadyEnrolled(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Corrupt card record: {0}")]
    CorruptRecord(String),

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for failures a caller may resolve by reloading the card and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
