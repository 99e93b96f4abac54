// Error types for the pipeline store

use thiserror::Error;

/// Coarse classification of a [`StoreError`], used by callers that map
/// failures onto exit codes or response statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// A statement that must return a row returned none
    EmptyRow,
    /// More rows than a unique key allows
    Conflict,
    /// Anything raised by the database driver
    Internal,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The statement returned no row. For inserts this means the project
    /// resource id did not resolve to a project.
    #[error("query returned no row: {query}")]
    EmptyRow { query: String },

    #[error("found {count} pipelines with id {id}, expect 1")]
    Conflict { id: i64, count: usize },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl StoreError {
    /// Wrap a "no rows returned" condition together with the issued query
    pub fn empty_row(query: &str) -> Self {
        StoreError::EmptyRow {
            query: query.trim().to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::EmptyRow { .. } => ErrorCode::EmptyRow,
            StoreError::Conflict { .. } => ErrorCode::Conflict,
            StoreError::Database(_) => ErrorCode::Internal,
        }
    }
}
