//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;

/// Errors emitted by `ProgressStore`.
///
/// Only `reset` surfaces failures: it is a destructive, user-confirmed action
/// where a masked failure would desynchronize visible state from the backend.
/// Every other store operation absorbs backend errors at the boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressStoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizSessionService::load_questions`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("no questions available for quiz")]
    NoQuestions,
    #[error(transparent)]
    Storage(#[from] StorageError),
}
