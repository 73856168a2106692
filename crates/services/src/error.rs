//! Shared error types for the services crate.

use thiserror::Error;

use lesson_core::EngineError;
use lesson_core::model::LessonId;
use storage::repository::StorageError;

/// Errors emitted by `LessonSessionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("lesson {lesson} is locked")]
    LessonLocked { lesson: LessonId },

    #[error("lesson {lesson} not found")]
    LessonNotFound { lesson: LessonId },

    /// Saving progress failed even after retries. Nothing from the failed
    /// operation was acknowledged; the caller may repeat it.
    #[error("progress not saved after {attempts} attempt(s): {source}")]
    Persistence {
        attempts: u32,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Whether repeating the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Persistence { source, .. } | SessionError::Storage(source) => {
                source.is_transient()
            }
            _ => false,
        }
    }
}
