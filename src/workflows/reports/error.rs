use super::files::FileStoreError;
use super::repository::StoreError;

/// Failure signals surfaced by the report and claim workflows.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to store image: {0}")]
    File(#[from] FileStoreError),
    /// A multi-step workflow committed `completed` but could neither finish nor undo it.
    #[error("partial failure after {completed}: {source}")]
    PartialFailure {
        completed: &'static str,
        source: StoreError,
    },
}

impl WorkflowError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }
}
