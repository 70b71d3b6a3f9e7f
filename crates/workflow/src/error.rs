use excursions_core::error::CoreError;

/// Failure of a transactional workflow operation.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// A domain rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
