use thiserror::Error;

/// Errors raised while building or running a pipeline
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    /// The reasoning capability rejected (or never received) the credential
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The reasoning or retrieval capability errored or was unreachable
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl FlowError {
    /// True for failures reported by an external capability rather than by the pipeline itself
    pub fn is_external(&self) -> bool {
        matches!(self, FlowError::Authentication(_) | FlowError::Upstream(_))
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
