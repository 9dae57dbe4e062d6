use thiserror::Error;

use crate::embedder::EmbedError;
use crate::labeler::LabelError;

/// Failure taxonomy shared by every pipeline operation.
///
/// Validation and state errors are raised before any expensive work starts.
/// Dependency failures abort the running stage; the pipeline state is only
/// replaced once a whole `run`/`re_cluster` has succeeded.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Pipeline state unavailable: {0}")]
    State(String),

    #[error("{stage} failed: {message}")]
    Dependency { stage: &'static str, message: String },
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }

    pub fn dependency(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Dependency {
            stage,
            message: message.into(),
        }
    }

    /// True for errors raised before any work was attempted.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::State(_))
    }
}

impl From<EmbedError> for EngineError {
    fn from(err: EmbedError) -> Self {
        Self::dependency("encoding", err.to_string())
    }
}

impl From<LabelError> for EngineError {
    fn from(err: LabelError) -> Self {
        Self::dependency("labelling", err.to_string())
    }
}
