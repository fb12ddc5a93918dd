//! Error taxonomy of the post-processing pipeline.
//!
//! Three severities matter to callers:
//! - [`PipelineError::InvalidInput`] is scoped to one read. The read is
//!   reported unmapped and the chunk carries on.
//! - [`PipelineError::Engine`] means the alignment engine handed back
//!   something inconsistent. The whole chunk fails.
//! - [`PipelineError::ResourceExhausted`] ends the run.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid read '{read}': {reason}")]
    InvalidInput { read: String, reason: String },

    #[error("alignment engine failure on read '{read}': {reason}")]
    Engine { read: String, reason: String },

    #[error("scratch arena could not grow to {requested} bytes")]
    ResourceExhausted { requested: usize },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PipelineError {
    pub fn invalid_input(read: &str, reason: impl Into<String>) -> Self {
        PipelineError::InvalidInput { read: read.to_string(), reason: reason.into() }
    }

    pub fn engine(read: &str, reason: impl Into<String>) -> Self {
        PipelineError::Engine { read: read.to_string(), reason: reason.into() }
    }

    /// Whether the current chunk must be abandoned.
    pub fn is_fatal_to_chunk(&self) -> bool {
        !matches!(self, PipelineError::InvalidInput { .. })
    }

    /// Whether the run must stop.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            PipelineError::ResourceExhausted { .. }
                | PipelineError::InvalidOption(_)
                | PipelineError::Io(_)
        )
    }
}

/// Failure reported by an [`AlignmentEngine`](crate::core::alignment::engine::AlignmentEngine).
///
/// Engines do not know which read they are working on; the pipeline attaches
/// the read name when converting into [`PipelineError::Engine`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Inconsistent(String),

    #[error("scratch arena could not grow to {requested} bytes")]
    ResourceExhausted { requested: usize },
}

impl EngineError {
    pub fn into_pipeline(self, read: &str) -> PipelineError {
        match self {
            EngineError::Inconsistent(reason) => PipelineError::engine(read, reason),
            EngineError::ResourceExhausted { requested } => {
                PipelineError::ResourceExhausted { requested }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
