use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
}

/// Failure inside a single checker. Isolated by the engine, never surfaced to callers.
#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("checker {checker} failed: {reason}")]
    Failed { checker: String, reason: String },

    #[error("checker {checker} panicked")]
    Panicked { checker: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
