use thiserror::Error;

/// Failure of the delegated analysis port.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("analysis request failed: {reason}")]
    Request { reason: String },

    #[error("analysis reply could not be parsed: {reason}")]
    Parse { reason: String },

    #[error("analysis provider unavailable: {reason}")]
    Unavailable { reason: String },
}

impl AnalyzerError {
    /// Parse failures are deterministic for a given reply; retrying will not help.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AnalyzerError::Parse { .. })
    }
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),

    #[error("analysis timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

pub type RouterResult<T> = Result<T, RouterError>;
