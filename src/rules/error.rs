use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule source request failed: {reason}")]
    Source { reason: String },

    #[error("rule source returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("failed to decode rule payload: {reason}")]
    Decode { reason: String },

    #[error("invalid dosage for {substance}: {amount}")]
    InvalidDosage { substance: String, amount: f64 },

    #[error("rule evaluation failed: {reason}")]
    Internal { reason: String },
}

impl From<reqwest::Error> for RuleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RuleError::Decode {
                reason: e.to_string(),
            }
        } else {
            RuleError::Source {
                reason: e.to_string(),
            }
        }
    }
}

pub type RuleResult<T> = Result<T, RuleError>;
