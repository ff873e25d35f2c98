use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaintenanceError {
    #[error("maintenance task '{task}' failed: {reason}")]
    Task { task: String, reason: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },
}

pub type MaintenanceResult<T> = Result<T, MaintenanceError>;
