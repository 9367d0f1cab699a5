use thiserror::Error;

/// Top-level error type for the Marshal system.
///
/// Each variant wraps a subsystem-specific failure. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for MarshalError`
/// so that the `?` operator works seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MarshalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("Escalation error: {0}")]
    Escalation(String),

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for MarshalError {
    fn from(err: toml::de::Error) -> Self {
        MarshalError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MarshalError {
    fn from(err: toml::ser::Error) -> Self {
        MarshalError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MarshalError {
    fn from(err: serde_json::Error) -> Self {
        MarshalError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Marshal operations.
pub type Result<T> = std::result::Result<T, MarshalError>;
