use thiserror::Error;

/// Error type for engine operations.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} is {status} (expected {expected})")]
    Conflict {
        entity: &'static str,
        status: String,
        expected: &'static str,
    },
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
}

impl EngineError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub(crate) fn conflict(
        entity: &'static str,
        status: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        EngineError::Conflict {
            entity,
            status: status.into(),
            expected,
        }
    }

    pub(crate) fn not_found(entity: &'static str) -> Self {
        EngineError::NotFound { entity }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
