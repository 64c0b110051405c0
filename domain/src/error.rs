use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid warp name: {0}")]
    InvalidName(String),

    #[error("Invalid {kind} identifier '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
