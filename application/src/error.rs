use std::io;
use thiserror::Error;

use domain::error::DomainError;

/// Generic text shown to end users whenever storage cannot serve a request.
pub const STORAGE_UNAVAILABLE_MESSAGE: &str = "Warp storage is currently unavailable.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Table '{table}' does not exist")]
    SchemaMissing { table: String },

    #[error("Schema is outdated, pending changes: {}", pending.join(", "))]
    SchemaOutdated { pending: Vec<String> },

    #[error("Connection failure: {message}")]
    ConnectionFailure { message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Decode error: {message}")]
    DecodeError { message: String },

    #[error("Warp '{name}' has no storage identity")]
    NotPersisted { name: String },

    #[error("No warp named '{name}'")]
    UnknownWarp { name: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl AppError {
    #[must_use]
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailure { .. }
                | Self::StorageError { .. }
                | Self::SchemaMissing { .. }
                | Self::SchemaOutdated { .. }
        )
    }

    /// Text that is safe to show to players. Driver messages never leave
    /// the process through this path.
    #[must_use]
    pub fn user_message(&self) -> String {
        if self.is_storage_unavailable() {
            return STORAGE_UNAVAILABLE_MESSAGE.to_string();
        }
        match self {
            Self::Domain(e) => e.to_string(),
            Self::NotPersisted { name } => format!("Warp '{name}' is not stored yet."),
            Self::UnknownWarp { name } => format!("There is no warp named '{name}'."),
            _ => "An internal error occurred.".to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
