//! Error types

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Security error
    #[error("Security error: {0}")]
    Security(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Domain error
    #[error(transparent)]
    Core(#[from] lnpos_core::Error),
}

impl Error {
    /// Whether this error comes from malformed operator input
    pub fn is_validation(&self) -> bool {
        match self {
            Error::Validation(_) => true,
            Error::Core(core) => core.is_user_error(),
            _ => false,
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
