//! Error types

use crate::rates::RateError;
use crate::wallet::WalletError;

/// Service errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Wallet capability rejected an operation
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// Exchange rate lookup failed
    #[error("Exchange rate error: {0}")]
    Rate(#[from] RateError),

    /// Storage error
    #[error(transparent)]
    Storage(#[from] lnpos_storage::Error),

    /// Domain error
    #[error(transparent)]
    Core(#[from] lnpos_core::Error),

    /// No wallet is connected
    #[error("No wallet connected")]
    NoWallet,

    /// Operation not allowed in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error comes from malformed operator input
    pub fn is_validation(&self) -> bool {
        match self {
            Error::Core(e) => e.is_user_error(),
            Error::Storage(e) => e.is_validation(),
            _ => false,
        }
    }

    /// Message suitable for a blocking alert
    pub fn user_message(&self) -> String {
        match self {
            Error::Core(e) => e.user_message(),
            Error::Storage(lnpos_storage::Error::Core(e)) => e.user_message(),
            Error::Storage(lnpos_storage::Error::Validation(msg)) => msg.clone(),
            Error::Wallet(e) => format!("The wallet could not complete the request: {}", e),
            Error::Rate(_) => {
                "Unable to fetch the exchange rate. Please check your connection and try again."
                    .to_string()
            }
            Error::NoWallet => "Please connect a wallet first.".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
