//! Error types for the point-of-sale core
//!
//! Error taxonomy for operator input validation, amount conversion and wallet
//! descriptor parsing.

use std::fmt;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Core errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed operator input (PIN, amount, settings)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Amount is zero, negative or not a number
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Amount does not fit in a satoshi counter
    #[error("Amount overflow: {0}")]
    AmountOverflow(String),

    /// Unknown currency code
    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),

    /// No conversion rate is available for a fiat currency
    #[error("Exchange rate unavailable: {0}")]
    RateUnavailable(String),

    /// Wallet connection descriptor could not be parsed
    #[error("Invalid wallet connection: {0}")]
    InvalidDescriptor(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Check if error is a user-facing error (vs internal error)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::InvalidAmount(_)
                | Error::InvalidCurrency(_)
                | Error::InvalidDescriptor(_)
        )
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(msg) => msg.clone(),
            Error::InvalidAmount(_) => {
                "The amount is invalid. Please enter a valid amount.".to_string()
            }
            Error::InvalidCurrency(_) => {
                "This currency is not supported. Please pick another one.".to_string()
            }
            Error::RateUnavailable(_) => {
                "Unable to fetch the exchange rate. Please check your connection and try again."
                    .to_string()
            }
            Error::InvalidDescriptor(_) => {
                "The wallet connection string is invalid. Please check and try again.".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_) => ErrorCategory::Validation,
            Error::InvalidAmount(_) | Error::AmountOverflow(_) => ErrorCategory::Amount,
            Error::InvalidCurrency(_) | Error::RateUnavailable(_) => ErrorCategory::Currency,
            Error::InvalidDescriptor(_) => ErrorCategory::Wallet,
            Error::Serialization(_) => ErrorCategory::Internal,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Operator input errors
    Validation,
    /// Amount-related errors
    Amount,
    /// Currency and exchange rate errors
    Currency,
    /// Wallet connection and invoice errors
    Wallet,
    /// Internal/system errors
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "Validation"),
            ErrorCategory::Amount => write!(f, "Amount"),
            ErrorCategory::Currency => write!(f, "Currency"),
            ErrorCategory::Wallet => write!(f, "Wallet"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_detection() {
        assert!(Error::Validation("pin".to_string()).is_user_error());
        assert!(Error::InvalidAmount("0".to_string()).is_user_error());
        assert!(!Error::RateUnavailable("USD".to_string()).is_user_error());
    }

    #[test]
    fn test_user_messages() {
        let msg = Error::Validation("PINs do not match".to_string()).user_message();
        assert_eq!(msg, "PINs do not match");

        let msg = Error::InvalidAmount("abc".to_string()).user_message();
        assert!(msg.contains("amount is invalid"));
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::AmountOverflow("x".to_string()).category(),
            ErrorCategory::Amount
        );
        assert_eq!(
            Error::RateUnavailable("EUR".to_string()).category(),
            ErrorCategory::Currency
        );
        assert_eq!(
            Error::InvalidDescriptor("x".to_string()).category(),
            ErrorCategory::Wallet
        );
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Amount.to_string(), "Amount");
        assert_eq!(ErrorCategory::Wallet.to_string(), "Wallet");
    }
}
