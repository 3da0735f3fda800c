//! Error types for the coffee machine crate.

use crate::money::Money;
use thiserror::Error;

/// Errors parsing or combining money amounts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The text is not a decimal number
    #[error("Invalid amount '{0}'")]
    Malformed(String),

    /// More fractional digits than the fixed-point scale holds
    #[error("Amount '{0}' has more than two decimal places")]
    TooPrecise(String),

    /// The amount does not fit in the fixed-point representation
    #[error("Amount out of range")]
    Overflow,
}

/// Coffee machine error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
    /// The machine configuration is unusable
    #[error("Invalid machine configuration: {reason}")]
    InvalidConfig {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// No coffee with this id is on the menu
    #[error("Coffee '{coffee_id}' not found")]
    NotFound {
        /// The requested coffee id.
        coffee_id: String,
    },

    /// The payment does not cover the price
    #[error("Insufficient funds: {coffee_id} costs {price}, got {provided}")]
    InsufficientFunds {
        /// The requested coffee id.
        coffee_id: String,
        /// The price of the coffee.
        price: Money,
        /// The amount provided.
        provided: Money,
    },

    /// The configured coins cannot pay out the exact change
    #[error("Cannot pay {change_value} change with available coins ({remaining} left over)")]
    UnrepresentableChange {
        /// The change owed.
        change_value: Money,
        /// What remains after paying out the largest coins possible.
        remaining: Money,
    },

    /// A brew request carried arguments of the wrong shape
    #[error("Invalid brew request: {reason}")]
    InvalidRequest {
        /// What was wrong with the arguments.
        reason: String,
    },

    /// Arithmetic on amounts failed
    #[error(transparent)]
    Money(#[from] MoneyError),
}

impl MachineError {
    /// Create an invalid configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        MachineError::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid request error
    pub fn request(reason: impl Into<String>) -> Self {
        MachineError::InvalidRequest {
            reason: reason.into(),
        }
    }
}

/// Result type alias for coffee machine operations
pub type MachineResult<T> = Result<T, MachineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_error_display() {
        let err = MachineError::NotFound {
            coffee_id: "frappe".to_string(),
        };
        assert_eq!(err.to_string(), "Coffee 'frappe' not found");

        let err = MachineError::InsufficientFunds {
            coffee_id: "latte".to_string(),
            price: Money::from_minor(200),
            provided: Money::from_minor(100),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: latte costs 2.00, got 1.00"
        );
    }

    #[test]
    fn test_money_error_conversion() {
        let err: MachineError = MoneyError::Overflow.into();
        assert!(matches!(err, MachineError::Money(MoneyError::Overflow)));
    }
}
