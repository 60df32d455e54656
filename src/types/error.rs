//! Error types for the authorization ledger
//!
//! Every engine operation returns one of these values instead of a boolean so
//! the transport layer can render a specific message.
//!
//! # Error Categories
//!
//! - **Validation Errors**: bad amount, bad card data, card/CVV/expiry mismatch
//! - **Not-found Errors**: card, account or authorization missing
//! - **State Errors**: operation on an authorization that is no longer `Authorized`
//! - **Balance Errors**: amount exceeds the available or held balance
//! - **External Errors**: currency conversion failed (network, timeout, decode, missing rate)
//! - **Infrastructure Errors**: storage, configuration and file I/O

use super::authorization::{AuthStatus, AuthorizationId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the authorization ledger
///
/// Card numbers carried in variants are already masked (see
/// [`mask_card_number`](super::card::mask_card_number)).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaymentError {
    /// Amount is zero, negative, or exceeds what the authorization allows
    #[error("Amount is invalid: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Expiration month outside 1-12
    #[error("Invalid month: {month}")]
    InvalidMonth { month: u32 },

    /// Card expiration date is in the past
    #[error("Credit card has expired ({month:02}/{year})")]
    CardExpired { month: u32, year: i32 },

    /// CVV is not 3 or 4 digits
    #[error("Invalid CVV")]
    InvalidCvv,

    /// Supplied CVV does not match the stored card
    #[error("CVV doesn't match")]
    NoMatchCvv,

    /// Supplied expiration date does not match the stored card
    #[error("Card expiration date doesn't match")]
    NoMatchExpiration,

    /// Card number fails the length or Luhn check
    #[error("Invalid credit card number {card}")]
    InvalidCardNumber { card: String },

    #[error("Card {card} not found")]
    CardNotFound { card: String },

    #[error("Bank account for card {card} not found")]
    AccountNotFound { card: String },

    #[error("Authorization {id} not found")]
    AuthorizationNotFound { id: AuthorizationId },

    /// Operation attempted on an authorization that is no longer `Authorized`
    ///
    /// Carries the current status for diagnostics.
    #[error("Authorization {id} has already been {status}")]
    InvalidStatus {
        id: AuthorizationId,
        status: AuthStatus,
    },

    /// The card already has a non-terminal authorization
    #[error("Card {card} already has an open authorization {id}")]
    AuthorizationAlreadyOpen { card: String, id: AuthorizationId },

    /// Amount is higher than the account's available balance
    #[error("Amount is higher than current balance for card {card}: available {available}, requested {requested}")]
    InsufficientFunds {
        card: String,
        available: Decimal,
        requested: Decimal,
    },

    /// Amount is higher than the account's held (authorized) balance
    #[error("Amount is higher than the authorized balance for card {card}: held {held}, requested {requested}")]
    ExceedsHeldBalance {
        card: String,
        held: Decimal,
        requested: Decimal,
    },

    /// The external rate lookup failed
    ///
    /// The engine never retries; a caller may.
    #[error("Currency conversion {from} -> {to} failed: {reason}")]
    ConversionFailed {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Arithmetic overflow in {operation} for card {card}")]
    ArithmeticOverflow { operation: String, card: String },

    #[error("Arithmetic underflow in {operation} for card {card}")]
    ArithmeticUnderflow { operation: String, card: String },

    /// Backing store failed to read or write a record
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Startup configuration or fixture data is unusable
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error: {message}")]
    IoError { message: String },

    /// Operations file could not be parsed
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError { line: Option<u64>, message: String },
}

impl From<std::io::Error> for PaymentError {
    fn from(error: std::io::Error) -> Self {
        PaymentError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for PaymentError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        PaymentError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(error: serde_json::Error) -> Self {
        PaymentError::Config {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl PaymentError {
    pub fn invalid_amount(amount: Decimal) -> Self {
        PaymentError::InvalidAmount { amount }
    }

    pub fn invalid_card_number(card: &str) -> Self {
        PaymentError::InvalidCardNumber {
            card: super::card::mask_card_number(card),
        }
    }

    pub fn card_not_found(card: &str) -> Self {
        PaymentError::CardNotFound {
            card: super::card::mask_card_number(card),
        }
    }

    pub fn account_not_found(card: &str) -> Self {
        PaymentError::AccountNotFound {
            card: super::card::mask_card_number(card),
        }
    }

    pub fn authorization_not_found(id: AuthorizationId) -> Self {
        PaymentError::AuthorizationNotFound { id }
    }

    pub fn invalid_status(id: AuthorizationId, status: AuthStatus) -> Self {
        PaymentError::InvalidStatus { id, status }
    }

    pub fn authorization_already_open(card: &str, id: AuthorizationId) -> Self {
        PaymentError::AuthorizationAlreadyOpen {
            card: super::card::mask_card_number(card),
            id,
        }
    }

    pub fn insufficient_funds(card: &str, available: Decimal, requested: Decimal) -> Self {
        PaymentError::InsufficientFunds {
            card: super::card::mask_card_number(card),
            available,
            requested,
        }
    }

    pub fn exceeds_held_balance(card: &str, held: Decimal, requested: Decimal) -> Self {
        PaymentError::ExceedsHeldBalance {
            card: super::card::mask_card_number(card),
            held,
            requested,
        }
    }

    pub fn conversion_failed(from: &str, to: &str, reason: impl Into<String>) -> Self {
        PaymentError::ConversionFailed {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.into(),
        }
    }

    pub fn arithmetic_overflow(operation: &str, card: &str) -> Self {
        PaymentError::ArithmeticOverflow {
            operation: operation.to_string(),
            card: super::card::mask_card_number(card),
        }
    }

    pub fn arithmetic_underflow(operation: &str, card: &str) -> Self {
        PaymentError::ArithmeticUnderflow {
            operation: operation.to_string(),
            card: super::card::mask_card_number(card),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        PaymentError::Storage {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        PaymentError::Config {
            message: message.into(),
        }
    }

    /// Whether a caller may reasonably retry the same request
    ///
    /// Only external-dependency failures qualify; everything else is
    /// deterministic given the same state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::ConversionFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[rstest]
    #[case::invalid_amount(
        PaymentError::InvalidAmount { amount: dec!(-1) },
        "Amount is invalid: -1"
    )]
    #[case::card_expired(
        PaymentError::CardExpired { month: 3, year: 2020 },
        "Credit card has expired (03/2020)"
    )]
    #[case::no_match_cvv(PaymentError::NoMatchCvv, "CVV doesn't match")]
    #[case::insufficient_funds(
        PaymentError::insufficient_funds("4000000000000119", dec!(100), dec!(1000)),
        "Amount is higher than current balance for card ************0119: available 100, requested 1000"
    )]
    #[case::conversion_failed(
        PaymentError::conversion_failed("EUR", "USD", "timed out"),
        "Currency conversion EUR -> USD failed: timed out"
    )]
    #[case::parse_error_with_line(
        PaymentError::ParseError { line: Some(3), message: "bad row".to_string() },
        "CSV parse error at line 3: bad row"
    )]
    #[case::parse_error_without_line(
        PaymentError::ParseError { line: None, message: "bad row".to_string() },
        "CSV parse error: bad row"
    )]
    fn test_error_display(#[case] error: PaymentError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_invalid_status_carries_current_status() {
        let id = Uuid::nil();
        let error = PaymentError::invalid_status(id, AuthStatus::Captured);

        assert_eq!(
            error.to_string(),
            "Authorization 00000000-0000-0000-0000-000000000000 has already been Captured"
        );
        assert!(matches!(
            error,
            PaymentError::InvalidStatus {
                status: AuthStatus::Captured,
                ..
            }
        ));
    }

    #[test]
    fn test_helpers_mask_card_numbers() {
        let error = PaymentError::card_not_found("5555555555554444");
        assert_eq!(
            error,
            PaymentError::CardNotFound {
                card: "************4444".to_string()
            }
        );
    }

    #[rstest]
    #[case::conversion(PaymentError::conversion_failed("EUR", "USD", "x"), true)]
    #[case::validation(PaymentError::InvalidCvv, false)]
    #[case::balance(PaymentError::insufficient_funds("1", dec!(1), dec!(2)), false)]
    fn test_is_retryable(#[case] error: PaymentError, #[case] expected: bool) {
        assert_eq!(error.is_retryable(), expected);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: PaymentError = io_error.into();
        assert!(matches!(error, PaymentError::IoError { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }
}
