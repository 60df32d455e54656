//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `card`: cards, currency codes, card-number masking
//! - `account`: the bank account balance record
//! - `authorization`: authorizations, their status, request/response shapes
//! - `operation`: operation records fed in by the command-line driver
//! - `error`: Error types for the ledger

pub mod account;
pub mod authorization;
pub mod card;
pub mod error;
pub mod operation;

pub use account::Account;
pub use authorization::{
    AuthStatus, Authorization, AuthorizationId, AuthorizationRequest, AuthorizationResponse,
};
pub use card::{mask_card_number, Card, CardNumber, Currency};
pub use error::PaymentError;
pub use operation::{Operation, OperationRef};
