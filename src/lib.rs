//! Card Authorization Ledger Library
//! # Overview
//!
//! This library models the lifecycle of a card authorization hold against a
//! bank account balance: authorize, partial or final capture, refund and void.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Card, Account, Authorization, errors)
//! - [`core`] - Business logic components:
//!   - [`core::engine`] - Authorization state machine orchestration
//!   - [`core::account_ledger`] - Balance holds, captures, refunds and releases
//!   - [`core::authorization_store`] - Card and authorization storage
//!   - [`core::card_validator`] - Luhn, CVV and expiry checks
//!   - [`core::currency_converter`] - Rate lookup with a bounded timeout
//! - [`config`] - Seed file loading and provisioning
//! - [`io`] - Operation CSV parsing and report output
//! - [`driver`] - Applies operation files to the engine
//! - [`cli`] - CLI arguments parsing
//!
//! # Authorization States
//!
//! - **Authorized**: funds are held; the only state accepting operations
//! - **Captured**: final capture taken, or the full amount captured
//! - **Refunded**: final refund given, or the full amount refunded
//! - **Voided**: hold released without capture
//!
//! # Account Balances
//!
//! Each account maintains:
//! - `available`: settled funds; reduced by captures, restored by refunds
//! - `held`: funds reserved by the card's open authorization

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod driver;
pub mod io;
pub mod types;

pub use core::{AuthorizationEngine, InMemoryAccountLedger, InMemoryAuthorizationStore};
pub use io::{write_accounts_csv, write_authorizations_csv};
pub use types::{
    Account, AuthStatus, Authorization, AuthorizationId, AuthorizationRequest,
    AuthorizationResponse, Card, Currency, Operation, PaymentError,
};
