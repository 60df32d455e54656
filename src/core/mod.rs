//! Core business logic module
//!
//! This module contains the authorization processing components:
//! - `traits` - Trait abstractions for interchangeable implementations
//! - `engine` - Authorization state machine orchestration
//! - `account_ledger` - Account balances and hold/capture/refund primitives
//! - `authorization_store` - Card and authorization storage
//! - `card_validator` - Luhn and card data checks
//! - `currency_converter` - Rate lookup and amount conversion

pub mod account_ledger;
pub mod authorization_store;
pub mod card_validator;
pub mod currency_converter;
pub mod engine;
pub mod traits;

pub use account_ledger::InMemoryAccountLedger;
pub use authorization_store::{InMemoryAuthorizationStore, InMemoryCardStore};
pub use card_validator::{luhn_valid, LuhnCardValidator};
pub use currency_converter::{
    FixedRateSource, HttpRateSource, RateConverter, DEFAULT_CONVERSION_TIMEOUT, DEFAULT_RATE_URL,
};
pub use engine::AuthorizationEngine;
pub use traits::{
    AccountLedger, AuthorizationStore, CardStore, CardValidator, CurrencyConverter, RateSource,
};
