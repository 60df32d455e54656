//! Core traits for card validation, currency conversion, balances and storage
//!
//! Each capability the authorization engine depends on is a trait so the
//! engine can be driven against in-memory implementations or test fakes.
//!
//! The storage-facing traits are async: a real backing store performs I/O.
//! Implementations must make every single method atomic with respect to the
//! record it touches; the engine layers its own per-card serialization on top
//! for multi-step operations.

use crate::types::{
    Account, Authorization, AuthorizationId, Card, CardNumber, Currency, PaymentError,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Card data checks
pub trait CardValidator: Send + Sync {
    /// Length (13-19 digits) and Luhn checksum check
    fn validate_luhn_number(&self, number: &str) -> bool;

    /// Compare the presented CVV and expiry against the stored card
    ///
    /// Exact-match checks only; no expiry-in-the-past logic.
    fn validate_existing(
        &self,
        card: &Card,
        cvv: &str,
        expiration_month: u32,
        expiration_year: i32,
    ) -> Result<(), PaymentError>;

    /// Full gate for a card about to be stored
    fn validate_new_card(&self, card: &Card, today: NaiveDate) -> Result<(), PaymentError>;
}

/// Source of currency exchange rates
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Multiplicative rate converting `from` into `to`
    async fn fetch_rate(&self, from: &Currency, to: &Currency) -> Result<Decimal, PaymentError>;
}

/// Converts amounts between currencies
#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    async fn convert(
        &self,
        amount: Decimal,
        from: &Currency,
        to: &Currency,
    ) -> Result<Decimal, PaymentError>;
}

/// Per-card bank account balances
///
/// Balance-moving methods return the account as it stands after the change.
#[async_trait]
pub trait AccountLedger: Send + Sync {
    /// Register an account; fails if one already exists for the card
    async fn open_account(&self, account: Account) -> Result<(), PaymentError>;

    async fn get(&self, card: &str) -> Result<Option<Account>, PaymentError>;

    /// Reserve `amount`; replaces any previous hold
    async fn hold(&self, card: &str, amount: Decimal) -> Result<Account, PaymentError>;

    /// Settle `amount` of the hold out of the account
    async fn capture(&self, card: &str, amount: Decimal) -> Result<Account, PaymentError>;

    /// Return `amount` from the hold to the available balance
    async fn refund(&self, card: &str, amount: Decimal) -> Result<Account, PaymentError>;

    /// Drop the hold entirely
    async fn release_hold(&self, card: &str) -> Result<Account, PaymentError>;

    /// Overwrite balances with a previously taken snapshot
    async fn restore(&self, account: Account) -> Result<(), PaymentError>;

    async fn all_accounts(&self) -> Result<Vec<Account>, PaymentError>;
}

/// Card records
#[async_trait]
pub trait CardStore: Send + Sync {
    /// Store a card; fails if the number is already present
    async fn save(&self, card: Card) -> Result<(), PaymentError>;

    async fn find_by_number(&self, number: &str) -> Result<Option<Card>, PaymentError>;
}

/// Authorization records
#[async_trait]
pub trait AuthorizationStore: Send + Sync {
    /// Insert a new authorization; fails if the id is already present
    async fn create(&self, authorization: Authorization) -> Result<(), PaymentError>;

    /// Replace an existing authorization; fails if the id is unknown
    async fn update(&self, authorization: Authorization) -> Result<(), PaymentError>;

    async fn find_by_id(&self, id: AuthorizationId) -> Result<Option<Authorization>, PaymentError>;

    /// The card's non-terminal authorization, if any
    async fn find_open_by_card(
        &self,
        card: &CardNumber,
    ) -> Result<Option<Authorization>, PaymentError>;

    async fn all(&self) -> Result<Vec<Authorization>, PaymentError>;
}
