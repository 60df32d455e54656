//! Account-related types for the authorization ledger
//!
//! This module defines the bank account record that backs a card.

use super::card::{CardNumber, Currency};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Bank account state for a single card
///
/// The ledger keeps exactly one account per card. Funds reserved by the
/// card's open authorization are tracked separately from the settled balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The card this account is keyed by
    pub card: CardNumber,

    /// Settled funds
    ///
    /// Only captures take money out of this balance; refunds put it back.
    /// Never negative.
    pub available: Decimal,

    /// Funds reserved against the in-flight authorization
    ///
    /// Set by a hold, reduced by captures and refunds, zeroed by a void.
    /// Never negative.
    pub held: Decimal,

    /// Currency the balances are denominated in
    pub currency: Currency,

    pub created_at: DateTime<Utc>,

    /// Last time a balance moved
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create an account with the given settled balance and nothing held
    pub fn new(card: impl Into<CardNumber>, available: Decimal, currency: Currency) -> Self {
        let now = Utc::now();
        Account {
            card: card.into(),
            available,
            held: Decimal::ZERO,
            currency,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_account_has_nothing_held() {
        let account = Account::new("4000000000000119", dec!(100), Currency::new("usd"));

        assert_eq!(account.available, dec!(100));
        assert_eq!(account.held, Decimal::ZERO);
        assert_eq!(account.currency.as_str(), "USD");
        assert_eq!(account.created_at, account.updated_at);
    }
}
