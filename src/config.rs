//! Seed configuration
//!
//! The ledger starts from an explicit seed: the cards it knows about, the
//! opening balance of each card's account and, for offline runs, a table of
//! exchange rates. The seed is a JSON document:
//!
//! ```json
//! {
//!   "cards": [
//!     { "number": "4000000000000119", "cvv": "123", "currency": "USD",
//!       "expiration_month": 1, "expiration_year": 2031 }
//!   ],
//!   "accounts": [ { "card": "4000000000000119", "balance": "100", "currency": "USD" } ],
//!   "rates": [ { "from": "EUR", "to": "USD", "rate": "1.1" } ],
//!   "conversion_timeout_ms": 2000
//! }
//! ```
//!
//! `provision` validates every card the same way a newly created card is
//! validated and refuses to start on the first bad entry.

use crate::core::{AccountLedger, CardStore, CardValidator, FixedRateSource};
use crate::types::{mask_card_number, Account, Card, CardNumber, Currency, PaymentError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default bound on a rate lookup, in milliseconds
pub const DEFAULT_CONVERSION_TIMEOUT_MS: u64 = 2000;

fn default_conversion_timeout_ms() -> u64 {
    DEFAULT_CONVERSION_TIMEOUT_MS
}

/// Opening balance of a card's account
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountSeed {
    pub card: CardNumber,
    pub balance: Decimal,
    pub currency: Currency,
}

/// One entry of the static rate table
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RateSeed {
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
}

/// Application configuration loaded from the seed file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cards: Vec<Card>,

    #[serde(default)]
    pub accounts: Vec<AccountSeed>,

    #[serde(default)]
    pub rates: Vec<RateSeed>,

    #[serde(default = "default_conversion_timeout_ms")]
    pub conversion_timeout_ms: u64,

    /// Rate service endpoint, used with the HTTP rate source
    #[serde(default)]
    pub rate_url: Option<String>,

    #[serde(default)]
    pub rate_api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            cards: Vec::new(),
            accounts: Vec::new(),
            rates: Vec::new(),
            conversion_timeout_ms: DEFAULT_CONVERSION_TIMEOUT_MS,
            rate_url: None,
            rate_api_key: None,
        }
    }
}

impl AppConfig {
    /// Read and parse a JSON seed file
    ///
    /// # Errors
    ///
    /// * `FileNotFound` if the path does not exist
    /// * `IoError` if the file cannot be read
    /// * `Config` if the content is not a valid seed document
    pub fn load(path: &Path) -> Result<Self, PaymentError> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PaymentError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => PaymentError::from(e),
        })?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, PaymentError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_millis(self.conversion_timeout_ms)
    }

    /// Build the static rate table from the `rates` entries
    pub fn fixed_rate_source(&self) -> FixedRateSource {
        self.rates
            .iter()
            .fold(FixedRateSource::new(), |source, seed| {
                source.with_rate(seed.from.clone(), seed.to.clone(), seed.rate)
            })
    }
}

/// Load the seed into the card store and the ledger
///
/// Cards are validated with `validate_new_card` against `today` and stored
/// first; each account must then name a configured card and share its
/// currency.
///
/// # Errors
///
/// Returns `Config` naming the offending (masked) card on the first invalid
/// card or account entry. Stores that reject a duplicate surface their own
/// error.
pub async fn provision(
    config: &AppConfig,
    cards: &dyn CardStore,
    ledger: &dyn AccountLedger,
    validator: &dyn CardValidator,
    today: NaiveDate,
) -> Result<(), PaymentError> {
    for card in &config.cards {
        validator.validate_new_card(card, today).map_err(|e| {
            PaymentError::config(format!(
                "card {} is invalid: {}",
                mask_card_number(&card.number),
                e
            ))
        })?;
        cards.save(card.clone()).await?;
    }

    for seed in &config.accounts {
        let card = cards.find_by_number(&seed.card).await?.ok_or_else(|| {
            PaymentError::config(format!(
                "account references unknown card {}",
                mask_card_number(&seed.card)
            ))
        })?;

        if card.currency != seed.currency {
            return Err(PaymentError::config(format!(
                "account for card {} is in {} but the card is in {}",
                mask_card_number(&seed.card),
                seed.currency,
                card.currency
            )));
        }

        ledger
            .open_account(Account::new(seed.card.clone(), seed.balance, seed.currency.clone()))
            .await?;
    }

    info!(
        cards = config.cards.len(),
        accounts = config.accounts.len(),
        rates = config.rates.len(),
        "seed data provisioned"
    );
    Ok(())
}
