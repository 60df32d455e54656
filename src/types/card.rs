//! Card-related types for the authorization ledger
//!
//! Cards are provisioned once by the setup routine and are read-only for the
//! authorization flow.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Card identifier
///
/// The primary account number as a digit string. It doubles as the key of the
/// bank account backing the card.
pub type CardNumber = String;

/// ISO-4217 style currency code, normalised to upper case
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Create a currency code, trimming and upper-casing the input
    pub fn new(code: impl AsRef<str>) -> Self {
        Currency(code.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Currency {
    fn from(code: String) -> Self {
        Currency::new(code)
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Currency::new(code)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A payment card
///
/// Immutable once stored. `expiration_year` is a four-digit year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Primary account number (13 to 19 digits, Luhn valid)
    pub number: CardNumber,

    /// Card verification value (3 or 4 digits)
    pub cvv: String,

    /// Currency the card (and its account) is denominated in
    pub currency: Currency,

    /// Expiration month, 1-12
    pub expiration_month: u32,

    /// Expiration year, four digits
    pub expiration_year: i32,
}

/// Mask a card number for logs and error messages, keeping the last four digits
pub fn mask_card_number(number: &str) -> String {
    let visible = number.len().saturating_sub(4);
    number
        .char_indices()
        .map(|(i, c)| if i < visible { '*' } else { c })
        .collect()
}
