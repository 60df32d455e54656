//! Authorization-related types for the authorization ledger
//!
//! This module defines the authorization record, its lifecycle status and the
//! request/response shapes exchanged with the inbound operation surface.

use super::card::{Card, CardNumber, Currency};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Authorization identifier
///
/// Generated at creation time, globally unique.
pub type AuthorizationId = Uuid;

/// Lifecycle status of an authorization
///
/// `Authorized` is the only non-terminal state. Once an authorization reaches
/// any other state every further operation on it is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthStatus {
    /// Funds are held; captures, refunds and a void are still possible
    Authorized,

    /// Captured in full or finalised by a final capture
    Captured,

    /// Refunded in full or finalised by a final refund
    Refunded,

    /// Hold released without (further) capture
    Voided,
}

impl AuthStatus {
    /// Whether no further operation is accepted in this state
    pub fn is_terminal(self) -> bool {
        !matches!(self, AuthStatus::Authorized)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuthStatus::Authorized => "Authorized",
            AuthStatus::Captured => "Captured",
            AuthStatus::Refunded => "Refunded",
            AuthStatus::Voided => "Voided",
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authorization hold and its running capture/refund totals
///
/// All amounts are in the card's currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authorization {
    pub id: AuthorizationId,

    pub card_number: CardNumber,

    /// Currency the merchant asked for
    pub currency_requested: Currency,

    /// Currency of the card; the authorized amount is expressed in it
    pub currency_card: Currency,

    /// Amount held at creation, fixed afterwards
    pub authorized_amount: Decimal,

    /// Captured and not yet refunded
    pub captured_amount: Decimal,

    /// Cumulative refunds
    pub refunded_amount: Decimal,

    pub status: AuthStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Authorization {
    /// Create a fresh `Authorized` record for `card` holding `amount`
    pub fn new(card: &Card, currency_requested: Currency, amount: Decimal) -> Self {
        let now = Utc::now();
        Authorization {
            id: Uuid::new_v4(),
            card_number: card.number.clone(),
            currency_requested,
            currency_card: card.currency.clone(),
            authorized_amount: amount,
            captured_amount: Decimal::ZERO,
            refunded_amount: Decimal::ZERO,
            status: AuthStatus::Authorized,
            created_at: now,
            updated_at: now,
        }
    }

    /// Amount of the authorization that has not been captured
    pub fn amount_available(&self) -> Decimal {
        self.authorized_amount - self.captured_amount
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Inbound authorization request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub card_number: CardNumber,
    pub currency: Currency,
    pub cvv: String,
    pub amount: Decimal,
    pub expiration_month: u32,
    pub expiration_year: i32,
}

/// Outbound projection of an authorization
///
/// `amount_available` is what is left to capture; it is zero once the
/// authorization has been voided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub id: AuthorizationId,
    pub currency: Currency,
    pub amount_available: Decimal,
}

impl From<&Authorization> for AuthorizationResponse {
    fn from(auth: &Authorization) -> Self {
        let amount_available = match auth.status {
            AuthStatus::Voided => Decimal::ZERO,
            _ => auth.amount_available(),
        };
        AuthorizationResponse {
            id: auth.id,
            currency: auth.currency_card.clone(),
            amount_available,
        }
    }
}
