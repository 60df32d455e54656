//! Thread-safe account ledger
//!
//! This module provides the `InMemoryAccountLedger`, which owns the per-card
//! bank account balances and the hold/capture/refund/release primitives the
//! authorization engine drives.
//!
//! # Design
//!
//! Accounts live in a `DashMap` keyed by card number. Every primitive runs as
//! a closure over the account entry while its shard lock is held, so a single
//! primitive is atomic per account: it either validates and applies all of its
//! balance changes or leaves the account untouched.
//!
//! # Balance Rules
//!
//! - `hold` sets `held` to the requested amount (one outstanding hold per
//!   account); `available` is untouched until capture
//! - `capture` takes the amount out of both `held` and `available`
//! - `refund` moves the amount from `held` back into `available`
//! - `release_hold` zeroes `held`
//!
//! Neither balance can go negative.

use crate::core::traits::AccountLedger;
use crate::types::{Account, PaymentError};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;

/// In-memory account ledger
///
/// Accounts must be opened explicitly; balance operations on an unknown card
/// fail with `AccountNotFound` rather than creating an empty account.
#[derive(Debug, Default)]
pub struct InMemoryAccountLedger {
    /// Concurrent map of card number to account state
    accounts: DashMap<String, Account>,
}

impl InMemoryAccountLedger {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Apply `f` to the card's account while holding its entry lock
    ///
    /// The closure works on a copy which is written back only when it
    /// returns `Ok`, so a rejected operation leaves the account unchanged.
    fn update<F>(&self, card: &str, f: F) -> Result<Account, PaymentError>
    where
        F: FnOnce(&mut Account) -> Result<(), PaymentError>,
    {
        let mut entry = self
            .accounts
            .get_mut(card)
            .ok_or_else(|| PaymentError::account_not_found(card))?;

        let mut updated = entry.value().clone();
        f(&mut updated)?;
        updated.updated_at = Utc::now();
        *entry.value_mut() = updated.clone();

        Ok(updated)
    }
}

#[async_trait]
impl AccountLedger for InMemoryAccountLedger {
    async fn open_account(&self, account: Account) -> Result<(), PaymentError> {
        if account.available < Decimal::ZERO || account.held < Decimal::ZERO {
            return Err(PaymentError::config(format!(
                "account for card {} has a negative balance",
                crate::types::mask_card_number(&account.card)
            )));
        }

        match self.accounts.entry(account.card.clone()) {
            Entry::Occupied(_) => Err(PaymentError::storage(format!(
                "account for card {} already exists",
                crate::types::mask_card_number(&account.card)
            ))),
            Entry::Vacant(slot) => {
                slot.insert(account);
                Ok(())
            }
        }
    }

    async fn get(&self, card: &str) -> Result<Option<Account>, PaymentError> {
        Ok(self.accounts.get(card).map(|entry| entry.value().clone()))
    }

    async fn hold(&self, card: &str, amount: Decimal) -> Result<Account, PaymentError> {
        self.update(card, |account| {
            if amount <= Decimal::ZERO {
                return Err(PaymentError::invalid_amount(amount));
            }

            if amount > account.available {
                return Err(PaymentError::insufficient_funds(
                    card,
                    account.available,
                    amount,
                ));
            }

            account.held = amount;
            Ok(())
        })
    }

    async fn capture(&self, card: &str, amount: Decimal) -> Result<Account, PaymentError> {
        self.update(card, |account| {
            if amount > account.held {
                return Err(PaymentError::exceeds_held_balance(card, account.held, amount));
            }

            if amount > account.available {
                return Err(PaymentError::insufficient_funds(
                    card,
                    account.available,
                    amount,
                ));
            }

            let new_available = account
                .available
                .checked_sub(amount)
                .ok_or_else(|| PaymentError::arithmetic_underflow("capture", card))?;

            let new_held = account
                .held
                .checked_sub(amount)
                .ok_or_else(|| PaymentError::arithmetic_underflow("capture", card))?;

            account.available = new_available;
            account.held = new_held;
            Ok(())
        })
    }

    async fn refund(&self, card: &str, amount: Decimal) -> Result<Account, PaymentError> {
        self.update(card, |account| {
            if amount > account.held {
                return Err(PaymentError::exceeds_held_balance(card, account.held, amount));
            }

            let new_available = account
                .available
                .checked_add(amount)
                .ok_or_else(|| PaymentError::arithmetic_overflow("refund", card))?;

            let new_held = account
                .held
                .checked_sub(amount)
                .ok_or_else(|| PaymentError::arithmetic_underflow("refund", card))?;

            account.available = new_available;
            account.held = new_held;
            Ok(())
        })
    }

    async fn release_hold(&self, card: &str) -> Result<Account, PaymentError> {
        self.update(card, |account| {
            account.held = Decimal::ZERO;
            Ok(())
        })
    }

    async fn restore(&self, account: Account) -> Result<(), PaymentError> {
        let mut entry = self
            .accounts
            .get_mut(&account.card)
            .ok_or_else(|| PaymentError::account_not_found(&account.card))?;

        *entry.value_mut() = account;
        Ok(())
    }

    async fn all_accounts(&self) -> Result<Vec<Account>, PaymentError> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.card.cmp(&b.card));
        Ok(accounts)
    }
}
