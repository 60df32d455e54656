//! Authorization and card storage
//!
//! In-memory implementations of the [`AuthorizationStore`] and [`CardStore`]
//! traits. Both use `DashMap` so lookups for different records do not contend.
//!
//! # Open Authorization Index
//!
//! The authorization store keeps a secondary index from card number to the id
//! of that card's non-terminal authorization. It is maintained on every create
//! and update, so `find_open_by_card` is a single lookup.

use crate::core::traits::{AuthorizationStore, CardStore};
use crate::types::{
    mask_card_number, AuthStatus, Authorization, AuthorizationId, Card, CardNumber, PaymentError,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// In-memory authorization store
#[derive(Debug, Default)]
pub struct InMemoryAuthorizationStore {
    /// Authorization records by id
    authorizations: DashMap<AuthorizationId, Authorization>,

    /// Card number to open (non-terminal) authorization id
    open_by_card: DashMap<CardNumber, AuthorizationId>,
}

impl InMemoryAuthorizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(&self, authorization: &Authorization) {
        if authorization.status == AuthStatus::Authorized {
            self.open_by_card
                .insert(authorization.card_number.clone(), authorization.id);
        } else {
            self.open_by_card
                .remove_if(&authorization.card_number, |_, id| *id == authorization.id);
        }
    }
}

#[async_trait]
impl AuthorizationStore for InMemoryAuthorizationStore {
    async fn create(&self, authorization: Authorization) -> Result<(), PaymentError> {
        match self.authorizations.entry(authorization.id) {
            Entry::Occupied(_) => Err(PaymentError::storage(format!(
                "authorization {} already exists",
                authorization.id
            ))),
            Entry::Vacant(slot) => {
                self.index(&authorization);
                slot.insert(authorization);
                Ok(())
            }
        }
    }

    async fn update(&self, authorization: Authorization) -> Result<(), PaymentError> {
        let mut entry = self
            .authorizations
            .get_mut(&authorization.id)
            .ok_or_else(|| PaymentError::authorization_not_found(authorization.id))?;

        self.index(&authorization);
        *entry.value_mut() = authorization;
        Ok(())
    }

    async fn find_by_id(&self, id: AuthorizationId) -> Result<Option<Authorization>, PaymentError> {
        Ok(self.authorizations.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_open_by_card(
        &self,
        card: &CardNumber,
    ) -> Result<Option<Authorization>, PaymentError> {
        let Some(id) = self.open_by_card.get(card).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn all(&self) -> Result<Vec<Authorization>, PaymentError> {
        let mut authorizations: Vec<Authorization> = self
            .authorizations
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        authorizations.sort_by_key(|auth| auth.created_at);
        Ok(authorizations)
    }
}

/// In-memory card store
#[derive(Debug, Default)]
pub struct InMemoryCardStore {
    cards: DashMap<CardNumber, Card>,
}

impl InMemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CardStore for InMemoryCardStore {
    async fn save(&self, card: Card) -> Result<(), PaymentError> {
        match self.cards.entry(card.number.clone()) {
            Entry::Occupied(_) => Err(PaymentError::storage(format!(
                "card {} already exists",
                mask_card_number(&card.number)
            ))),
            Entry::Vacant(slot) => {
                slot.insert(card);
                Ok(())
            }
        }
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Card>, PaymentError> {
        Ok(self.cards.get(number).map(|entry| entry.value().clone()))
    }
}
