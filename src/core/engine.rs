//! Authorization processing engine
//!
//! This module provides the `AuthorizationEngine` that owns the authorization
//! state machine. It coordinates the card validator, the currency converter,
//! the account ledger and the card/authorization stores.
//!
//! # State Machine
//!
//! | Operation | From | To |
//! |---|---|---|
//! | `request_authorization` | - | `Authorized` |
//! | `capture` | `Authorized` | `Captured` when final or fully captured, else `Authorized` |
//! | `refund` | `Authorized` | `Refunded` when final or fully refunded, else `Authorized` |
//! | `void` | `Authorized` | `Voided` |
//!
//! Every other combination fails with `InvalidStatus`. Entering any terminal
//! status releases whatever is still held on the card's account.
//!
//! # Consistency
//!
//! Each operation runs its read-validate-mutate-persist sequence while holding
//! an async mutex dedicated to the card, so concurrent operations on the same
//! authorization or account are serialized and always see each other's
//! results. Preconditions are checked before any ledger mutation; the ledger
//! mutation is the last step before the authorization is written, and a failed
//! write restores the account snapshot taken under the same lock.
//!
//! Currency conversion happens before the lock is taken so a slow rate
//! lookup never delays operations on other cards.

use crate::core::traits::{
    AccountLedger, AuthorizationStore, CardStore, CardValidator, CurrencyConverter,
};
use crate::types::{
    mask_card_number, Account, AuthStatus, Authorization, AuthorizationId, AuthorizationRequest,
    AuthorizationResponse, CardNumber, PaymentError,
};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Authorization state machine
///
/// Cheap to share: wrap it in an `Arc` and call it from as many tasks as
/// needed.
pub struct AuthorizationEngine {
    validator: Arc<dyn CardValidator>,
    converter: Arc<dyn CurrencyConverter>,
    ledger: Arc<dyn AccountLedger>,
    cards: Arc<dyn CardStore>,
    authorizations: Arc<dyn AuthorizationStore>,

    /// One mutex per card number, created on first use
    card_locks: DashMap<CardNumber, Arc<Mutex<()>>>,
}

impl AuthorizationEngine {
    pub fn new(
        validator: Arc<dyn CardValidator>,
        converter: Arc<dyn CurrencyConverter>,
        ledger: Arc<dyn AccountLedger>,
        cards: Arc<dyn CardStore>,
        authorizations: Arc<dyn AuthorizationStore>,
    ) -> Self {
        AuthorizationEngine {
            validator,
            converter,
            ledger,
            cards,
            authorizations,
            card_locks: DashMap::new(),
        }
    }

    /// Place a hold on the card's account and open a new authorization
    ///
    /// # Errors
    ///
    /// Checked in order, stopping at the first failure:
    /// - `InvalidAmount` if the amount is not positive
    /// - `InvalidCardNumber` if the number fails the length or Luhn check
    /// - `CardNotFound` if no such card is stored
    /// - `NoMatchCvv` / `NoMatchExpiration` if the card data does not match
    /// - `AuthorizationAlreadyOpen` if the card already has an `Authorized` hold
    /// - `ConversionFailed` if the currencies differ and the rate lookup fails
    /// - `AccountNotFound` / `InvalidAmount` / `InsufficientFunds` from the ledger hold
    pub async fn request_authorization(
        &self,
        request: AuthorizationRequest,
    ) -> Result<Authorization, PaymentError> {
        let masked = mask_card_number(&request.card_number);

        let result = self.try_request_authorization(request).await;
        match &result {
            Ok(auth) => info!(
                id = %auth.id,
                card = %masked,
                amount = %auth.authorized_amount,
                currency = %auth.currency_card,
                "authorization opened"
            ),
            Err(e) => warn!(card = %masked, error = %e, "authorization rejected"),
        }
        result
    }

    async fn try_request_authorization(
        &self,
        request: AuthorizationRequest,
    ) -> Result<Authorization, PaymentError> {
        if request.amount <= Decimal::ZERO {
            return Err(PaymentError::invalid_amount(request.amount));
        }

        if !self.validator.validate_luhn_number(&request.card_number) {
            return Err(PaymentError::invalid_card_number(&request.card_number));
        }

        let card = self
            .cards
            .find_by_number(&request.card_number)
            .await?
            .ok_or_else(|| PaymentError::card_not_found(&request.card_number))?;

        self.validator.validate_existing(
            &card,
            &request.cvv,
            request.expiration_month,
            request.expiration_year,
        )?;

        // Early rejection; repeated under the lock below
        self.ensure_no_open_authorization(&card.number).await?;

        let amount = if card.currency != request.currency {
            self.converter
                .convert(request.amount, &request.currency, &card.currency)
                .await?
        } else {
            request.amount
        };

        let lock = self.card_lock(&card.number);
        let _guard = lock.lock().await;

        self.ensure_no_open_authorization(&card.number).await?;

        let snapshot = self.account_snapshot(&card.number).await?;
        self.ledger.hold(&card.number, amount).await?;

        let authorization = Authorization::new(&card, request.currency, amount);
        if let Err(e) = self.authorizations.create(authorization.clone()).await {
            return Err(self.roll_back(snapshot, e).await);
        }

        Ok(authorization)
    }

    /// Capture part or all of an authorization's held amount
    ///
    /// The authorization becomes `Captured` when `final_capture` is set or when
    /// the cumulative captured amount reaches the authorized amount. Any hold
    /// left after a final partial capture is released.
    ///
    /// # Errors
    ///
    /// - `AuthorizationNotFound`
    /// - `InvalidStatus` unless the authorization is `Authorized`
    /// - `InvalidAmount` if the amount is not positive or would capture more
    ///   than was authorized
    /// - `ExceedsHeldBalance` / `InsufficientFunds` / `AccountNotFound` from the ledger
    pub async fn capture(
        &self,
        id: AuthorizationId,
        amount: Decimal,
        final_capture: bool,
    ) -> Result<Authorization, PaymentError> {
        let result = self.try_capture(id, amount, final_capture).await;
        log_outcome("capture", id, amount, &result);
        result
    }

    async fn try_capture(
        &self,
        id: AuthorizationId,
        amount: Decimal,
        final_capture: bool,
    ) -> Result<Authorization, PaymentError> {
        let card = self.load(id).await?.card_number;
        let lock = self.card_lock(&card);
        let _guard = lock.lock().await;

        let mut auth = self.load(id).await?;
        ensure_authorized(&auth)?;

        if amount <= Decimal::ZERO || amount > auth.authorized_amount {
            return Err(PaymentError::invalid_amount(amount));
        }

        let captured_after = auth
            .captured_amount
            .checked_add(amount)
            .ok_or_else(|| PaymentError::arithmetic_overflow("capture", &auth.card_number))?;

        if captured_after > auth.authorized_amount {
            return Err(PaymentError::invalid_amount(amount));
        }

        let snapshot = self.account_snapshot(&auth.card_number).await?;
        self.ledger.capture(&auth.card_number, amount).await?;

        auth.captured_amount = captured_after;
        if final_capture || captured_after == auth.authorized_amount {
            auth.status = AuthStatus::Captured;
        }
        auth.touch();

        self.commit(auth, snapshot).await
    }

    /// Return captured funds to the account
    ///
    /// Only reachable while the authorization is still `Authorized`; a
    /// `Captured` authorization cannot be refunded. The authorization becomes
    /// `Refunded` when `final_refund` is set or when the cumulative refunded
    /// amount reaches the authorized amount; the remaining hold is then
    /// released.
    ///
    /// # Errors
    ///
    /// - `AuthorizationNotFound`
    /// - `InvalidStatus` unless the authorization is `Authorized`
    /// - `InvalidAmount` if the amount is not positive, exceeds the authorized
    ///   amount, or exceeds what is currently captured
    /// - `ExceedsHeldBalance` / `AccountNotFound` from the ledger
    pub async fn refund(
        &self,
        id: AuthorizationId,
        amount: Decimal,
        final_refund: bool,
    ) -> Result<Authorization, PaymentError> {
        let result = self.try_refund(id, amount, final_refund).await;
        log_outcome("refund", id, amount, &result);
        result
    }

    async fn try_refund(
        &self,
        id: AuthorizationId,
        amount: Decimal,
        final_refund: bool,
    ) -> Result<Authorization, PaymentError> {
        let card = self.load(id).await?.card_number;
        let lock = self.card_lock(&card);
        let _guard = lock.lock().await;

        let mut auth = self.load(id).await?;
        ensure_authorized(&auth)?;

        if amount <= Decimal::ZERO || amount > auth.authorized_amount {
            return Err(PaymentError::invalid_amount(amount));
        }

        let refunded_after = auth
            .refunded_amount
            .checked_add(amount)
            .ok_or_else(|| PaymentError::arithmetic_overflow("refund", &auth.card_number))?;

        if refunded_after > auth.authorized_amount || refunded_after > auth.captured_amount {
            return Err(PaymentError::invalid_amount(amount));
        }

        let captured_after = auth
            .captured_amount
            .checked_sub(amount)
            .ok_or_else(|| PaymentError::arithmetic_underflow("refund", &auth.card_number))?;

        let snapshot = self.account_snapshot(&auth.card_number).await?;
        self.ledger.refund(&auth.card_number, amount).await?;

        auth.captured_amount = captured_after;
        auth.refunded_amount = refunded_after;
        if final_refund || refunded_after == auth.authorized_amount {
            auth.status = AuthStatus::Refunded;
        }
        auth.touch();

        self.commit(auth, snapshot).await
    }

    /// Release the hold and close the authorization as `Voided`
    ///
    /// # Errors
    ///
    /// - `AuthorizationNotFound`
    /// - `InvalidStatus` unless the authorization is `Authorized`
    /// - `AccountNotFound` from the ledger
    pub async fn void(&self, id: AuthorizationId) -> Result<Authorization, PaymentError> {
        let result = self.try_void(id).await;
        log_outcome("void", id, Decimal::ZERO, &result);
        result
    }

    async fn try_void(&self, id: AuthorizationId) -> Result<Authorization, PaymentError> {
        let card = self.load(id).await?.card_number;
        let lock = self.card_lock(&card);
        let _guard = lock.lock().await;

        let mut auth = self.load(id).await?;
        ensure_authorized(&auth)?;

        let snapshot = self.account_snapshot(&auth.card_number).await?;

        // commit releases the hold of every closed authorization
        auth.status = AuthStatus::Voided;
        auth.touch();

        self.commit(auth, snapshot).await
    }

    /// Look up an authorization by id
    pub async fn find_authorization(
        &self,
        id: AuthorizationId,
    ) -> Result<Option<Authorization>, PaymentError> {
        self.authorizations.find_by_id(id).await
    }

    /// Response shape returned to the caller of an operation
    pub fn projection(authorization: &Authorization) -> AuthorizationResponse {
        AuthorizationResponse::from(authorization)
    }

    /// Current balances of the card's account
    pub async fn account(&self, card: &str) -> Result<Option<Account>, PaymentError> {
        self.ledger.get(card).await
    }

    pub async fn accounts(&self) -> Result<Vec<Account>, PaymentError> {
        self.ledger.all_accounts().await
    }

    pub async fn authorizations(&self) -> Result<Vec<Authorization>, PaymentError> {
        self.authorizations.all().await
    }

    fn card_lock(&self, card: &str) -> Arc<Mutex<()>> {
        self.card_locks
            .entry(card.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, id: AuthorizationId) -> Result<Authorization, PaymentError> {
        self.authorizations
            .find_by_id(id)
            .await?
            .ok_or_else(|| PaymentError::authorization_not_found(id))
    }

    async fn account_snapshot(&self, card: &str) -> Result<Account, PaymentError> {
        self.ledger
            .get(card)
            .await?
            .ok_or_else(|| PaymentError::account_not_found(card))
    }

    async fn ensure_no_open_authorization(&self, card: &CardNumber) -> Result<(), PaymentError> {
        match self.authorizations.find_open_by_card(card).await? {
            Some(open) => Err(PaymentError::authorization_already_open(card, open.id)),
            None => Ok(()),
        }
    }

    /// Persist the authorization, undoing the ledger change if that fails
    ///
    /// A closed authorization keeps nothing on hold, so whatever a final
    /// partial capture or refund left behind is released first.
    async fn commit(
        &self,
        auth: Authorization,
        snapshot: Account,
    ) -> Result<Authorization, PaymentError> {
        if auth.status.is_terminal() {
            if let Err(e) = self.ledger.release_hold(&auth.card_number).await {
                return Err(self.roll_back(snapshot, e).await);
            }
        }

        match self.authorizations.update(auth.clone()).await {
            Ok(()) => Ok(auth),
            Err(e) => Err(self.roll_back(snapshot, e).await),
        }
    }

    async fn roll_back(&self, snapshot: Account, cause: PaymentError) -> PaymentError {
        let card = mask_card_number(&snapshot.card);
        error!(card = %card, error = %cause, "authorization write failed, restoring account");
        if let Err(restore_error) = self.ledger.restore(snapshot).await {
            error!(card = %card, error = %restore_error, "account restore failed");
        }
        cause
    }
}

fn ensure_authorized(auth: &Authorization) -> Result<(), PaymentError> {
    if auth.status.is_terminal() {
        return Err(PaymentError::invalid_status(auth.id, auth.status));
    }
    Ok(())
}

fn log_outcome(
    operation: &str,
    id: AuthorizationId,
    amount: Decimal,
    result: &Result<Authorization, PaymentError>,
) {
    match result {
        Ok(auth) => info!(
            %id,
            operation,
            %amount,
            status = %auth.status,
            captured = %auth.captured_amount,
            refunded = %auth.refunded_amount,
            "authorization updated"
        ),
        Err(e) => warn!(%id, operation, %amount, error = %e, "operation rejected"),
    }
}
