//! Operation driver
//!
//! Feeds a stream of operation records through the authorization engine and
//! renders a report of the final state. This is the command-line stand-in for
//! an inbound request surface.
//!
//! # Refs
//!
//! Authorization ids are generated by the engine, so an operations file names
//! authorizations by caller-chosen refs instead. An `authorize` row binds its
//! ref to the new id; `capture`, `refund` and `void` rows resolve it. A ref is
//! bound once: it stays attached to its authorization even after that
//! authorization reaches a terminal state.
//!
//! # Error Handling
//!
//! A rejected or malformed row is logged with `warn!` and skipped; processing
//! continues with the next row. Only failures to set up the ledger or write the
//! report abort the run.

use crate::cli::ReportKind;
use crate::config::{provision, AppConfig};
use crate::core::{
    AuthorizationEngine, CardValidator, InMemoryAccountLedger, InMemoryAuthorizationStore,
    InMemoryCardStore, LuhnCardValidator, RateConverter, RateSource,
};
use crate::io::{write_accounts_csv, write_authorizations_csv};
use crate::types::{Authorization, AuthorizationId, Operation, OperationRef, PaymentError};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Build an engine over fresh in-memory stores loaded with the seed
///
/// # Errors
///
/// Any error from [`provision`]: an invalid seed aborts startup.
pub async fn bootstrap(
    config: &AppConfig,
    rate_source: Arc<dyn RateSource>,
    conversion_timeout: Duration,
    today: NaiveDate,
) -> Result<AuthorizationEngine, PaymentError> {
    let validator: Arc<dyn CardValidator> = Arc::new(LuhnCardValidator::new());
    let cards = Arc::new(InMemoryCardStore::new());
    let ledger = Arc::new(InMemoryAccountLedger::new());

    provision(config, cards.as_ref(), ledger.as_ref(), validator.as_ref(), today).await?;

    Ok(AuthorizationEngine::new(
        validator,
        Arc::new(RateConverter::with_timeout(rate_source, conversion_timeout)),
        ledger,
        cards,
        Arc::new(InMemoryAuthorizationStore::new()),
    ))
}

/// Outcome counts of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub applied: usize,
    pub rejected: usize,
}

/// Applies operations in order, tracking refs
pub struct OperationDriver {
    engine: Arc<AuthorizationEngine>,
    refs: HashMap<OperationRef, AuthorizationId>,
}

impl OperationDriver {
    pub fn new(engine: Arc<AuthorizationEngine>) -> Self {
        OperationDriver {
            engine,
            refs: HashMap::new(),
        }
    }

    /// Apply a single operation
    ///
    /// # Errors
    ///
    /// * `Config` if an `authorize` row reuses a bound ref, or a follow-up row
    ///   names a ref that was never bound
    /// * Any error the engine returns for the operation
    pub async fn apply(&mut self, operation: Operation) -> Result<Authorization, PaymentError> {
        match operation {
            Operation::Authorize { reference, request } => {
                if self.refs.contains_key(&reference) {
                    return Err(PaymentError::config(format!(
                        "ref '{}' is already bound to an authorization",
                        reference
                    )));
                }
                let authorization = self.engine.request_authorization(request).await?;
                self.refs.insert(reference, authorization.id);
                Ok(authorization)
            }
            Operation::Capture {
                reference,
                amount,
                final_capture,
            } => {
                let id = self.resolve(&reference)?;
                self.engine.capture(id, amount, final_capture).await
            }
            Operation::Refund {
                reference,
                amount,
                final_refund,
            } => {
                let id = self.resolve(&reference)?;
                self.engine.refund(id, amount, final_refund).await
            }
            Operation::Void { reference } => {
                let id = self.resolve(&reference)?;
                self.engine.void(id).await
            }
        }
    }

    /// Apply every operation of the stream, skipping failures
    pub async fn run<I>(&mut self, operations: I) -> RunSummary
    where
        I: IntoIterator<Item = Result<Operation, PaymentError>>,
    {
        let mut summary = RunSummary::default();

        for next in operations {
            let operation = match next {
                Ok(operation) => operation,
                Err(e) => {
                    warn!(error = %e, "skipping malformed operation");
                    summary.rejected += 1;
                    continue;
                }
            };

            let kind = operation.kind();
            let reference = operation.reference().to_string();
            match self.apply(operation).await {
                Ok(_) => summary.applied += 1,
                Err(e) => {
                    warn!(operation = kind, reference = %reference, error = %e, "operation failed");
                    summary.rejected += 1;
                }
            }
        }

        info!(
            applied = summary.applied,
            rejected = summary.rejected,
            "operations processed"
        );
        summary
    }

    /// Write the requested report as CSV
    pub async fn write_report(
        &self,
        report: ReportKind,
        output: &mut dyn Write,
    ) -> Result<(), PaymentError> {
        let to_io = |message: String| PaymentError::IoError { message };

        match report {
            ReportKind::Accounts => {
                let accounts = self.engine.accounts().await?;
                write_accounts_csv(&accounts, output).map_err(to_io)
            }
            ReportKind::Authorizations => {
                let by_id: HashMap<AuthorizationId, &OperationRef> = self
                    .refs
                    .iter()
                    .map(|(reference, id)| (*id, reference))
                    .collect();

                let rows: Vec<(String, Authorization)> = self
                    .engine
                    .authorizations()
                    .await?
                    .into_iter()
                    .map(|auth| {
                        let reference = by_id
                            .get(&auth.id)
                            .map(|reference| reference.to_string())
                            .unwrap_or_default();
                        (reference, auth)
                    })
                    .collect();

                write_authorizations_csv(&rows, output).map_err(to_io)
            }
        }
    }

    fn resolve(&self, reference: &str) -> Result<AuthorizationId, PaymentError> {
        self.refs
            .get(reference)
            .copied()
            .ok_or_else(|| PaymentError::config(format!("unknown ref '{}'", reference)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixedRateSource;
    use crate::io::OperationReader;
    use crate::types::{AuthStatus, AuthorizationRequest, Card, Currency};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const CARD: &str = "4000000000000119";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn seed() -> AppConfig {
        AppConfig::from_json(
            r#"{
                "cards": [ { "number": "4000000000000119", "cvv": "123", "currency": "USD",
                             "expiration_month": 1, "expiration_year": 2031 } ],
                "accounts": [ { "card": "4000000000000119", "balance": "100", "currency": "USD" } ],
                "rates": [ { "from": "EUR", "to": "USD", "rate": "1.5" } ]
            }"#,
        )
        .unwrap()
    }

    async fn driver() -> OperationDriver {
        let config = seed();
        let engine = bootstrap(
            &config,
            Arc::new(config.fixed_rate_source()),
            config.conversion_timeout(),
            today(),
        )
        .await
        .unwrap();
        OperationDriver::new(Arc::new(engine))
    }

    fn authorize(reference: &str, amount: Decimal) -> Operation {
        Operation::Authorize {
            reference: reference.to_string(),
            request: AuthorizationRequest {
                card_number: CARD.to_string(),
                currency: Currency::new("USD"),
                cvv: "123".to_string(),
                amount,
                expiration_month: 1,
                expiration_year: 2031,
            },
        }
    }

    async fn report(driver: &OperationDriver, kind: ReportKind) -> String {
        let mut output = Vec::new();
        driver.write_report(kind, &mut output).await.unwrap();
        String::from_utf8(output).unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_invalid_seed() {
        let mut config = seed();
        config.cards.push(Card {
            number: "4000000000004422".to_string(),
            cvv: "123".to_string(),
            currency: Currency::new("USD"),
            expiration_month: 1,
            expiration_year: 2031,
        });

        let result = bootstrap(
            &config,
            Arc::new(FixedRateSource::new()),
            config.conversion_timeout(),
            today(),
        )
        .await;

        assert!(matches!(result, Err(PaymentError::Config { .. })));
    }

    #[tokio::test]
    async fn test_refs_resolve_follow_up_operations() {
        let mut driver = driver().await;

        let opened = driver.apply(authorize("a1", dec!(10))).await.unwrap();
        let captured = driver
            .apply(Operation::Capture {
                reference: "a1".to_string(),
                amount: dec!(10),
                final_capture: false,
            })
            .await
            .unwrap();

        assert_eq!(captured.id, opened.id);
        assert_eq!(captured.status, AuthStatus::Captured);
    }

    #[tokio::test]
    async fn test_unknown_ref_is_rejected() {
        let mut driver = driver().await;

        let result = driver
            .apply(Operation::Void {
                reference: "missing".to_string(),
            })
            .await;

        assert!(matches!(result, Err(PaymentError::Config { .. })));
    }

    #[tokio::test]
    async fn test_ref_cannot_be_rebound() {
        let mut driver = driver().await;
        let first = driver.apply(authorize("a1", dec!(10))).await.unwrap();
        driver
            .apply(Operation::Void {
                reference: "a1".to_string(),
            })
            .await
            .unwrap();

        let result = driver.apply(authorize("a1", dec!(5))).await;

        assert!(matches!(result, Err(PaymentError::Config { .. })));
        assert_eq!(driver.resolve("a1").unwrap(), first.id);
    }

    #[tokio::test]
    async fn test_run_continues_past_failures() {
        let mut driver = driver().await;
        let content = "type,ref,card,currency,cvv,amount,exp_month,exp_year,final\n\
            authorize,a1,4000000000000119,USD,123,10,1,2031,\n\
            capture,a1,,,,5,,,\n\
            void,nope,,,,,,,\n\
            capture,a1,,,,oops,,,\n\
            refund,a1,,,,5,,,\n";

        let summary = driver.run(OperationReader::from_reader(content.as_bytes())).await;

        assert_eq!(summary, RunSummary { applied: 3, rejected: 2 });
        assert_eq!(
            report(&driver, ReportKind::Accounts).await,
            "card,available,held,currency\n4000000000000119,100.0000,0.0000,USD\n"
        );
    }

    #[tokio::test]
    async fn test_foreign_currency_authorization_report() {
        let mut driver = driver().await;
        let content = "type,ref,card,currency,cvv,amount,exp_month,exp_year,final\n\
            authorize,eur,4000000000000119,EUR,123,10,1,2031,\n";

        driver.run(OperationReader::from_reader(content.as_bytes())).await;

        let output = report(&driver, ReportKind::Authorizations).await;
        let row = output.lines().nth(1).unwrap();
        assert!(row.starts_with("eur,"), "{}", row);
        assert!(
            row.ends_with(",4000000000000119,Authorized,EUR,USD,15.0000,0.0000,0.0000,15.0000"),
            "{}",
            row
        );
    }
}
