//! CSV format handling for operation records and report output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to domain operations
//! - Account and authorization report serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{
    Account, Authorization, AuthorizationRequest, AuthorizationResponse, Currency, Operation,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns:
/// `type, ref, card, currency, cvv, amount, exp_month, exp_year, final`.
/// Only `type` and `ref` are always required; which of the other columns must
/// be filled depends on the operation type.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub card: Option<String>,
    pub currency: Option<String>,
    pub cvv: Option<String>,
    pub amount: Option<String>,
    pub exp_month: Option<String>,
    pub exp_year: Option<String>,
    #[serde(rename = "final")]
    pub final_flag: Option<String>,
}

/// Treat empty or whitespace-only cells as absent
fn non_empty(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn require(
    field: Option<String>,
    name: &str,
    op_type: &str,
    reference: &str,
) -> Result<String, String> {
    non_empty(field)
        .ok_or_else(|| format!("{} operation '{}' requires {}", op_type, reference, name))
}

fn parse_amount(field: Option<String>, op_type: &str, reference: &str) -> Result<Decimal, String> {
    let raw = require(field, "an amount", op_type, reference)?;
    Decimal::from_str(&raw).map_err(|_| format!("Invalid amount '{}' for ref {}", raw, reference))
}

fn parse_number<T: FromStr>(raw: String, name: &str, reference: &str) -> Result<T, String> {
    raw.parse::<T>()
        .map_err(|_| format!("Invalid {} '{}' for ref {}", name, raw, reference))
}

/// Parse the `final` column: empty means false
fn parse_final(field: Option<String>, reference: &str) -> Result<bool, String> {
    match non_empty(field) {
        None => Ok(false),
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(format!("Invalid final flag '{}' for ref {}", raw, reference)),
        },
    }
}

/// Convert a CsvRecord to an Operation
///
/// This function:
/// - Parses the operation type case-insensitively
/// - Validates that the columns the operation type needs are present
/// - Parses amounts into `Decimal` and the expiry into integers
///
/// # Arguments
///
/// * `csv_record` - The deserialized CSV record
///
/// # Returns
///
/// Result containing either:
/// - Ok(Operation) - Successfully converted record
/// - Err(String) - Error message describing the conversion failure
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<Operation, String> {
    let reference = csv_record.reference.trim().to_string();
    if reference.is_empty() {
        return Err(format!(
            "Operation '{}' is missing its ref",
            csv_record.op_type
        ));
    }

    let op_type = csv_record.op_type.to_lowercase();
    match op_type.as_str() {
        "authorize" => {
            let card_number = require(csv_record.card, "a card", &op_type, &reference)?;
            let currency = require(csv_record.currency, "a currency", &op_type, &reference)?;
            let cvv = require(csv_record.cvv, "a cvv", &op_type, &reference)?;
            let amount = parse_amount(csv_record.amount, &op_type, &reference)?;
            let expiration_month = parse_number(
                require(csv_record.exp_month, "an expiration month", &op_type, &reference)?,
                "expiration month",
                &reference,
            )?;
            let expiration_year = parse_number(
                require(csv_record.exp_year, "an expiration year", &op_type, &reference)?,
                "expiration year",
                &reference,
            )?;

            Ok(Operation::Authorize {
                reference,
                request: AuthorizationRequest {
                    card_number,
                    currency: Currency::new(currency),
                    cvv,
                    amount,
                    expiration_month,
                    expiration_year,
                },
            })
        }
        "capture" => Ok(Operation::Capture {
            amount: parse_amount(csv_record.amount, &op_type, &reference)?,
            final_capture: parse_final(csv_record.final_flag, &reference)?,
            reference,
        }),
        "refund" => Ok(Operation::Refund {
            amount: parse_amount(csv_record.amount, &op_type, &reference)?,
            final_refund: parse_final(csv_record.final_flag, &reference)?,
            reference,
        }),
        "void" => Ok(Operation::Void { reference }),
        _ => Err(format!(
            "Invalid operation type: '{}' for ref {}",
            csv_record.op_type, reference
        )),
    }
}

/// Write account states to CSV format
///
/// Writes accounts in CSV format with columns: card, available, held, currency.
/// Accounts are sorted by card number for deterministic output.
///
/// # Arguments
///
/// * `accounts` - Slice of account states to write
/// * `output` - Mutable reference to a writer for outputting CSV
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["card", "available", "held", "currency"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by(|a, b| a.card.cmp(&b.card));

    for account in sorted_accounts {
        writer
            .write_record(&[
                account.card.clone(),
                format!("{:.4}", account.available),
                format!("{:.4}", account.held),
                account.currency.to_string(),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

/// Write authorizations to CSV format
///
/// Columns: ref, id, card, status, currency_requested, currency_card,
/// authorized, captured, refunded, amount_available. Each authorization is
/// paired with the ref it was opened under; rows are sorted by ref, then id.
pub fn write_authorizations_csv(
    authorizations: &[(String, Authorization)],
    output: &mut dyn Write,
) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record([
            "ref",
            "id",
            "card",
            "status",
            "currency_requested",
            "currency_card",
            "authorized",
            "captured",
            "refunded",
            "amount_available",
        ])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted = authorizations.to_vec();
    sorted.sort_by(|(ref_a, a), (ref_b, b)| ref_a.cmp(ref_b).then(a.id.cmp(&b.id)));

    for (reference, auth) in sorted {
        let response = AuthorizationResponse::from(&auth);
        writer
            .write_record(&[
                reference,
                auth.id.to_string(),
                auth.card_number.clone(),
                auth.status.to_string(),
                auth.currency_requested.to_string(),
                auth.currency_card.to_string(),
                format!("{:.4}", auth.authorized_amount),
                format!("{:.4}", auth.captured_amount),
                format!("{:.4}", auth.refunded_amount),
                format!("{:.4}", response.amount_available),
            ])
            .map_err(|e| format!("Failed to write authorization record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
