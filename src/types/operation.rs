//! Operation records driven through the engine by the command-line front end
//!
//! Each record names an authorization by a caller-chosen reference. An
//! `Authorize` record binds the reference to the id the engine generates;
//! later records resolve it back.

use super::authorization::AuthorizationRequest;
use rust_decimal::Decimal;

/// Caller-chosen label for an authorization within one operations file
pub type OperationRef = String;

/// A single inbound operation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Request a new authorization hold
    Authorize {
        reference: OperationRef,
        request: AuthorizationRequest,
    },

    /// Capture part or all of the held amount
    Capture {
        reference: OperationRef,
        amount: Decimal,
        final_capture: bool,
    },

    /// Return captured funds to the account
    Refund {
        reference: OperationRef,
        amount: Decimal,
        final_refund: bool,
    },

    /// Release the hold
    Void { reference: OperationRef },
}

impl Operation {
    pub fn reference(&self) -> &str {
        match self {
            Operation::Authorize { reference, .. }
            | Operation::Capture { reference, .. }
            | Operation::Refund { reference, .. }
            | Operation::Void { reference } => reference,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Authorize { .. } => "authorize",
            Operation::Capture { .. } => "capture",
            Operation::Refund { .. } => "refund",
            Operation::Void { .. } => "void",
        }
    }
}
