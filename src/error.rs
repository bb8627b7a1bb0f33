//! Error handling for the landed-cost engine
//!
//! Every data problem found by the core is a hard error. Nothing here is
//! ever converted into a default value: a missing ICMS rate is reported as
//! missing, never replaced by a "typical" rate.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::tax::TaxKind;

/// Core error types for declaration calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalculationError {
    #[error("unknown jurisdiction: no ICMS rate configured for state '{state}'")]
    UnknownJurisdiction { state: String },

    #[error("missing configuration: {what}")]
    MissingConfiguration { what: String },

    #[error("missing {tax} rate for addition {addition}")]
    MissingTaxRate { tax: TaxKind, addition: String },

    #[error("invalid {tax} rate {rate}: expected a fraction within [0, 1)")]
    InvalidRate { tax: TaxKind, rate: Decimal },

    #[error(
        "reconciliation mismatch for {figure} at {scope}: expected {expected}, got {actual} (tolerance {tolerance})"
    )]
    ReconciliationMismatch {
        figure: String,
        scope: String,
        expected: Decimal,
        actual: Decimal,
        tolerance: Decimal,
    },

    #[error("malformed addition {addition}: {reason}")]
    MalformedAddition { addition: String, reason: String },

    #[error("malformed declaration {declaration}: {reason}")]
    MalformedDeclaration { declaration: String, reason: String },

    #[error("unknown currency code '{code}'")]
    UnknownCurrency { code: String },

    #[error("invalid expense '{name}': amount {amount} is negative")]
    InvalidExpense { name: String, amount: Decimal },
}

/// Result type alias for core calculations
pub type Result<T> = std::result::Result<T, CalculationError>;
