//! Reconciliation of a cost breakdown
//!
//! Checks that every declaration-level figure equals the sum of its
//! addition-level shares, and every addition-level figure equals the sum of
//! its good-level shares. Nothing is corrected: violations are reported with
//! the figure, the scope, and the expected/actual values.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::breakdown::CostBreakdown;
use crate::error::{CalculationError, Result};
use crate::tax::TaxKind;

/// Rounding tolerance applied by reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPolicy {
    /// Allowed drift per summed line (one centavo by default)
    pub tolerance_per_line: Decimal,
}

impl Default for ReconciliationPolicy {
    fn default() -> Self {
        Self {
            tolerance_per_line: Decimal::new(1, 2),
        }
    }
}

impl ReconciliationPolicy {
    /// Cumulative tolerance for a sum over `lines` rounded shares.
    pub fn tolerance_for(&self, lines: usize) -> Decimal {
        self.tolerance_per_line * Decimal::from(lines.max(1))
    }
}

/// Which figure failed to reconcile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Figure {
    Tax(TaxKind),
    Expense(String),
    TotalCost,
}

impl fmt::Display for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Figure::Tax(kind) => write!(f, "{}", kind),
            Figure::Expense(name) => write!(f, "expense '{}'", name),
            Figure::TotalCost => f.write_str("total cost"),
        }
    }
}

/// Level whose total was compared against its children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    Declaration,
    Addition(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Declaration => f.write_str("declaration"),
            Scope::Addition(number) => write!(f, "addition {}", number),
        }
    }
}

/// A violated sum invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub figure: Figure,
    pub scope: Scope,
    pub expected: Decimal,
    pub actual: Decimal,
    pub tolerance: Decimal,
}

impl Mismatch {
    pub fn difference(&self) -> Decimal {
        self.actual - self.expected
    }
}

impl From<Mismatch> for CalculationError {
    fn from(m: Mismatch) -> Self {
        CalculationError::ReconciliationMismatch {
            figure: m.figure.to_string(),
            scope: m.scope.to_string(),
            expected: m.expected,
            actual: m.actual,
            tolerance: m.tolerance,
        }
    }
}

fn check(
    out: &mut Vec<Mismatch>,
    figure: Figure,
    scope: Scope,
    expected: Decimal,
    actual: Decimal,
    tolerance: Decimal,
) {
    if (actual - expected).abs() > tolerance {
        out.push(Mismatch {
            figure,
            scope,
            expected,
            actual,
            tolerance,
        });
    }
}

/// Every violated invariant, taxes first, then expenses, then total cost.
pub fn find_mismatches(breakdown: &CostBreakdown, policy: &ReconciliationPolicy) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    let addition_tolerance = policy.tolerance_for(breakdown.additions.len());

    for kind in TaxKind::ALL {
        let actual: Decimal = breakdown
            .additions
            .iter()
            .map(|a| a.taxes.amounts().get(kind))
            .sum();
        check(
            &mut mismatches,
            Figure::Tax(kind),
            Scope::Declaration,
            breakdown.totals.taxes.get(kind),
            actual,
            addition_tolerance,
        );

        for addition in &breakdown.additions {
            let actual: Decimal = addition.goods.iter().map(|g| g.taxes.get(kind)).sum();
            check(
                &mut mismatches,
                Figure::Tax(kind),
                Scope::Addition(addition.number.clone()),
                addition.taxes.amounts().get(kind),
                actual,
                policy.tolerance_for(addition.goods.len()),
            );
        }
    }

    for (index, expense) in breakdown.expenses.iter().enumerate() {
        let share_of = |shares: &[crate::apportion::ApportionedExpense]| {
            shares.get(index).map_or(Decimal::ZERO, |s| s.amount)
        };
        let name = expense.kind.label().to_string();

        let actual: Decimal = breakdown.additions.iter().map(|a| share_of(&a.expenses)).sum();
        check(
            &mut mismatches,
            Figure::Expense(name.clone()),
            Scope::Declaration,
            expense.amount,
            actual,
            addition_tolerance,
        );

        for addition in &breakdown.additions {
            let actual: Decimal = addition.goods.iter().map(|g| share_of(&g.expenses)).sum();
            check(
                &mut mismatches,
                Figure::Expense(name.clone()),
                Scope::Addition(addition.number.clone()),
                share_of(&addition.expenses),
                actual,
                policy.tolerance_for(addition.goods.len()),
            );
        }
    }

    let actual: Decimal = breakdown.additions.iter().map(|a| a.total_cost).sum();
    check(
        &mut mismatches,
        Figure::TotalCost,
        Scope::Declaration,
        breakdown.totals.total_cost,
        actual,
        addition_tolerance,
    );
    for addition in &breakdown.additions {
        let actual: Decimal = addition.goods.iter().map(|g| g.total_cost).sum();
        check(
            &mut mismatches,
            Figure::TotalCost,
            Scope::Addition(addition.number.clone()),
            addition.total_cost,
            actual,
            // value, five taxes and every expense are rounded per good
            policy.tolerance_for(addition.goods.len() * (6 + breakdown.expenses.len())),
        );
    }

    mismatches
}

/// Fail with the first violated invariant, if any.
pub fn reconcile(breakdown: &CostBreakdown, policy: &ReconciliationPolicy) -> Result<()> {
    match find_mismatches(breakdown, policy).into_iter().next() {
        Some(mismatch) => Err(mismatch.into()),
        None => Ok(()),
    }
}
