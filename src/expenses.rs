//! Customs expenses shared by the whole declaration
//!
//! Automatic expenses (SISCOMEX, AFRMM, capatazia) always compose the ICMS
//! base. Extra expenses entered by the operator compose it only when flagged;
//! otherwise they only add to the landed cost.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::declaration::Declaration;
use crate::error::{CalculationError, Result};
use crate::rates::RateResolver;

/// What an expense entry is
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum ExpenseKind {
    Siscomex,
    Afrmm,
    Capatazia,
    Extra(String),
}

impl ExpenseKind {
    pub fn label(&self) -> &str {
        match self {
            ExpenseKind::Siscomex => "SISCOMEX",
            ExpenseKind::Afrmm => "AFRMM",
            ExpenseKind::Capatazia => "Capatazia",
            ExpenseKind::Extra(name) => name.as_str(),
        }
    }
}

impl fmt::Display for ExpenseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One declaration-level expense, in local currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub kind: ExpenseKind,
    pub amount: Decimal,
    pub composes_icms_base: bool,
}

impl Expense {
    pub fn siscomex(amount: Decimal) -> Self {
        Self::automatic(ExpenseKind::Siscomex, amount)
    }

    pub fn afrmm(amount: Decimal) -> Self {
        Self::automatic(ExpenseKind::Afrmm, amount)
    }

    pub fn capatazia(amount: Decimal) -> Self {
        Self::automatic(ExpenseKind::Capatazia, amount)
    }

    pub fn extra(name: impl Into<String>, amount: Decimal, composes_icms_base: bool) -> Self {
        Self {
            kind: ExpenseKind::Extra(name.into()),
            amount,
            composes_icms_base,
        }
    }

    fn automatic(kind: ExpenseKind, amount: Decimal) -> Self {
        Self {
            kind,
            amount,
            composes_icms_base: true,
        }
    }
}

/// Extra expense as entered by the operator (storage, broker fee, road freight...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraExpense {
    pub name: String,
    pub amount: Decimal,
    #[serde(default)]
    pub composes_icms_base: bool,
}

impl From<&ExtraExpense> for Expense {
    fn from(extra: &ExtraExpense) -> Self {
        Expense::extra(extra.name.clone(), extra.amount, extra.composes_icms_base)
    }
}

/// All expenses of one declaration, in entry order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseSet {
    entries: Vec<Expense>,
}

impl ExpenseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the automatic expenses of a declaration: SISCOMEX from the fee
    /// schedule, AFRMM over freight when the cargo came by sea, and capatazia
    /// when the port handling amount is known.
    pub fn automatic(
        declaration: &Declaration,
        resolver: &RateResolver<'_>,
        capatazia: Option<Decimal>,
    ) -> Result<Self> {
        let mut set = Self::new();

        set.push(Expense::siscomex(
            resolver.siscomex_fee_for(declaration.additions.len())?,
        ));

        if declaration.transport_mode.pays_afrmm() {
            set.push(Expense::afrmm(declaration.freight * resolver.afrmm_rate()?));
        }

        if let Some(amount) = capatazia {
            set.push(Expense::capatazia(amount));
        }

        Ok(set)
    }

    pub fn push(&mut self, expense: Expense) {
        self.entries.push(expense);
    }

    pub fn with(mut self, expense: Expense) -> Self {
        self.push(expense);
        self
    }

    pub fn with_extras<'e>(mut self, extras: impl IntoIterator<Item = &'e ExtraExpense>) -> Self {
        for extra in extras {
            self.push(extra.into());
        }
        self
    }

    pub fn entries(&self) -> &[Expense] {
        &self.entries
    }

    pub fn total(&self) -> Decimal {
        self.entries.iter().map(|e| e.amount).sum()
    }

    pub fn icms_base_total(&self) -> Decimal {
        self.entries
            .iter()
            .filter(|e| e.composes_icms_base)
            .map(|e| e.amount)
            .sum()
    }

    /// Every amount must be non-negative.
    pub fn validate(&self) -> Result<()> {
        match self.entries.iter().find(|e| e.amount < Decimal::ZERO) {
            Some(bad) => Err(CalculationError::InvalidExpense {
                name: bad.kind.label().to_string(),
                amount: bad.amount,
            }),
            None => Ok(()),
        }
    }
}
