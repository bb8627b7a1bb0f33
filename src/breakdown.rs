//! Landed-cost breakdown produced by a calculation run
//!
//! Every stored amount is rounded half-even to centavos. The calculator works
//! at full precision and rounds only when it fills these structs, so the
//! addition-level figures here are the rounded full-precision results while
//! the goods' figures are rounded shares of the full-precision amounts.
//! Expense vectors are aligned with
//! [`CostBreakdown::expenses`]: entry `i` of every addition and every good is
//! the share of declaration expense `i`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::apportion::ApportionedExpense;
use crate::expenses::Expense;
use crate::tax::{BenefitOutcome, FederalTaxes, IcmsResult, TaxKind, TaxResult};

/// One amount per tax
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxAmounts {
    pub ii: Decimal,
    pub ipi: Decimal,
    pub pis: Decimal,
    pub cofins: Decimal,
    pub icms: Decimal,
}

impl TaxAmounts {
    pub fn from_fn(mut f: impl FnMut(TaxKind) -> Decimal) -> Self {
        Self {
            ii: f(TaxKind::Ii),
            ipi: f(TaxKind::Ipi),
            pis: f(TaxKind::Pis),
            cofins: f(TaxKind::Cofins),
            icms: f(TaxKind::Icms),
        }
    }

    pub fn get(&self, kind: TaxKind) -> Decimal {
        match kind {
            TaxKind::Ii => self.ii,
            TaxKind::Ipi => self.ipi,
            TaxKind::Pis => self.pis,
            TaxKind::Cofins => self.cofins,
            TaxKind::Icms => self.icms,
        }
    }

    pub fn total(&self) -> Decimal {
        TaxKind::ALL.iter().map(|k| self.get(*k)).sum()
    }

    pub fn accumulate(&mut self, other: &TaxAmounts) {
        self.ii += other.ii;
        self.ipi += other.ipi;
        self.pis += other.pis;
        self.cofins += other.cofins;
        self.icms += other.icms;
    }
}

/// Every tax of an addition, with bases and rates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionTaxes {
    pub ii: TaxResult,
    pub ipi: TaxResult,
    pub pis: TaxResult,
    pub cofins: TaxResult,
    pub icms: IcmsResult,
}

impl AdditionTaxes {
    pub fn new(federal: FederalTaxes, icms: IcmsResult) -> Self {
        Self {
            ii: federal.ii,
            ipi: federal.ipi,
            pis: federal.pis,
            cofins: federal.cofins,
            icms,
        }
    }

    /// Bases and amounts rounded to centavos; rates untouched.
    pub fn rounded(&self) -> Self {
        Self {
            ii: self.ii.rounded(),
            ipi: self.ipi.rounded(),
            pis: self.pis.rounded(),
            cofins: self.cofins.rounded(),
            icms: self.icms.rounded(),
        }
    }

    pub fn amounts(&self) -> TaxAmounts {
        TaxAmounts {
            ii: self.ii.amount,
            ipi: self.ipi.amount,
            pis: self.pis.amount,
            cofins: self.cofins.amount,
            icms: self.icms.amount,
        }
    }
}

/// Per-good landed cost (rounded to centavos)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodBreakdown {
    pub code: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_value: Decimal,
    pub value: Decimal,
    pub taxes: TaxAmounts,
    pub expenses: Vec<ApportionedExpense>,
    pub total_taxes: Decimal,
    pub total_expenses: Decimal,
    pub total_cost: Decimal,
    pub unit_cost: Decimal,
}

/// Per-addition landed cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionBreakdown {
    pub number: String,
    pub ncm: String,
    pub supplier: Option<String>,
    pub customs_value: Decimal,
    pub taxes: AdditionTaxes,
    pub expenses: Vec<ApportionedExpense>,
    pub benefit: Option<BenefitOutcome>,
    pub goods: Vec<GoodBreakdown>,
    pub total_taxes: Decimal,
    pub total_expenses: Decimal,
    pub total_cost: Decimal,
}

/// Declaration-level sums over additions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationTotals {
    pub customs_value: Decimal,
    pub taxes: TaxAmounts,
    pub total_taxes: Decimal,
    pub total_expenses: Decimal,
    pub total_cost: Decimal,
    /// ICMS actually paid once state benefits are applied
    pub icms_payable: Decimal,
}

/// Result of one calculation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub declaration_number: String,
    pub destination_state: String,
    pub currency: String,
    pub exchange_rate: Decimal,
    pub icms_rate: Decimal,
    /// Declaration-level expense entries, in entry order
    pub expenses: Vec<Expense>,
    pub additions: Vec<AdditionBreakdown>,
    pub totals: DeclarationTotals,
}

impl CostBreakdown {
    /// Every good with the addition it belongs to, in input order.
    pub fn goods(&self) -> impl Iterator<Item = (&AdditionBreakdown, &GoodBreakdown)> {
        self.additions
            .iter()
            .flat_map(|a| a.goods.iter().map(move |g| (a, g)))
    }

    pub fn goods_count(&self) -> usize {
        self.additions.iter().map(|a| a.goods.len()).sum()
    }

    pub fn addition(&self, number: &str) -> Option<&AdditionBreakdown> {
        self.additions.iter().find(|a| a.number == number)
    }
}
