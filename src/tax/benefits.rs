//! State fiscal benefits on import ICMS
//!
//! A benefit never changes the ICMS computed for the declaration; it produces
//! a separate outcome describing how much of that ICMS is actually paid.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::engine::IcmsResult;
use crate::utils::round_currency;

/// Benefit mechanics. Percentages are decimal fractions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BenefitKind {
    /// Presumed credit of a share of the ICMS due (e.g. GO)
    IcmsCredit { percent: Decimal },
    /// Share of the ICMS deferred to a later operation (e.g. SC)
    Deferral { percent: Decimal },
    /// ICMS recomputed at a reduced effective rate over the same base (ES)
    Fundap { effective_rate: Decimal },
}

impl BenefitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BenefitKind::IcmsCredit { .. } => "credito_icms",
            BenefitKind::Deferral { .. } => "diferimento",
            BenefitKind::Fundap { .. } => "fundap",
        }
    }
}

/// A benefit granted by a state, optionally restricted to NCM prefixes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalBenefit {
    pub state: String,
    pub kind: BenefitKind,
    pub code: Option<String>,
    /// Empty means every NCM is covered
    pub ncm_prefixes: Vec<String>,
}

impl FiscalBenefit {
    pub fn covers(&self, ncm: &str) -> bool {
        self.ncm_prefixes.is_empty()
            || self
                .ncm_prefixes
                .iter()
                .any(|prefix| ncm.starts_with(prefix.as_str()))
    }
}

/// Effect of a benefit on one addition's ICMS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenefitOutcome {
    pub kind: BenefitKind,
    pub code: Option<String>,
    pub icms_original: Decimal,
    pub icms_payable: Decimal,
    pub savings: Decimal,
}

impl BenefitOutcome {
    /// Amounts rounded to centavos. Savings stay the difference of the
    /// rounded figures.
    pub fn rounded(&self) -> Self {
        let icms_original = round_currency(self.icms_original);
        let icms_payable = round_currency(self.icms_payable);
        Self {
            kind: self.kind.clone(),
            code: self.code.clone(),
            icms_original,
            icms_payable,
            savings: icms_original - icms_payable,
        }
    }
}

pub fn apply_benefit(benefit: &FiscalBenefit, icms: &IcmsResult) -> BenefitOutcome {
    let icms_payable = match &benefit.kind {
        BenefitKind::IcmsCredit { percent } | BenefitKind::Deferral { percent } => {
            icms.amount - icms.amount * percent
        }
        BenefitKind::Fundap { effective_rate } => icms.base * effective_rate,
    };

    BenefitOutcome {
        kind: benefit.kind.clone(),
        code: benefit.code.clone(),
        icms_original: icms.amount,
        icms_payable,
        savings: icms.amount - icms_payable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::icms_gross_up;
    use rust_decimal_macros::dec;

    fn benefit(kind: BenefitKind, prefixes: &[&str]) -> FiscalBenefit {
        FiscalBenefit {
            state: "GO".to_string(),
            kind,
            code: Some("COMEXPRODUZIR".to_string()),
            ncm_prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_covers_by_prefix() {
        let b = benefit(BenefitKind::IcmsCredit { percent: dec!(0.67) }, &["8471", "8517"]);
        assert!(b.covers("84713012"));
        assert!(b.covers("85171231"));
        assert!(!b.covers("39269090"));
    }

    #[test]
    fn test_no_prefixes_covers_everything() {
        let b = benefit(BenefitKind::Deferral { percent: dec!(0.75) }, &[]);
        assert!(b.covers("39269090"));
    }

    #[test]
    fn test_icms_credit() {
        let icms = icms_gross_up(dec!(810), dec!(0.19)).unwrap();
        assert_eq!(icms.amount, dec!(190));

        let outcome = apply_benefit(
            &benefit(BenefitKind::IcmsCredit { percent: dec!(0.67) }, &[]),
            &icms,
        );
        assert_eq!(outcome.icms_original, dec!(190));
        assert_eq!(outcome.savings, dec!(127.30));
        assert_eq!(outcome.icms_payable, dec!(62.70));
    }

    #[test]
    fn test_deferral() {
        let icms = icms_gross_up(dec!(830), dec!(0.17)).unwrap();
        let outcome = apply_benefit(
            &benefit(BenefitKind::Deferral { percent: dec!(0.75) }, &[]),
            &icms,
        );
        assert_eq!(outcome.icms_original, dec!(170));
        assert_eq!(outcome.icms_payable, dec!(42.50));
        assert_eq!(outcome.savings, dec!(127.50));
    }

    #[test]
    fn test_fundap_recomputes_at_effective_rate() {
        let icms = icms_gross_up(dec!(830), dec!(0.17)).unwrap();
        let outcome = apply_benefit(
            &benefit(BenefitKind::Fundap { effective_rate: dec!(0.03) }, &[]),
            &icms,
        );
        assert_eq!(outcome.icms_payable, dec!(30));
        assert_eq!(outcome.savings, dec!(140));
    }

    #[test]
    fn test_rounded_outcome_keeps_savings_consistent() {
        let icms = icms_gross_up(dec!(1163.50), dec!(0.19)).unwrap();
        let outcome = apply_benefit(
            &benefit(BenefitKind::IcmsCredit { percent: dec!(0.67) }, &[]),
            &icms,
        )
        .rounded();

        assert_eq!(outcome.icms_original, dec!(272.92));
        assert_eq!(outcome.icms_payable, dec!(90.06));
        assert_eq!(outcome.savings, outcome.icms_original - outcome.icms_payable);
    }
}
