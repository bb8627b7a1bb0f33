//! Rate resolution over injected configuration
//!
//! [`RateTables`] is built once (usually by [`crate::config`]) and never
//! mutated; [`RateResolver`] borrows it for the duration of a run. Lookups
//! fail loudly when an entry is missing. The only lookup that may legitimately
//! come back empty is the fiscal benefit one.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CalculationError, Result};
use crate::tax::benefits::FiscalBenefit;

/// Per-addition SISCOMEX fee band. `up_to = None` is open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiscomexTier {
    pub up_to: Option<u32>,
    pub fee_per_addition: Decimal,
}

/// SISCOMEX usage fee: a base fee per declaration plus a fee per addition
/// that decreases by band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiscomexSchedule {
    pub per_declaration: Decimal,
    pub tiers: Vec<SiscomexTier>,
}

impl SiscomexSchedule {
    fn fee_for(&self, additions: usize) -> Result<Decimal> {
        let mut total = self.per_declaration;

        for position in 1..=additions {
            let tier = self
                .tiers
                .iter()
                .find(|t| t.up_to.map_or(true, |limit| position <= limit as usize))
                .ok_or_else(|| CalculationError::MissingConfiguration {
                    what: format!("SISCOMEX fee band for addition #{}", position),
                })?;
            total += tier.fee_per_addition;
        }

        Ok(total)
    }
}

/// Read-only rate configuration. Rates are decimal fractions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTables {
    /// UF -> internal ICMS rate
    pub icms: BTreeMap<String, Decimal>,
    /// UF -> NCM -> ICMS rate replacing the state rate for that NCM
    #[serde(default)]
    pub icms_by_ncm: BTreeMap<String, BTreeMap<String, Decimal>>,
    /// ISO 4217 code -> currency name
    pub currencies: BTreeMap<String, String>,
    pub siscomex: Option<SiscomexSchedule>,
    pub afrmm_rate: Option<Decimal>,
    pub benefits: Vec<FiscalBenefit>,
}

/// Jurisdiction-specific rate lookups
#[derive(Debug, Clone, Copy)]
pub struct RateResolver<'a> {
    tables: &'a RateTables,
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

impl<'a> RateResolver<'a> {
    pub fn new(tables: &'a RateTables) -> Self {
        Self { tables }
    }

    pub fn icms_rate(&self, state: &str) -> Result<Decimal> {
        self.tables
            .icms
            .get(&normalize_code(state))
            .copied()
            .ok_or_else(|| CalculationError::UnknownJurisdiction {
                state: state.to_string(),
            })
    }

    /// ICMS rate for one NCM: the NCM's own entry under `state` when there is
    /// one, the state rate otherwise. The state itself must be configured.
    pub fn icms_rate_for_ncm(&self, state: &str, ncm: &str) -> Result<Decimal> {
        let state_rate = self.icms_rate(state)?;
        Ok(self
            .tables
            .icms_by_ncm
            .get(&normalize_code(state))
            .and_then(|rates| rates.get(ncm.trim()))
            .copied()
            .unwrap_or(state_rate))
    }

    pub fn afrmm_rate(&self) -> Result<Decimal> {
        self.tables
            .afrmm_rate
            .ok_or_else(|| CalculationError::MissingConfiguration {
                what: "AFRMM rate".to_string(),
            })
    }

    /// Base SISCOMEX fee charged once per declaration.
    pub fn siscomex_fee(&self) -> Result<Decimal> {
        Ok(self.siscomex_schedule()?.per_declaration)
    }

    /// Full SISCOMEX fee for a declaration with `additions` additions.
    pub fn siscomex_fee_for(&self, additions: usize) -> Result<Decimal> {
        self.siscomex_schedule()?.fee_for(additions)
    }

    fn siscomex_schedule(&self) -> Result<&'a SiscomexSchedule> {
        self.tables
            .siscomex
            .as_ref()
            .ok_or_else(|| CalculationError::MissingConfiguration {
                what: "SISCOMEX fee schedule".to_string(),
            })
    }

    /// Benefit granted by `state` to `ncm`, if any. `None` is a normal outcome.
    pub fn fiscal_benefit(&self, state: &str, ncm: &str) -> Option<&'a FiscalBenefit> {
        let state = normalize_code(state);
        self.tables
            .benefits
            .iter()
            .find(|b| normalize_code(&b.state) == state && b.covers(ncm))
    }

    /// Name of a registered currency.
    pub fn currency(&self, code: &str) -> Result<&'a str> {
        self.tables
            .currencies
            .get(&normalize_code(code))
            .map(String::as_str)
            .ok_or_else(|| CalculationError::UnknownCurrency {
                code: code.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::benefits::BenefitKind;
    use rust_decimal_macros::dec;

    fn tables() -> RateTables {
        RateTables {
            icms: BTreeMap::from([
                ("GO".to_string(), dec!(0.19)),
                ("SC".to_string(), dec!(0.17)),
            ]),
            icms_by_ncm: BTreeMap::from([(
                "GO".to_string(),
                BTreeMap::from([("85176277".to_string(), dec!(0.12))]),
            )]),
            currencies: BTreeMap::from([("USD".to_string(), "Dólar dos EUA".to_string())]),
            siscomex: Some(SiscomexSchedule {
                per_declaration: dec!(115.67),
                tiers: vec![
                    SiscomexTier {
                        up_to: Some(2),
                        fee_per_addition: dec!(38.56),
                    },
                    SiscomexTier {
                        up_to: Some(5),
                        fee_per_addition: dec!(30.85),
                    },
                    SiscomexTier {
                        up_to: None,
                        fee_per_addition: dec!(23.14),
                    },
                ],
            }),
            afrmm_rate: Some(dec!(0.25)),
            benefits: vec![FiscalBenefit {
                state: "GO".to_string(),
                kind: BenefitKind::IcmsCredit {
                    percent: dec!(0.67),
                },
                code: None,
                ncm_prefixes: vec!["8471".to_string()],
            }],
        }
    }

    #[test]
    fn test_icms_rate_lookup() {
        let t = tables();
        let resolver = RateResolver::new(&t);
        assert_eq!(resolver.icms_rate("GO").unwrap(), dec!(0.19));
        assert_eq!(resolver.icms_rate(" sc ").unwrap(), dec!(0.17));
    }

    #[test]
    fn test_unknown_state_never_falls_back() {
        let t = tables();
        let err = RateResolver::new(&t).icms_rate("RJ").unwrap_err();
        assert_eq!(
            err,
            CalculationError::UnknownJurisdiction {
                state: "RJ".to_string()
            }
        );
    }

    #[test]
    fn test_ncm_rate_replaces_state_rate() {
        let t = tables();
        let resolver = RateResolver::new(&t);
        assert_eq!(resolver.icms_rate_for_ncm("go", "85176277").unwrap(), dec!(0.12));
        assert_eq!(resolver.icms_rate_for_ncm("GO", "84713012").unwrap(), dec!(0.19));
        // overrides belong to their state only
        assert_eq!(resolver.icms_rate_for_ncm("SC", "85176277").unwrap(), dec!(0.17));
    }

    #[test]
    fn test_ncm_rate_needs_a_configured_state() {
        let mut t = tables();
        t.icms_by_ncm.insert(
            "RJ".to_string(),
            BTreeMap::from([("85176277".to_string(), dec!(0.20))]),
        );
        assert!(matches!(
            RateResolver::new(&t).icms_rate_for_ncm("RJ", "85176277"),
            Err(CalculationError::UnknownJurisdiction { .. })
        ));
    }

    #[test]
    fn test_missing_fee_configuration_fails() {
        let t = RateTables::default();
        let resolver = RateResolver::new(&t);
        assert!(matches!(
            resolver.afrmm_rate(),
            Err(CalculationError::MissingConfiguration { .. })
        ));
        assert!(matches!(
            resolver.siscomex_fee(),
            Err(CalculationError::MissingConfiguration { .. })
        ));
    }

    #[test]
    fn test_siscomex_fee_by_band() {
        let t = tables();
        let resolver = RateResolver::new(&t);
        assert_eq!(resolver.siscomex_fee().unwrap(), dec!(115.67));
        assert_eq!(resolver.siscomex_fee_for(0).unwrap(), dec!(115.67));
        assert_eq!(resolver.siscomex_fee_for(1).unwrap(), dec!(154.23));
        // 115.67 + 2×38.56 + 3×30.85 + 1×23.14
        assert_eq!(resolver.siscomex_fee_for(6).unwrap(), dec!(308.48));
    }

    #[test]
    fn test_siscomex_without_open_band_fails_past_last_band() {
        let mut t = tables();
        if let Some(schedule) = t.siscomex.as_mut() {
            schedule.tiers.pop();
        }
        let err = RateResolver::new(&t).siscomex_fee_for(6).unwrap_err();
        assert!(err.to_string().contains("addition #6"));
    }

    #[test]
    fn test_fiscal_benefit_absence_is_not_an_error() {
        let t = tables();
        let resolver = RateResolver::new(&t);
        assert!(resolver.fiscal_benefit("GO", "84713012").is_some());
        assert!(resolver.fiscal_benefit("GO", "39269090").is_none());
        assert!(resolver.fiscal_benefit("SC", "84713012").is_none());
    }

    #[test]
    fn test_currency_registry() {
        let t = tables();
        let resolver = RateResolver::new(&t);
        assert_eq!(resolver.currency("usd").unwrap(), "Dólar dos EUA");
        assert!(matches!(
            resolver.currency("XYZ"),
            Err(CalculationError::UnknownCurrency { .. })
        ));
    }
}
