//! Configuration and input loading
//!
//! Rate tables come from a TOML file in which every rate is a percentage as
//! published (19 means 19%). They are converted to fractions here, once, and
//! handed to the core as an immutable [`RateTables`]. Declarations are read
//! from JSON in the shape of [`Declaration`].

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::declaration::Declaration;
use crate::expenses::ExtraExpense;
use crate::rates::{RateTables, SiscomexSchedule, SiscomexTier};
use crate::reconcile::ReconciliationPolicy;
use crate::tax::benefits::{BenefitKind, FiscalBenefit};
use crate::utils::percent_to_fraction;

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    icms: BTreeMap<String, RawIcms>,
    #[serde(default)]
    currencies: BTreeMap<String, RawCurrency>,
    #[serde(default)]
    fees: RawFees,
    #[serde(default)]
    benefits: Vec<RawBenefit>,
    reconciliation: Option<RawReconciliation>,
}

#[derive(Debug, Deserialize)]
struct RawIcms {
    internal_rate: Decimal,
    /// NCM -> rate replacing `internal_rate` for that NCM
    #[serde(default)]
    ncm: BTreeMap<String, Decimal>,
}

#[derive(Debug, Deserialize)]
struct RawCurrency {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawFees {
    siscomex: Option<RawSiscomex>,
    afrmm: Option<RawAfrmm>,
}

#[derive(Debug, Deserialize)]
struct RawSiscomex {
    per_declaration: Decimal,
    #[serde(default)]
    tiers: Vec<RawSiscomexTier>,
}

#[derive(Debug, Deserialize)]
struct RawSiscomexTier {
    up_to: Option<u32>,
    fee_per_addition: Decimal,
}

#[derive(Debug, Deserialize)]
struct RawAfrmm {
    rate: Decimal,
}

#[derive(Debug, Deserialize)]
struct RawBenefit {
    state: String,
    kind: String,
    percent: Option<Decimal>,
    effective_rate: Option<Decimal>,
    code: Option<String>,
    #[serde(default)]
    ncm_prefixes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawReconciliation {
    tolerance_per_line: Decimal,
}

impl RawBenefit {
    fn to_benefit(&self) -> Result<FiscalBenefit> {
        let required = |value: Option<Decimal>, field: &str| {
            value.with_context(|| {
                format!(
                    "benefit '{}' for state {} requires '{}'",
                    self.kind, self.state, field
                )
            })
        };

        let kind = match self.kind.trim().to_ascii_lowercase().as_str() {
            "credito_icms" => BenefitKind::IcmsCredit {
                percent: percent_to_fraction(required(self.percent, "percent")?),
            },
            "diferimento" => BenefitKind::Deferral {
                percent: percent_to_fraction(required(self.percent, "percent")?),
            },
            "fundap" => BenefitKind::Fundap {
                effective_rate: percent_to_fraction(required(
                    self.effective_rate,
                    "effective_rate",
                )?),
            },
            other => bail!("unknown benefit kind '{}' for state {}", other, self.state),
        };

        Ok(FiscalBenefit {
            state: self.state.trim().to_ascii_uppercase(),
            kind,
            code: self.code.clone(),
            ncm_prefixes: self.ncm_prefixes.clone(),
        })
    }
}

fn icms_fraction(what: &str, percent: Decimal) -> Result<Decimal> {
    if percent < Decimal::ZERO || percent >= Decimal::ONE_HUNDRED {
        bail!("ICMS rate for {} out of range: {}", what, percent);
    }
    Ok(percent_to_fraction(percent))
}

/// Everything loaded from the rates file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub tables: RateTables,
    pub reconciliation: ReconciliationPolicy,
}

/// Parse a rates file already read into memory.
pub fn parse_config(text: &str) -> Result<AppConfig> {
    let raw: RawConfig = toml::from_str(text).context("invalid rates configuration")?;

    let mut icms = BTreeMap::new();
    let mut icms_by_ncm = BTreeMap::new();
    for (state, entry) in raw.icms {
        let state = state.trim().to_ascii_uppercase();
        icms.insert(state.clone(), icms_fraction(&state, entry.internal_rate)?);

        if !entry.ncm.is_empty() {
            let overrides = entry
                .ncm
                .into_iter()
                .map(|(ncm, rate)| {
                    let label = format!("{} NCM {}", state, ncm);
                    Ok((ncm.trim().to_string(), icms_fraction(&label, rate)?))
                })
                .collect::<Result<BTreeMap<_, _>>>()?;
            icms_by_ncm.insert(state, overrides);
        }
    }

    let currencies = raw
        .currencies
        .into_iter()
        .map(|(code, c)| (code.trim().to_ascii_uppercase(), c.name))
        .collect();

    let siscomex = raw.fees.siscomex.map(|s| SiscomexSchedule {
        per_declaration: s.per_declaration,
        tiers: s
            .tiers
            .into_iter()
            .map(|t| SiscomexTier {
                up_to: t.up_to,
                fee_per_addition: t.fee_per_addition,
            })
            .collect(),
    });

    let benefits = raw
        .benefits
        .iter()
        .map(RawBenefit::to_benefit)
        .collect::<Result<Vec<_>>>()?;

    let reconciliation = match raw.reconciliation {
        Some(r) if r.tolerance_per_line < Decimal::ZERO => {
            bail!("reconciliation tolerance must not be negative")
        }
        Some(r) => ReconciliationPolicy {
            tolerance_per_line: r.tolerance_per_line,
        },
        None => ReconciliationPolicy::default(),
    };

    Ok(AppConfig {
        tables: RateTables {
            icms,
            icms_by_ncm,
            currencies,
            siscomex,
            afrmm_rate: raw.fees.afrmm.map(|a| percent_to_fraction(a.rate)),
            benefits,
        },
        reconciliation,
    })
}

/// Load the rates file from disk.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read rates file {}", path.display()))?;
    let config = parse_config(&text)
        .with_context(|| format!("failed to load rates file {}", path.display()))?;

    info!(
        "Loaded rates from {}: {} states, {} currencies, {} benefits",
        path.display(),
        config.tables.icms.len(),
        config.tables.currencies.len(),
        config.tables.benefits.len()
    );

    Ok(config)
}

/// Read a declaration from a JSON file.
pub fn load_declaration(path: &Path) -> Result<Declaration> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read declaration {}", path.display()))?;
    let declaration: Declaration = serde_json::from_str(&text)
        .with_context(|| format!("invalid declaration file {}", path.display()))?;

    debug!(
        "Read DI {} with {} additions",
        declaration.number,
        declaration.additions.len()
    );

    Ok(declaration)
}

/// What the operator adds on top of the declaration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorInput {
    pub destination_state: Option<String>,
    pub capatazia: Option<Decimal>,
    #[serde(default)]
    pub extra_expenses: Vec<ExtraExpense>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
[icms.SC]
internal_rate = 17

[icms.go]
internal_rate = 19

[icms.go.ncm]
"85176277" = 12

[currencies.USD]
name = "Dólar dos EUA"

[fees.siscomex]
per_declaration = 115.67

[[fees.siscomex.tiers]]
up_to = 2
fee_per_addition = 38.56

[[fees.siscomex.tiers]]
fee_per_addition = 30.85

[fees.afrmm]
rate = 25

[[benefits]]
state = "GO"
kind = "credito_icms"
percent = 67
code = "COMEXPRODUZIR"
ncm_prefixes = ["8471"]

[[benefits]]
state = "ES"
kind = "fundap"
effective_rate = 3

[reconciliation]
tolerance_per_line = 0.02
"#;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(SAMPLE).unwrap();
        let t = &config.tables;

        assert_eq!(t.icms.get("SC"), Some(&dec!(0.17)));
        assert_eq!(t.icms.get("GO"), Some(&dec!(0.19)));
        assert_eq!(
            t.icms_by_ncm.get("GO").and_then(|n| n.get("85176277")),
            Some(&dec!(0.12))
        );
        assert!(!t.icms_by_ncm.contains_key("SC"));
        assert_eq!(t.currencies.get("USD").map(String::as_str), Some("Dólar dos EUA"));
        assert_eq!(t.afrmm_rate, Some(dec!(0.25)));

        let siscomex = t.siscomex.as_ref().unwrap();
        assert_eq!(siscomex.per_declaration, dec!(115.67));
        assert_eq!(siscomex.tiers.len(), 2);
        assert_eq!(siscomex.tiers[1].up_to, None);

        assert_eq!(t.benefits.len(), 2);
        assert_eq!(
            t.benefits[0].kind,
            BenefitKind::IcmsCredit { percent: dec!(0.67) }
        );
        assert_eq!(
            t.benefits[1].kind,
            BenefitKind::Fundap { effective_rate: dec!(0.03) }
        );
        assert_eq!(config.reconciliation.tolerance_per_line, dec!(0.02));
    }

    #[test]
    fn test_missing_sections_stay_missing() {
        let config = parse_config("[icms.SP]\ninternal_rate = 18\n").unwrap();
        assert!(config.tables.siscomex.is_none());
        assert!(config.tables.afrmm_rate.is_none());
        assert!(config.tables.currencies.is_empty());
        assert_eq!(config.reconciliation, ReconciliationPolicy::default());
    }

    #[test]
    fn test_benefit_without_percent_is_rejected() {
        let text = "[[benefits]]\nstate = \"SC\"\nkind = \"diferimento\"\n";
        let err = parse_config(text).unwrap_err();
        assert!(format!("{:#}", err).contains("requires 'percent'"));
    }

    #[test]
    fn test_unknown_benefit_kind_is_rejected() {
        let text = "[[benefits]]\nstate = \"SC\"\nkind = \"isencao\"\npercent = 10\n";
        assert!(parse_config(text).is_err());
    }

    #[test]
    fn test_out_of_range_icms_is_rejected() {
        assert!(parse_config("[icms.SP]\ninternal_rate = 100\n").is_err());
    }

    #[test]
    fn test_out_of_range_ncm_icms_is_rejected() {
        let text = "[icms.SP]\ninternal_rate = 18\n\n[icms.SP.ncm]\n\"85176277\" = 120\n";
        let err = parse_config(text).unwrap_err();
        assert!(format!("{:#}", err).contains("SP NCM 85176277"));
    }

    #[test]
    fn test_operator_input_defaults() {
        let input: OperatorInput = serde_json::from_str(r#"{"destination_state": "GO"}"#).unwrap();
        assert_eq!(input.destination_state.as_deref(), Some("GO"));
        assert!(input.capatazia.is_none());
        assert!(input.extra_expenses.is_empty());
    }
}
