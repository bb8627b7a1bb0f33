use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TaxKind;
use crate::declaration::Addition;
use crate::error::{CalculationError, Result};
use crate::utils::round_currency;

/// One tax computed over a base amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxResult {
    pub kind: TaxKind,
    pub base: Decimal,
    /// Decimal fraction (0.0965 for 9.65%)
    pub rate: Decimal,
    pub amount: Decimal,
}

impl TaxResult {
    /// Base and amount rounded to centavos, as stored in a breakdown.
    pub fn rounded(&self) -> Self {
        Self {
            base: round_currency(self.base),
            amount: round_currency(self.amount),
            ..self.clone()
        }
    }
}

/// Compute a linear ad-valorem tax (II, IPI, PIS, COFINS): `base × rate`.
///
/// An explicit zero rate is an exemption and yields a zero amount. A rate
/// that was never supplied is `MissingTaxRate`; it is not read as zero.
pub fn ad_valorem(
    kind: TaxKind,
    base: Decimal,
    rate: Option<Decimal>,
    addition: &str,
) -> Result<TaxResult> {
    let rate = rate.ok_or_else(|| CalculationError::MissingTaxRate {
        tax: kind,
        addition: addition.to_string(),
    })?;

    if rate < Decimal::ZERO {
        return Err(CalculationError::InvalidRate { tax: kind, rate });
    }

    Ok(TaxResult {
        kind,
        base,
        rate,
        amount: base * rate,
    })
}

/// ICMS computed "por dentro": the tax is part of its own base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmsResult {
    /// Base before ICMS (customs value, federal taxes and ICMS-composing expenses)
    pub pre_base: Decimal,
    /// `pre_base / (1 - rate)`
    pub base: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
}

impl IcmsResult {
    pub fn rounded(&self) -> Self {
        Self {
            pre_base: round_currency(self.pre_base),
            base: round_currency(self.base),
            rate: self.rate,
            amount: round_currency(self.amount),
        }
    }
}

/// Gross up a pre-ICMS base: `base = pre_base / (1 - r)`, `amount = base × r`.
pub fn icms_gross_up(pre_base: Decimal, rate: Decimal) -> Result<IcmsResult> {
    if rate < Decimal::ZERO || rate >= Decimal::ONE {
        return Err(CalculationError::InvalidRate {
            tax: TaxKind::Icms,
            rate,
        });
    }

    let base = pre_base / (Decimal::ONE - rate);

    Ok(IcmsResult {
        pre_base,
        base,
        rate,
        amount: base * rate,
    })
}

/// Federal taxes of one addition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederalTaxes {
    pub ii: TaxResult,
    pub ipi: TaxResult,
    pub pis: TaxResult,
    pub cofins: TaxResult,
}

impl FederalTaxes {
    /// II, PIS and COFINS are levied on the customs value; IPI on customs value + II.
    pub fn compute(addition: &Addition) -> Result<Self> {
        let number = addition.number.as_str();
        let value = addition.customs_value;
        let rates = &addition.rates;

        let ii = ad_valorem(TaxKind::Ii, value, rates.fraction(TaxKind::Ii), number)?;
        let ipi = ad_valorem(
            TaxKind::Ipi,
            value + ii.amount,
            rates.fraction(TaxKind::Ipi),
            number,
        )?;
        let pis = ad_valorem(TaxKind::Pis, value, rates.fraction(TaxKind::Pis), number)?;
        let cofins = ad_valorem(
            TaxKind::Cofins,
            value,
            rates.fraction(TaxKind::Cofins),
            number,
        )?;

        Ok(Self {
            ii,
            ipi,
            pis,
            cofins,
        })
    }

    pub fn total(&self) -> Decimal {
        self.ii.amount + self.ipi.amount + self.pis.amount + self.cofins.amount
    }
}
