//! Import declaration (DI) input model
//!
//! A [`Declaration`] arrives fully populated from whatever parsed it (XML
//! reader, database, JSON file). The engine only reads it. Rates are kept as
//! `Option` so that a rate the DI never stated stays distinguishable from an
//! explicit 0% exemption.

use chrono::NaiveDate;
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{CalculationError, Result};
use crate::tax::TaxKind;
use crate::utils::percent_to_fraction;

/// Incoterm of the commercial operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Incoterm {
    Exw,
    Fca,
    Fob,
    Cfr,
    Cif,
    Cpt,
    Cip,
    Dap,
    Dpu,
    Ddp,
}

impl Incoterm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Incoterm::Exw => "EXW",
            Incoterm::Fca => "FCA",
            Incoterm::Fob => "FOB",
            Incoterm::Cfr => "CFR",
            Incoterm::Cif => "CIF",
            Incoterm::Cpt => "CPT",
            Incoterm::Cip => "CIP",
            Incoterm::Dap => "DAP",
            Incoterm::Dpu => "DPU",
            Incoterm::Ddp => "DDP",
        }
    }
}

impl FromStr for Incoterm {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EXW" => Ok(Incoterm::Exw),
            "FCA" => Ok(Incoterm::Fca),
            "FOB" => Ok(Incoterm::Fob),
            "CFR" => Ok(Incoterm::Cfr),
            "CIF" => Ok(Incoterm::Cif),
            "CPT" => Ok(Incoterm::Cpt),
            "CIP" => Ok(Incoterm::Cip),
            "DAP" => Ok(Incoterm::Dap),
            "DPU" => Ok(Incoterm::Dpu),
            "DDP" => Ok(Incoterm::Ddp),
            _ => Err(()),
        }
    }
}

/// Transport mode of the cargo (DI `viaTransporte`)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Maritime,
    Road,
    Air,
    Other,
}

impl TransportMode {
    /// AFRMM is only levied on maritime freight
    pub fn pays_afrmm(&self) -> bool {
        matches!(self, TransportMode::Maritime)
    }
}

/// Ad-valorem rates as printed in the DI, in percent (9.65 means 9.65%)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredRates {
    pub ii: Option<Decimal>,
    pub ipi: Option<Decimal>,
    pub pis: Option<Decimal>,
    pub cofins: Option<Decimal>,
}

impl DeclaredRates {
    /// Declared rate for a federal tax as a decimal fraction.
    /// ICMS is never declared per addition; it always yields `None`.
    pub fn fraction(&self, kind: TaxKind) -> Option<Decimal> {
        let percent = match kind {
            TaxKind::Ii => self.ii,
            TaxKind::Ipi => self.ipi,
            TaxKind::Pis => self.pis,
            TaxKind::Cofins => self.cofins,
            TaxKind::Icms => None,
        };
        percent.map(percent_to_fraction)
    }
}

/// One merchandise item of an addition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Good {
    pub code: String,
    pub description: String,
    pub quantity: Decimal,
    /// Local currency (BRL)
    pub unit_value: Decimal,
    /// `quantity × unit_value`, local currency
    pub total_value: Decimal,
}

impl Good {
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        quantity: Decimal,
        unit_value: Decimal,
    ) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            quantity,
            unit_value,
            total_value: quantity * unit_value,
        }
    }
}

/// One addition (adição) of the declaration: a single NCM from a single supplier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addition {
    pub number: String,
    pub ncm: String,
    #[serde(default)]
    pub supplier: Option<String>,
    /// Customs value in local currency
    pub customs_value: Decimal,
    pub rates: DeclaredRates,
    pub goods: Vec<Good>,
}

impl Addition {
    pub fn goods_value(&self) -> Decimal {
        self.goods.iter().map(|g| g.total_value).sum()
    }

    /// Check the addition's own invariants.
    ///
    /// A good's total may differ from `quantity × unit_value` by
    /// `tolerance_per_line` per unit, since unit values are usually printed
    /// rounded. The goods' total may differ from the customs value by
    /// `tolerance_per_line` per good.
    pub fn validate(&self, tolerance_per_line: Decimal) -> Result<()> {
        let malformed = |reason: String| CalculationError::MalformedAddition {
            addition: self.number.clone(),
            reason,
        };

        if self.goods.is_empty() {
            return Err(malformed("addition has no goods".to_string()));
        }
        if self.customs_value < Decimal::ZERO {
            return Err(malformed(format!(
                "negative customs value {}",
                self.customs_value
            )));
        }

        for good in &self.goods {
            if good.quantity <= Decimal::ZERO {
                return Err(malformed(format!(
                    "good {} has non-positive quantity {}",
                    good.code, good.quantity
                )));
            }
            if good.total_value < Decimal::ZERO {
                return Err(malformed(format!(
                    "good {} has negative value {}",
                    good.code, good.total_value
                )));
            }

            let extended = good.quantity * good.unit_value;
            let tolerance = tolerance_per_line * good.quantity.max(Decimal::ONE);
            if (extended - good.total_value).abs() > tolerance {
                return Err(malformed(format!(
                    "good {} totals {} but {} × {} is {}",
                    good.code, good.total_value, good.quantity, good.unit_value, extended
                )));
            }
        }

        let goods_value = self.goods_value();
        let tolerance = tolerance_per_line * Decimal::from(self.goods.len());
        if (goods_value - self.customs_value).abs() > tolerance {
            return Err(malformed(format!(
                "goods sum to {} but customs value is {}",
                goods_value, self.customs_value
            )));
        }

        Ok(())
    }
}

/// A customs import declaration (Declaração de Importação)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub number: String,
    #[serde(default)]
    pub registered_on: Option<NaiveDate>,
    /// UF code of the importer (e.g. "SC")
    pub destination_state: String,
    pub incoterm: Incoterm,
    pub transport_mode: TransportMode,
    /// ISO 4217 code of the negotiation currency
    pub currency: String,
    /// Local currency units per foreign unit
    pub exchange_rate: Decimal,
    /// Local currency
    pub freight: Decimal,
    /// Local currency
    pub insurance: Decimal,
    pub additions: Vec<Addition>,
}

impl Declaration {
    pub fn total_customs_value(&self) -> Decimal {
        self.additions.iter().map(|a| a.customs_value).sum()
    }

    pub fn goods_count(&self) -> usize {
        self.additions.iter().map(|a| a.goods.len()).sum()
    }

    /// Structural checks: declaration-level invariants first, then each
    /// addition in input order. Stops at the first problem.
    pub fn validate(&self, tolerance_per_line: Decimal) -> Result<()> {
        let malformed = |reason: String| CalculationError::MalformedDeclaration {
            declaration: self.number.clone(),
            reason,
        };

        if self.additions.is_empty() {
            return Err(malformed("declaration has no additions".to_string()));
        }
        if self.exchange_rate <= Decimal::ZERO {
            return Err(malformed(format!(
                "exchange rate must be positive, got {}",
                self.exchange_rate
            )));
        }
        if self.freight < Decimal::ZERO || self.insurance < Decimal::ZERO {
            return Err(malformed("freight and insurance must not be negative".to_string()));
        }
        if let Some(duplicate) = self.additions.iter().map(|a| &a.number).duplicates().next() {
            return Err(malformed(format!("addition {} appears more than once", duplicate)));
        }

        for addition in &self.additions {
            addition.validate(tolerance_per_line)?;
        }

        Ok(())
    }
}
