// Tax module - Brazilian import taxes (II, IPI, PIS, COFINS, ICMS) and state benefits

pub mod benefits;
pub mod engine;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use benefits::{apply_benefit, BenefitOutcome};
pub use engine::{ad_valorem, icms_gross_up, FederalTaxes, IcmsResult, TaxResult};

/// Taxes levied on an import declaration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaxKind {
    Ii,     // Imposto de Importação
    Ipi,    // Imposto sobre Produtos Industrializados
    Pis,    // PIS-Importação
    Cofins, // COFINS-Importação
    Icms,   // ICMS (state VAT, grossed-up)
}

impl TaxKind {
    /// Every tax, in the order they are computed.
    pub const ALL: [TaxKind; 5] = [
        TaxKind::Ii,
        TaxKind::Ipi,
        TaxKind::Pis,
        TaxKind::Cofins,
        TaxKind::Icms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxKind::Ii => "II",
            TaxKind::Ipi => "IPI",
            TaxKind::Pis => "PIS",
            TaxKind::Cofins => "COFINS",
            TaxKind::Icms => "ICMS",
        }
    }
}

impl fmt::Display for TaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaxKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "II" => Ok(TaxKind::Ii),
            "IPI" => Ok(TaxKind::Ipi),
            "PIS" => Ok(TaxKind::Pis),
            "COFINS" => Ok(TaxKind::Cofins),
            "ICMS" => Ok(TaxKind::Icms),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_kind_round_trips_through_str() {
        for kind in TaxKind::ALL {
            assert_eq!(TaxKind::from_str(kind.as_str()), Ok(kind));
        }
        assert_eq!(TaxKind::from_str(" cofins "), Ok(TaxKind::Cofins));
        assert!(TaxKind::from_str("ISS").is_err());
    }
}
