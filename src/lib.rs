//! Nacionaliza - Brazilian import declaration (DI) landed-cost calculator
//!
//! Computes the import taxes of a customs declaration (II, IPI, PIS, COFINS
//! and the grossed-up ICMS), apportions declaration-level expenses down to
//! every good, and reconciles the result so every level sums to its parent.

pub mod apportion;
pub mod breakdown;
pub mod calculator;
pub mod config;
pub mod declaration;
pub mod error;
pub mod expenses;
pub mod export;
pub mod rates;
pub mod reconcile;
pub mod tax;
pub mod utils;

pub use breakdown::CostBreakdown;
pub use calculator::DeclarationCalculator;
pub use declaration::Declaration;
pub use error::{CalculationError, Result};
