use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

use nacionaliza::expenses::ExtraExpense;

pub mod formatters;

#[derive(Parser)]
#[command(name = "nacionaliza")]
#[command(
    version,
    about = "Brazilian import declaration (DI) tax and landed-cost calculator"
)]
#[command(
    long_about = "Compute II, IPI, PIS, COFINS and grossed-up ICMS for a customs declaration, apportion SISCOMEX, AFRMM and other expenses down to every good, and reconcile the totals."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Calculate taxes and landed cost for a declaration
    Calculate {
        /// Path to the declaration JSON file
        declaration: PathBuf,

        /// Path to the rates TOML file
        #[arg(short, long)]
        config: PathBuf,

        /// Destination state (UF) overriding the declaration's
        #[arg(short, long)]
        state: Option<String>,

        /// Port handling charge (capatazia) in BRL
        #[arg(long)]
        capatazia: Option<Decimal>,

        /// Extra expense outside the ICMS base (NAME=AMOUNT, repeatable)
        #[arg(long = "extra", value_name = "NAME=AMOUNT", value_parser = parse_extra)]
        extras: Vec<(String, Decimal)>,

        /// Extra expense that composes the ICMS base (NAME=AMOUNT, repeatable)
        #[arg(long = "extra-icms", value_name = "NAME=AMOUNT", value_parser = parse_extra)]
        extras_icms: Vec<(String, Decimal)>,

        /// Write the per-good sheet to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the full breakdown as JSON to a file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a declaration for structural problems without calculating
    Validate {
        /// Path to the declaration JSON file
        declaration: PathBuf,

        /// Rates TOML file, to also check state and currency
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Destination state (UF) overriding the declaration's
        #[arg(short, long)]
        state: Option<String>,
    },

    /// List the rates loaded from a configuration file
    Rates {
        /// Path to the rates TOML file
        config: PathBuf,
    },
}

/// Operator-entered extras in command-line order, plain ones first.
pub fn extra_expenses(
    extras: &[(String, Decimal)],
    extras_icms: &[(String, Decimal)],
) -> Vec<ExtraExpense> {
    let plain = extras.iter().map(|(name, amount)| ExtraExpense {
        name: name.clone(),
        amount: *amount,
        composes_icms_base: false,
    });
    let in_base = extras_icms.iter().map(|(name, amount)| ExtraExpense {
        name: name.clone(),
        amount: *amount,
        composes_icms_base: true,
    });
    plain.chain(in_base).collect()
}

/// Parse `NAME=AMOUNT`, accepting a decimal comma.
fn parse_extra(s: &str) -> Result<(String, Decimal), String> {
    let (name, amount) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=AMOUNT, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("expense name is empty in '{}'", s));
    }
    let amount = Decimal::from_str(&amount.trim().replace(',', "."))
        .map_err(|e| format!("invalid amount in '{}': {}", s, e))?;
    Ok((name.to_string(), amount))
}
