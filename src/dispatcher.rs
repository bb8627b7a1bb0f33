//! Command dispatcher that routes parsed CLI commands to their handlers.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use nacionaliza::config::{load_config, load_declaration, OperatorInput};
use nacionaliza::export::{to_json, write_goods_csv};
use nacionaliza::rates::RateResolver;
use nacionaliza::reconcile::find_mismatches;
use nacionaliza::{CalculationError, DeclarationCalculator};

use crate::cli::{extra_expenses, formatters, Commands};

/// Inputs of one `calculate` invocation
pub struct CalculateArgs {
    pub declaration: PathBuf,
    pub config: PathBuf,
    pub operator: OperatorInput,
    pub csv: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Route a parsed command to its handler
pub fn dispatch_command(command: Commands, json_output: bool) -> Result<()> {
    match command {
        Commands::Calculate {
            declaration,
            config,
            state,
            capatazia,
            extras,
            extras_icms,
            csv,
            output,
        } => dispatch_calculate(
            CalculateArgs {
                declaration,
                config,
                operator: OperatorInput {
                    destination_state: state,
                    capatazia,
                    extra_expenses: extra_expenses(&extras, &extras_icms),
                },
                csv,
                output,
            },
            json_output,
        ),
        Commands::Validate {
            declaration,
            config,
            state,
        } => dispatch_validate(&declaration, config.as_deref(), state.as_deref()),
        Commands::Rates { config } => dispatch_rates(&config, json_output),
    }
}

fn dispatch_calculate(args: CalculateArgs, json_output: bool) -> Result<()> {
    let config = load_config(&args.config)?;
    let declaration = load_declaration(&args.declaration)?;

    let calculator = DeclarationCalculator::new(RateResolver::new(&config.tables))
        .with_policy(config.reconciliation);

    let expenses = calculator
        .expenses_for(&declaration, &args.operator)
        .with_context(|| format!("failed to derive expenses for DI {}", declaration.number))?;

    let breakdown = calculator
        .aggregate(
            &declaration,
            &expenses,
            args.operator.destination_state.as_deref(),
        )
        .with_context(|| format!("failed to calculate DI {}", declaration.number))?;

    let mismatches = find_mismatches(&breakdown, calculator.policy());
    if let Some(first) = mismatches.first().cloned() {
        for m in &mismatches {
            warn!(
                "Reconciliation mismatch for {} at {}: expected {}, got {}",
                m.figure, m.scope, m.expected, m.actual
            );
        }
        if !json_output {
            eprint!("{}", formatters::format_mismatches(&mismatches));
        }
        return Err(CalculationError::from(first))
            .with_context(|| format!("DI {} does not reconcile", declaration.number));
    }

    if let Some(path) = &args.output {
        std::fs::write(path, to_json(&breakdown)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Wrote breakdown to {}", path.display());
    }

    if let Some(path) = &args.csv {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        write_goods_csv(&breakdown, BufWriter::new(file))?;
        info!("Wrote {} goods to {}", breakdown.goods_count(), path.display());
    }

    if json_output {
        println!("{}", to_json(&breakdown)?);
    } else {
        print!("{}", formatters::format_breakdown_table(&breakdown));
        if let Some(path) = &args.csv {
            println!("\n{} Goods sheet written to {}", "✓".green().bold(), path.display());
        }
    }

    Ok(())
}

fn dispatch_validate(declaration: &Path, config: Option<&Path>, state: Option<&str>) -> Result<()> {
    let declaration = load_declaration(declaration)?;
    let state = state.unwrap_or(&declaration.destination_state);

    let config = config.map(load_config).transpose()?;
    let policy = config
        .as_ref()
        .map(|c| c.reconciliation)
        .unwrap_or_default();

    declaration
        .validate(policy.tolerance_per_line)
        .with_context(|| format!("DI {} is not valid", declaration.number))?;

    if let Some(config) = &config {
        let resolver = RateResolver::new(&config.tables);
        resolver.icms_rate(state)?;
        resolver.currency(&declaration.currency)?;
    }

    print!("{}", formatters::format_validation_ok(&declaration, state));
    Ok(())
}

fn dispatch_rates(config: &Path, json_output: bool) -> Result<()> {
    let config = load_config(config)?;

    if json_output {
        let json = serde_json::to_string_pretty(&config.tables)
            .context("failed to serialize rate tables")?;
        println!("{}", json);
    } else {
        print!("{}", formatters::format_rates_table(&config));
    }

    Ok(())
}
