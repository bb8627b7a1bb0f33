//! Output formatting module for CLI display
//!
//! Keeps presentation apart from the calculation: everything here takes an
//! already computed value and renders it for the terminal.

use colored::Colorize;
use rust_decimal::Decimal;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use nacionaliza::breakdown::CostBreakdown;
use nacionaliza::config::AppConfig;
use nacionaliza::declaration::Declaration;
use nacionaliza::reconcile::Mismatch;
use nacionaliza::tax::TaxKind;
use nacionaliza::utils::{format_amount, format_currency, format_percent, round_currency};

/// Format a cost breakdown for terminal table output
pub fn format_breakdown_table(breakdown: &CostBreakdown) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n{} DI {} - destination {} (ICMS {})\n",
        "📦".cyan().bold(),
        breakdown.declaration_number.bold(),
        breakdown.destination_state,
        format_percent(breakdown.icms_rate)
    ));
    output.push_str(&format!(
        "{} {} at {}\n\n",
        "Currency:".bright_black(),
        breakdown.currency,
        breakdown.exchange_rate
    ));

    #[derive(Tabled)]
    struct AdditionRow {
        #[tabled(rename = "Addition")]
        number: String,
        #[tabled(rename = "NCM")]
        ncm: String,
        #[tabled(rename = "Customs Value")]
        customs_value: String,
        #[tabled(rename = "II")]
        ii: String,
        #[tabled(rename = "IPI")]
        ipi: String,
        #[tabled(rename = "PIS")]
        pis: String,
        #[tabled(rename = "COFINS")]
        cofins: String,
        #[tabled(rename = "ICMS Base")]
        icms_base: String,
        #[tabled(rename = "ICMS")]
        icms: String,
        #[tabled(rename = "Expenses")]
        expenses: String,
        #[tabled(rename = "Total Cost")]
        total_cost: String,
    }

    let rows: Vec<AdditionRow> = breakdown
        .additions
        .iter()
        .map(|a| {
            let amounts = a.taxes.amounts();
            AdditionRow {
                number: a.number.clone(),
                ncm: a.ncm.clone(),
                customs_value: format_amount(a.customs_value),
                ii: format_amount(amounts.ii),
                ipi: format_amount(amounts.ipi),
                pis: format_amount(amounts.pis),
                cofins: format_amount(amounts.cofins),
                icms_base: format_amount(a.taxes.icms.base),
                icms: format_amount(amounts.icms),
                expenses: format_amount(a.total_expenses),
                total_cost: format_amount(a.total_cost),
            }
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    table.modify(Columns::new(2..), Alignment::right());
    output.push_str(&table.to_string());
    output.push('\n');

    #[derive(Tabled)]
    struct GoodRow {
        #[tabled(rename = "Addition")]
        addition: String,
        #[tabled(rename = "Code")]
        code: String,
        #[tabled(rename = "Description")]
        description: String,
        #[tabled(rename = "Qty")]
        quantity: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Taxes")]
        taxes: String,
        #[tabled(rename = "Expenses")]
        expenses: String,
        #[tabled(rename = "Total Cost")]
        total_cost: String,
        #[tabled(rename = "Unit Cost")]
        unit_cost: String,
    }

    let goods: Vec<GoodRow> = breakdown
        .goods()
        .map(|(a, g)| GoodRow {
            addition: a.number.clone(),
            code: g.code.clone(),
            description: g.description.clone(),
            quantity: g.quantity.normalize().to_string(),
            value: format_amount(g.value),
            taxes: format_amount(g.total_taxes),
            expenses: format_amount(g.total_expenses),
            total_cost: format_amount(g.total_cost),
            unit_cost: format_amount(g.unit_cost),
        })
        .collect();

    output.push_str(&format!("\n{} Goods\n\n", "🧾".cyan().bold()));
    let mut table = Table::new(&goods);
    table.with(Style::rounded());
    table.modify(Columns::new(3..), Alignment::right());
    output.push_str(&table.to_string());
    output.push('\n');

    if !breakdown.expenses.is_empty() {
        output.push_str(&format!("\n{} Expenses\n", "💸".cyan().bold()));
        for expense in &breakdown.expenses {
            let marker = if expense.composes_icms_base {
                " (ICMS base)".bright_black().to_string()
            } else {
                String::new()
            };
            output.push_str(&format!(
                "  {:<24} {:>16}{}\n",
                expense.kind.label(),
                format_currency(expense.amount),
                marker
            ));
        }
    }

    let benefits: Vec<_> = breakdown
        .additions
        .iter()
        .filter_map(|a| a.benefit.as_ref().map(|b| (a, b)))
        .collect();
    if !benefits.is_empty() {
        output.push_str(&format!("\n{} Fiscal benefits\n", "🏷".cyan().bold()));
        for (addition, benefit) in benefits {
            output.push_str(&format!(
                "  Addition {} {}{}: ICMS {} -> {} (saves {})\n",
                addition.number,
                benefit.kind.as_str(),
                benefit
                    .code
                    .as_deref()
                    .map(|c| format!(" [{}]", c))
                    .unwrap_or_default(),
                format_currency(benefit.icms_original),
                format_currency(benefit.icms_payable),
                format_currency(benefit.savings).green()
            ));
        }
    }

    let totals = &breakdown.totals;
    output.push_str(&format!("\n{} Summary", "━".repeat(60).bright_black()));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Customs Value:".bold(),
        format_currency(totals.customs_value)
    ));
    for kind in TaxKind::ALL {
        output.push_str(&format!(
            "\n{:<20} {}",
            format!("{}:", kind).bold(),
            format_currency(totals.taxes.get(kind))
        ));
    }
    if round_currency(totals.icms_payable) != round_currency(totals.taxes.icms) {
        output.push_str(&format!(
            "\n{:<20} {}",
            "ICMS Payable:".bold(),
            format_currency(totals.icms_payable)
        ));
    }
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total Taxes:".bold(),
        format_currency(totals.total_taxes)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total Expenses:".bold(),
        format_currency(totals.total_expenses)
    ));
    output.push_str(&format!(
        "\n{:<20} {}\n",
        "Landed Cost:".bold(),
        format_currency(totals.total_cost).green().bold()
    ));

    output
}

/// Format the result of a structural check
pub fn format_validation_ok(declaration: &Declaration, state: &str) -> String {
    format!(
        "{} DI {} is valid: {} additions, {} goods, customs value {}, destination {}\n",
        "✓".green().bold(),
        declaration.number,
        declaration.additions.len(),
        declaration.goods_count(),
        format_currency(declaration.total_customs_value()),
        state.to_ascii_uppercase()
    )
}

/// Format reconciliation violations, one per line
pub fn format_mismatches(mismatches: &[Mismatch]) -> String {
    let mut output = format!(
        "\n{} {} reconciliation mismatch(es)\n",
        "✗".red().bold(),
        mismatches.len()
    );
    for m in mismatches {
        output.push_str(&format!(
            "  {} at {}: expected {}, got {} (difference {}, tolerance {})\n",
            m.figure,
            m.scope,
            m.expected,
            m.actual,
            colored_difference(m.difference()),
            m.tolerance
        ));
    }
    output
}

/// Format the loaded rate configuration
pub fn format_rates_table(config: &AppConfig) -> String {
    let tables = &config.tables;
    let mut output = String::new();

    #[derive(Tabled)]
    struct StateRow {
        #[tabled(rename = "UF")]
        state: String,
        #[tabled(rename = "ICMS")]
        rate: String,
        #[tabled(rename = "By NCM")]
        ncm_rates: String,
        #[tabled(rename = "Benefits")]
        benefits: String,
    }

    let rows: Vec<StateRow> = tables
        .icms
        .iter()
        .map(|(state, rate)| {
            let benefits: Vec<&str> = tables
                .benefits
                .iter()
                .filter(|b| &b.state == state)
                .map(|b| b.code.as_deref().unwrap_or(b.kind.as_str()))
                .collect();
            let ncm_rates: Vec<String> = tables
                .icms_by_ncm
                .get(state)
                .into_iter()
                .flatten()
                .map(|(ncm, rate)| format!("{} {}", ncm, format_percent(*rate)))
                .collect();
            StateRow {
                state: state.clone(),
                rate: format_percent(*rate),
                ncm_rates: if ncm_rates.is_empty() {
                    "-".to_string()
                } else {
                    ncm_rates.join(", ")
                },
                benefits: if benefits.is_empty() {
                    "-".to_string()
                } else {
                    benefits.join(", ")
                },
            }
        })
        .collect();

    output.push_str(&format!("\n{} ICMS rates\n\n", "📊".cyan().bold()));
    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    table.modify(Columns::new(1..2), Alignment::right());
    output.push_str(&table.to_string());
    output.push('\n');

    if !tables.currencies.is_empty() {
        let codes: Vec<&str> = tables.currencies.keys().map(String::as_str).collect();
        output.push_str(&format!("\n{:<20} {}", "Currencies:".bold(), codes.join(", ")));
    }
    match &tables.siscomex {
        Some(s) => output.push_str(&format!(
            "\n{:<20} {} + {} band(s) per addition",
            "SISCOMEX:".bold(),
            format_currency(s.per_declaration),
            s.tiers.len()
        )),
        None => output.push_str(&format!("\n{:<20} {}", "SISCOMEX:".bold(), "not configured".yellow())),
    }
    match tables.afrmm_rate {
        Some(rate) => output.push_str(&format!("\n{:<20} {}", "AFRMM:".bold(), format_percent(rate))),
        None => output.push_str(&format!("\n{:<20} {}", "AFRMM:".bold(), "not configured".yellow())),
    }
    output.push_str(&format!(
        "\n{:<20} {} per line\n",
        "Tolerance:".bold(),
        config.reconciliation.tolerance_per_line
    ));

    output
}

/// Signed difference, colored by direction
fn colored_difference(value: Decimal) -> String {
    if value >= Decimal::ZERO {
        format_amount(value).green().to_string()
    } else {
        format_amount(value).red().to_string()
    }
}
