//! Export of a cost breakdown
//!
//! JSON carries the whole breakdown; the CSV sheet has one row per good,
//! `;`-separated so it opens directly in pt-BR spreadsheets.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

use crate::breakdown::CostBreakdown;

/// Pretty-printed JSON of the full breakdown.
pub fn to_json(breakdown: &CostBreakdown) -> Result<String> {
    serde_json::to_string_pretty(breakdown).context("failed to serialize cost breakdown")
}

#[derive(Serialize)]
struct GoodRow<'a> {
    #[serde(rename = "adicao")]
    addition: &'a str,
    ncm: &'a str,
    #[serde(rename = "codigo")]
    code: &'a str,
    #[serde(rename = "descricao")]
    description: &'a str,
    #[serde(rename = "quantidade")]
    quantity: Decimal,
    #[serde(rename = "valor_unitario")]
    unit_value: Decimal,
    #[serde(rename = "valor_aduaneiro")]
    value: Decimal,
    ii: Decimal,
    ipi: Decimal,
    pis: Decimal,
    cofins: Decimal,
    icms: Decimal,
    #[serde(rename = "despesas")]
    expenses: Decimal,
    #[serde(rename = "custo_total")]
    total_cost: Decimal,
    #[serde(rename = "custo_unitario")]
    unit_cost: Decimal,
}

/// Write the per-good sheet.
pub fn write_goods_csv<W: Write>(breakdown: &CostBreakdown, writer: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(writer);

    for (addition, good) in breakdown.goods() {
        wtr.serialize(GoodRow {
            addition: &addition.number,
            ncm: &addition.ncm,
            code: &good.code,
            description: &good.description,
            quantity: good.quantity,
            unit_value: good.unit_value,
            value: good.value,
            ii: good.taxes.ii,
            ipi: good.taxes.ipi,
            pis: good.taxes.pis,
            cofins: good.taxes.cofins,
            icms: good.taxes.icms,
            expenses: good.total_expenses,
            total_cost: good.total_cost,
            unit_cost: good.unit_cost,
        })
        .with_context(|| format!("failed to write CSV row for good {}", good.code))?;
    }

    wtr.flush().context("failed to flush CSV output")?;
    Ok(())
}
