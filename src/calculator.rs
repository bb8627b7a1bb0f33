//! Declaration calculator
//!
//! Sequences one run over a declaration: validate the input, resolve the
//! state's ICMS rate, then for each addition in input order compute the
//! federal taxes, apportion the expenses, gross up ICMS and split everything
//! down to the goods. The first error aborts the run; no partial breakdown
//! is returned.

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::apportion::{expenses_to_additions, expenses_to_goods, split_by_good, ApportionedExpense};
use crate::breakdown::{
    AdditionBreakdown, AdditionTaxes, CostBreakdown, DeclarationTotals, GoodBreakdown, TaxAmounts,
};
use crate::config::OperatorInput;
use crate::declaration::{Addition, Declaration};
use crate::error::Result;
use crate::expenses::{Expense, ExpenseSet};
use crate::rates::RateResolver;
use crate::reconcile::{reconcile, ReconciliationPolicy};
use crate::tax::{apply_benefit, icms_gross_up, FederalTaxes, TaxKind};
use crate::utils::round_currency;

/// Computes landed cost for declarations against one rate configuration
#[derive(Debug, Clone, Copy)]
pub struct DeclarationCalculator<'a> {
    resolver: RateResolver<'a>,
    policy: ReconciliationPolicy,
}

impl<'a> DeclarationCalculator<'a> {
    pub fn new(resolver: RateResolver<'a>) -> Self {
        Self {
            resolver,
            policy: ReconciliationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconciliationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ReconciliationPolicy {
        &self.policy
    }

    /// Full run: aggregate, then reconcile the result.
    pub fn calculate(
        &self,
        declaration: &Declaration,
        expenses: &ExpenseSet,
        state_override: Option<&str>,
    ) -> Result<CostBreakdown> {
        let breakdown = self.aggregate(declaration, expenses, state_override)?;
        reconcile(&breakdown, &self.policy)?;
        Ok(breakdown)
    }

    /// Full run with automatic expenses derived from the declaration plus the
    /// operator's extras.
    pub fn calculate_with(
        &self,
        declaration: &Declaration,
        operator: &OperatorInput,
    ) -> Result<CostBreakdown> {
        let expenses = self.expenses_for(declaration, operator)?;
        self.calculate(declaration, &expenses, operator.destination_state.as_deref())
    }

    /// Automatic expenses of the declaration followed by the operator's extras.
    pub fn expenses_for(
        &self,
        declaration: &Declaration,
        operator: &OperatorInput,
    ) -> Result<ExpenseSet> {
        let expenses = ExpenseSet::automatic(declaration, &self.resolver, operator.capatazia)?
            .with_extras(&operator.extra_expenses);

        debug!(
            "DI {}: {} expense entries totalling {}, {} in the ICMS base",
            declaration.number,
            expenses.entries().len(),
            round_currency(expenses.total()),
            round_currency(expenses.icms_base_total())
        );

        Ok(expenses)
    }

    /// Build the breakdown without reconciling it.
    pub fn aggregate(
        &self,
        declaration: &Declaration,
        expenses: &ExpenseSet,
        state_override: Option<&str>,
    ) -> Result<CostBreakdown> {
        declaration.validate(self.policy.tolerance_per_line)?;
        expenses.validate()?;

        let state = state_override.unwrap_or(&declaration.destination_state);
        self.resolver.currency(&declaration.currency)?;
        let icms_rate = self.resolver.icms_rate(state)?;

        info!(
            "Calculating DI {}: {} additions, {} goods, destination {}",
            declaration.number,
            declaration.additions.len(),
            declaration.goods_count(),
            state
        );

        let addition_shares = expenses_to_additions(expenses, &declaration.additions);

        let mut additions = Vec::with_capacity(declaration.additions.len());
        let mut totals = DeclarationTotals::default();

        for (addition, shares) in declaration.additions.iter().zip(addition_shares) {
            let rate = self.resolver.icms_rate_for_ncm(state, &addition.ncm)?;
            let result = self.addition_breakdown(addition, shares, state, rate)?;

            totals.customs_value += result.customs_value;
            totals.taxes.accumulate(&result.taxes.amounts());
            totals.total_expenses += result.total_expenses;
            totals.total_cost += result.total_cost;
            totals.icms_payable += result
                .benefit
                .as_ref()
                .map_or(result.taxes.icms.amount, |b| b.icms_payable);

            additions.push(result);
        }
        totals.total_taxes = totals.taxes.total();

        Ok(CostBreakdown {
            declaration_number: declaration.number.clone(),
            destination_state: state.trim().to_ascii_uppercase(),
            currency: declaration.currency.clone(),
            exchange_rate: declaration.exchange_rate,
            icms_rate,
            expenses: expenses
                .entries()
                .iter()
                .map(|e| Expense {
                    amount: round_currency(e.amount),
                    ..e.clone()
                })
                .collect(),
            additions,
            totals,
        })
    }

    fn addition_breakdown(
        &self,
        addition: &Addition,
        expenses: Vec<ApportionedExpense>,
        state: &str,
        icms_rate: Decimal,
    ) -> Result<AdditionBreakdown> {
        let federal = FederalTaxes::compute(addition)?;

        let icms_expenses: Decimal = expenses
            .iter()
            .filter(|e| e.composes_icms_base)
            .map(|e| e.amount)
            .sum();
        let pre_base = addition.customs_value + federal.total() + icms_expenses;
        let icms = icms_gross_up(pre_base, icms_rate)?;

        debug!(
            "Addition {} (NCM {}): ICMS pre-base {}, base {}, amount {}",
            addition.number,
            addition.ncm,
            round_currency(icms.pre_base),
            round_currency(icms.base),
            round_currency(icms.amount)
        );

        let benefit = self
            .resolver
            .fiscal_benefit(state, &addition.ncm)
            .map(|b| apply_benefit(b, &icms).rounded());

        // goods are split from the full-precision amounts
        let amounts = TaxAmounts::from_fn(|kind| match kind {
            TaxKind::Ii => federal.ii.amount,
            TaxKind::Ipi => federal.ipi.amount,
            TaxKind::Pis => federal.pis.amount,
            TaxKind::Cofins => federal.cofins.amount,
            TaxKind::Icms => icms.amount,
        });
        let tax_splits: Vec<Vec<Decimal>> = TaxKind::ALL
            .iter()
            .map(|kind| split_by_good(amounts.get(*kind), addition))
            .collect();
        let expense_splits = expenses_to_goods(&expenses, addition);

        let goods = addition
            .goods
            .iter()
            .zip(expense_splits)
            .enumerate()
            .map(|(i, (good, good_expenses))| {
                let good_taxes = TaxAmounts::from_fn(|kind| tax_splits[kind as usize][i]);
                let value = round_currency(good.total_value);
                let total_taxes = good_taxes.total();
                let total_expenses: Decimal = good_expenses.iter().map(|e| e.amount).sum();
                let total_cost = value + total_taxes + total_expenses;

                GoodBreakdown {
                    code: good.code.clone(),
                    description: good.description.clone(),
                    quantity: good.quantity,
                    unit_value: good.unit_value,
                    value,
                    taxes: good_taxes,
                    expenses: good_expenses,
                    total_taxes,
                    total_expenses,
                    total_cost,
                    unit_cost: round_currency(total_cost / good.quantity),
                }
            })
            .collect();

        let taxes = AdditionTaxes::new(federal, icms).rounded();
        let expenses: Vec<ApportionedExpense> = expenses
            .into_iter()
            .map(|e| ApportionedExpense {
                amount: round_currency(e.amount),
                ..e
            })
            .collect();

        let customs_value = round_currency(addition.customs_value);
        let total_taxes = taxes.amounts().total();
        let total_expenses: Decimal = expenses.iter().map(|e| e.amount).sum();

        Ok(AdditionBreakdown {
            number: addition.number.clone(),
            ncm: addition.ncm.clone(),
            supplier: addition.supplier.clone(),
            customs_value,
            taxes,
            expenses,
            benefit,
            goods,
            total_taxes,
            total_expenses,
            total_cost: customs_value + total_taxes + total_expenses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{DeclaredRates, Good, Incoterm, TransportMode};
    use crate::error::CalculationError;
    use crate::rates::RateTables;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn tables() -> RateTables {
        RateTables {
            icms: BTreeMap::from([("SC".to_string(), dec!(0.19)), ("GO".to_string(), dec!(0.17))]),
            currencies: BTreeMap::from([("USD".to_string(), "Dólar dos EUA".to_string())]),
            ..RateTables::default()
        }
    }

    fn rates() -> DeclaredRates {
        DeclaredRates {
            ii: Some(Decimal::ZERO),
            ipi: Some(Decimal::ZERO),
            pis: Some(dec!(2.10)),
            cofins: Some(dec!(9.25)),
        }
    }

    fn declaration(goods: Vec<Good>) -> Declaration {
        let customs_value = goods.iter().map(|g| g.total_value).sum();
        Declaration {
            number: "2300120746".to_string(),
            registered_on: None,
            destination_state: "SC".to_string(),
            incoterm: Incoterm::Cfr,
            transport_mode: TransportMode::Maritime,
            currency: "USD".to_string(),
            exchange_rate: dec!(5.0),
            freight: Decimal::ZERO,
            insurance: Decimal::ZERO,
            additions: vec![Addition {
                number: "001".to_string(),
                ncm: "84713012".to_string(),
                supplier: None,
                customs_value,
                rates: rates(),
                goods,
            }],
        }
    }

    #[test]
    fn test_single_good_receives_everything() {
        let t = tables();
        let calc = DeclarationCalculator::new(RateResolver::new(&t));
        let decl = declaration(vec![Good::new("A", "Notebook", dec!(1), dec!(1000.00))]);
        let expenses = ExpenseSet::new().with(Expense::siscomex(dec!(50.00)));

        let result = calc.calculate(&decl, &expenses, None).unwrap();
        let addition = &result.additions[0];
        let good = &addition.goods[0];

        assert_eq!(round_currency(addition.taxes.icms.pre_base), dec!(1163.50));
        assert_eq!(good.taxes.pis, dec!(21.00));
        assert_eq!(good.taxes.cofins, dec!(92.50));
        assert_eq!(good.taxes.icms, dec!(272.92));
        assert_eq!(good.expenses[0].amount, dec!(50.00));
        assert_eq!(good.total_cost, dec!(1436.42));
        assert_eq!(good.unit_cost, dec!(1436.42));
    }

    #[test]
    fn test_state_override_changes_icms_rate() {
        let t = tables();
        let calc = DeclarationCalculator::new(RateResolver::new(&t));
        let decl = declaration(vec![Good::new("A", "Notebook", dec!(1), dec!(830.00))]);
        let mut no_tax = decl.clone();
        no_tax.additions[0].rates = DeclaredRates {
            ii: Some(Decimal::ZERO),
            ipi: Some(Decimal::ZERO),
            pis: Some(Decimal::ZERO),
            cofins: Some(Decimal::ZERO),
        };

        let result = calc
            .calculate(&no_tax, &ExpenseSet::new(), Some("go"))
            .unwrap();
        assert_eq!(result.destination_state, "GO");
        assert_eq!(result.icms_rate, dec!(0.17));
        assert_eq!(result.totals.taxes.icms, dec!(170));
    }

    #[test]
    fn test_unknown_state_aborts() {
        let t = tables();
        let calc = DeclarationCalculator::new(RateResolver::new(&t));
        let decl = declaration(vec![Good::new("A", "Notebook", dec!(1), dec!(1000))]);

        let err = calc
            .calculate(&decl, &ExpenseSet::new(), Some("RJ"))
            .unwrap_err();
        assert_eq!(
            err,
            CalculationError::UnknownJurisdiction {
                state: "RJ".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_currency_aborts() {
        let t = tables();
        let calc = DeclarationCalculator::new(RateResolver::new(&t));
        let mut decl = declaration(vec![Good::new("A", "Notebook", dec!(1), dec!(1000))]);
        decl.currency = "EUR".to_string();

        assert!(matches!(
            calc.calculate(&decl, &ExpenseSet::new(), None),
            Err(CalculationError::UnknownCurrency { .. })
        ));
    }

    #[test]
    fn test_negative_expense_aborts() {
        let t = tables();
        let calc = DeclarationCalculator::new(RateResolver::new(&t));
        let decl = declaration(vec![Good::new("A", "Notebook", dec!(1), dec!(1000))]);
        let expenses = ExpenseSet::new().with(Expense::capatazia(dec!(-10)));

        assert!(matches!(
            calc.calculate(&decl, &expenses, None),
            Err(CalculationError::InvalidExpense { .. })
        ));
    }

    #[test]
    fn test_unit_cost_divides_by_quantity() {
        let t = tables();
        let calc = DeclarationCalculator::new(RateResolver::new(&t));
        let decl = declaration(vec![Good::new("A", "Mouse", dec!(4), dec!(250.00))]);
        let expenses = ExpenseSet::new().with(Expense::siscomex(dec!(50.00)));

        let result = calc.calculate(&decl, &expenses, None).unwrap();
        let good = &result.additions[0].goods[0];
        assert_eq!(good.total_cost, dec!(1436.42));
        assert_eq!(good.unit_cost, dec!(359.10));
    }
}
