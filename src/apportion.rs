//! Value-proportional apportionment
//!
//! Two independent levels, composed by the calculator:
//! declaration -> additions (weighted by customs value, full precision) and
//! addition -> goods (weighted by good value, rounded to centavos at the leaf).
//!
//! A zero-valued addition or good gets a zero share. There is no equal-split
//! fallback.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::declaration::Addition;
use crate::expenses::{Expense, ExpenseKind, ExpenseSet};
use crate::utils::round_currency;

/// Share of one expense entry held by an addition or a good
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApportionedExpense {
    pub kind: ExpenseKind,
    pub composes_icms_base: bool,
    pub amount: Decimal,
}

impl ApportionedExpense {
    fn of(expense: &Expense, amount: Decimal) -> Self {
        Self {
            kind: expense.kind.clone(),
            composes_icms_base: expense.composes_icms_base,
            amount,
        }
    }
}

/// `amount × part / whole`, or zero when either weight is zero.
pub fn proportional_share(amount: Decimal, part: Decimal, whole: Decimal) -> Decimal {
    if part.is_zero() || whole.is_zero() {
        return Decimal::ZERO;
    }
    amount * part / whole
}

/// Split an amount across additions by customs value. Not rounded.
pub fn split_by_addition(amount: Decimal, additions: &[Addition]) -> Vec<Decimal> {
    let whole: Decimal = additions.iter().map(|a| a.customs_value).sum();
    additions
        .iter()
        .map(|a| proportional_share(amount, a.customs_value, whole))
        .collect()
}

/// Split an addition-level amount across its goods by good value, rounded
/// to centavos.
///
/// The weights are normalized by the goods' own total so the split covers
/// the whole amount even when the goods differ from the customs value by a
/// few centavos.
pub fn split_by_good(amount: Decimal, addition: &Addition) -> Vec<Decimal> {
    let whole = addition.goods_value();
    addition
        .goods
        .iter()
        .map(|g| round_currency(proportional_share(amount, g.total_value, whole)))
        .collect()
}

/// Every expense entry apportioned to every addition: `result[addition][entry]`.
pub fn expenses_to_additions(
    expenses: &ExpenseSet,
    additions: &[Addition],
) -> Vec<Vec<ApportionedExpense>> {
    let mut per_addition: Vec<Vec<ApportionedExpense>> =
        vec![Vec::with_capacity(expenses.entries().len()); additions.len()];

    for expense in expenses.entries() {
        for (slot, share) in per_addition
            .iter_mut()
            .zip(split_by_addition(expense.amount, additions))
        {
            slot.push(ApportionedExpense::of(expense, share));
        }
    }

    per_addition
}

/// An addition's expense shares apportioned to its goods: `result[good][entry]`.
pub fn expenses_to_goods(
    addition_shares: &[ApportionedExpense],
    addition: &Addition,
) -> Vec<Vec<ApportionedExpense>> {
    let mut per_good: Vec<Vec<ApportionedExpense>> =
        vec![Vec::with_capacity(addition_shares.len()); addition.goods.len()];

    for share in addition_shares {
        for (slot, amount) in per_good
            .iter_mut()
            .zip(split_by_good(share.amount, addition))
        {
            slot.push(ApportionedExpense {
                kind: share.kind.clone(),
                composes_icms_base: share.composes_icms_base,
                amount,
            });
        }
    }

    per_good
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{DeclaredRates, Good};
    use rust_decimal_macros::dec;

    fn addition(number: &str, values: &[Decimal]) -> Addition {
        let goods: Vec<Good> = values
            .iter()
            .enumerate()
            .map(|(i, v)| Good::new(format!("G{}", i + 1), "item", dec!(1), *v))
            .collect();
        Addition {
            number: number.to_string(),
            ncm: "84713012".to_string(),
            supplier: None,
            customs_value: values.iter().copied().sum(),
            rates: DeclaredRates::default(),
            goods,
        }
    }

    #[test]
    fn test_share_is_value_proportional() {
        assert_eq!(proportional_share(dec!(100), dec!(300), dec!(1000)), dec!(30));
        assert_eq!(proportional_share(dec!(100), dec!(700), dec!(1000)), dec!(70));
    }

    #[test]
    fn test_zero_weight_gets_zero_share() {
        assert_eq!(proportional_share(dec!(100), Decimal::ZERO, dec!(1000)), Decimal::ZERO);
        assert_eq!(proportional_share(dec!(100), dec!(5), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_split_by_addition_conserves_amount() {
        let additions = vec![
            addition("001", &[dec!(1000)]),
            addition("002", &[dec!(2000)]),
            addition("003", &[dec!(333.33)]),
        ];
        let shares = split_by_addition(dec!(154.23), &additions);
        let total: Decimal = shares.iter().sum();
        assert!((total - dec!(154.23)).abs() <= dec!(0.0000001));
        assert!(shares[1] > shares[0]);
    }

    #[test]
    fn test_split_by_good_rounds_at_leaf() {
        let a = addition("001", &[dec!(1), dec!(1), dec!(1)]);
        let shares = split_by_good(dec!(100), &a);
        assert_eq!(shares, vec![dec!(33.33), dec!(33.33), dec!(33.33)]);
        let total: Decimal = shares.iter().sum();
        assert!((total - dec!(100)).abs() <= dec!(0.03));
    }

    #[test]
    fn test_split_by_good_multi_good_scenario() {
        let a = addition("001", &[dec!(300), dec!(700)]);
        assert_eq!(split_by_good(dec!(100), &a), vec![dec!(30.00), dec!(70.00)]);
    }

    #[test]
    fn test_zero_value_good_gets_nothing() {
        let a = addition("001", &[dec!(0), dec!(500)]);
        assert_eq!(split_by_good(dec!(80), &a), vec![dec!(0), dec!(80)]);
    }

    #[test]
    fn test_expenses_to_additions_layout() {
        let additions = vec![addition("001", &[dec!(250)]), addition("002", &[dec!(750)])];
        let expenses = ExpenseSet::new()
            .with(Expense::siscomex(dec!(200)))
            .with(Expense::extra("Armazenagem", dec!(40), false));

        let shares = expenses_to_additions(&expenses, &additions);
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].len(), 2);
        assert_eq!(shares[0][0].amount, dec!(50));
        assert_eq!(shares[1][0].amount, dec!(150));
        assert_eq!(shares[1][1].amount, dec!(30));
        assert!(!shares[1][1].composes_icms_base);
        assert_eq!(shares[1][1].kind, ExpenseKind::Extra("Armazenagem".to_string()));
    }

    #[test]
    fn test_expenses_to_goods_layout() {
        let a = addition("001", &[dec!(300), dec!(700)]);
        let addition_shares = vec![ApportionedExpense {
            kind: ExpenseKind::Extra("Frete interno".to_string()),
            composes_icms_base: true,
            amount: dec!(100),
        }];

        let per_good = expenses_to_goods(&addition_shares, &a);
        assert_eq!(per_good[0][0].amount, dec!(30.00));
        assert_eq!(per_good[1][0].amount, dec!(70.00));
        assert!(per_good[1][0].composes_icms_base);
    }
}
