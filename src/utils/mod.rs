//! Rounding policy and display formatting
//!
//! All monetary math runs at full `Decimal` precision. Rounding to centavos
//! happens only through [`round_currency`], at the leaves of the
//! apportionment tree and when a figure is displayed.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places of a stored/displayed amount (centavos).
pub const CURRENCY_DP: u32 = 2;

/// Round an amount to centavos using banker's rounding (half-to-even).
///
/// # Examples
/// ```
/// use nacionaliza::utils::round_currency;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(round_currency(dec!(234.567901)), dec!(234.57));
/// assert_eq!(round_currency(dec!(0.125)), dec!(0.12));
/// assert_eq!(round_currency(dec!(0.135)), dec!(0.14));
/// ```
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointNearestEven)
}

/// Convert a percentage as printed on customs documents (19 = 19%) into a
/// decimal fraction (0.19).
pub fn percent_to_fraction(percent: Decimal) -> Decimal {
    percent / Decimal::ONE_HUNDRED
}

/// Format as Brazilian Real: "R$ 1.234,56"
///
/// # Examples
/// ```
/// use nacionaliza::utils::format_currency;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_currency(dec!(1436.419753)), "R$ 1.436,42");
/// assert_eq!(format_currency(dec!(-50)), "R$ -50,00");
/// ```
pub fn format_currency(value: Decimal) -> String {
    format!("R$ {}", format_amount(value))
}

/// Format an amount without symbol using Brazilian separators: "1.234,56"
pub fn format_amount(value: Decimal) -> String {
    let rounded = round_currency(value);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let text = format!("{:.2}", rounded.abs());
    let (integer, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    format!("{}{},{}", sign, grouped, cents)
}

/// Format a decimal fraction as a percentage: 0.0965 -> "9,65%"
pub fn format_percent(fraction: Decimal) -> String {
    let percent = (fraction * Decimal::ONE_HUNDRED).normalize();
    let text = if percent.scale() < 2 {
        format!("{:.2}", percent)
    } else {
        percent.to_string()
    };
    format!("{}%", text.replace('.', ","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_currency_is_half_even() {
        assert_eq!(round_currency(dec!(2.345)), dec!(2.34));
        assert_eq!(round_currency(dec!(2.355)), dec!(2.36));
        assert_eq!(round_currency(dec!(2.3451)), dec!(2.35));
        assert_eq!(round_currency(dec!(-2.345)), dec!(-2.34));
    }

    #[test]
    fn test_percent_to_fraction() {
        assert_eq!(percent_to_fraction(dec!(19)), dec!(0.19));
        assert_eq!(percent_to_fraction(dec!(9.65)), dec!(0.0965));
        assert_eq!(percent_to_fraction(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_format_amount_groups_thousands() {
        assert_eq!(format_amount(dec!(0)), "0,00");
        assert_eq!(format_amount(dec!(999.5)), "999,50");
        assert_eq!(format_amount(dec!(1000)), "1.000,00");
        assert_eq!(format_amount(dec!(1234567.891)), "1.234.567,89");
        assert_eq!(format_amount(dec!(-1234.5)), "-1.234,50");
    }

    #[test]
    fn test_format_amount_negative_zero() {
        assert_eq!(format_amount(dec!(-0.001)), "0,00");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(dec!(0.19)), "19,00%");
        assert_eq!(format_percent(dec!(0.0965)), "9,65%");
        assert_eq!(format_percent(dec!(0.021)), "2,10%");
        assert_eq!(format_percent(dec!(0)), "0,00%");
    }
}
