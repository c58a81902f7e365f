//! Monetary amounts.
//!
//! Amounts are exact decimals with a fixed currency scale of two fractional
//! digits. Inputs carrying more precision are rejected instead of rounded, so
//! a stored amount always equals what the caller submitted. Every amount is
//! also capped at [`max_amount`], the largest value a `NUMERIC(10,2)` column
//! holds.

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};

/// Monetary amount (exact decimal, currency scale).
pub type Money = Decimal;

/// Number of fractional digits carried by every stored amount.
pub const CURRENCY_SCALE: u32 = 2;

/// Largest storable amount (`99999999.99`).
pub fn max_amount() -> Money {
    Decimal::new(9_999_999_999, CURRENCY_SCALE)
}

/// Zero at currency scale (`0.00`).
pub fn zero() -> Money {
    Decimal::new(0, CURRENCY_SCALE)
}

/// Pad/normalize an amount to exactly [`CURRENCY_SCALE`] fractional digits.
///
/// Callers must have validated the scale already; this never rounds a value
/// that passed [`validate_scale`].
pub fn at_currency_scale(amount: Money) -> Money {
    let mut value = amount.normalize();
    value.rescale(CURRENCY_SCALE);
    value
}

/// Reject amounts with more fractional digits than the currency allows.
pub fn validate_scale(field: &str, amount: Money) -> DomainResult<Money> {
    if amount.normalize().scale() > CURRENCY_SCALE {
        return Err(DomainError::validation(format!(
            "{field} must have at most {CURRENCY_SCALE} decimal places"
        )));
    }
    within_limit(field, at_currency_scale(amount))
}

/// Reject amounts above [`max_amount`].
pub fn within_limit(field: &str, amount: Money) -> DomainResult<Money> {
    if amount > max_amount() {
        return Err(DomainError::validation(format!(
            "{field} must not exceed {}",
            max_amount()
        )));
    }
    Ok(amount)
}

/// Validate a strictly positive amount (e.g. an item price).
pub fn positive(field: &str, amount: Money) -> DomainResult<Money> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "{field} must be greater than 0"
        )));
    }
    validate_scale(field, amount)
}

/// Validate a non-negative amount (e.g. tax, discount, unit price snapshot).
pub fn non_negative(field: &str, amount: Money) -> DomainResult<Money> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(DomainError::validation(format!(
            "{field} must not be negative"
        )));
    }
    validate_scale(field, amount)
}

/// `unit_price * quantity`, exact, at currency scale.
pub fn multiply(unit_price: Money, quantity: i32) -> DomainResult<Money> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .map(at_currency_scale)
        .ok_or_else(|| DomainError::invariant("line amount overflow"))
        .and_then(|amount| within_limit("line total", amount))
}

/// Checked sum of amounts at currency scale (zero for an empty input).
pub fn sum<I>(amounts: I) -> DomainResult<Money>
where
    I: IntoIterator<Item = Money>,
{
    amounts
        .into_iter()
        .try_fold(zero(), |acc, amount| acc.checked_add(amount))
        .map(at_currency_scale)
        .ok_or_else(|| DomainError::invariant("amount total overflow"))
        .and_then(|amount| within_limit("total amount", amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn amounts_are_padded_to_two_places() {
        assert_eq!(at_currency_scale(dec("10")).to_string(), "10.00");
        assert_eq!(at_currency_scale(dec("3.5")).to_string(), "3.50");
        assert_eq!(zero().to_string(), "0.00");
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        assert_eq!(validate_scale("price", dec("1.2300")).unwrap().to_string(), "1.23");
    }

    #[test]
    fn more_than_two_places_is_rejected() {
        let err = validate_scale("price", dec("1.234")).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("at most 2")));
    }

    #[test]
    fn positive_rejects_zero_and_negative() {
        assert!(positive("price", dec("0")).is_err());
        assert!(positive("price", dec("-1.00")).is_err());
        assert_eq!(positive("price", dec("0.01")).unwrap(), dec("0.01"));
    }

    #[test]
    fn non_negative_accepts_zero() {
        assert_eq!(non_negative("tax", dec("0")).unwrap().to_string(), "0.00");
        assert!(non_negative("tax", dec("-0.01")).is_err());
    }

    #[test]
    fn multiply_is_exact() {
        assert_eq!(multiply(dec("5.55"), 3).unwrap().to_string(), "16.65");
        assert_eq!(multiply(dec("0.10"), 0).unwrap().to_string(), "0.00");
    }

    #[test]
    fn amounts_above_the_storable_maximum_are_rejected() {
        assert_eq!(max_amount().to_string(), "99999999.99");
        assert_eq!(positive("price", dec("99999999.99")).unwrap(), dec("99999999.99"));

        let err = positive("price", dec("100000000.00")).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("99999999.99")));
        assert!(matches!(non_negative("tax", dec("100000000")), Err(DomainError::Validation(_))));
    }

    #[test]
    fn line_and_bill_totals_are_capped() {
        assert!(matches!(multiply(dec("50000000.00"), 2), Err(DomainError::Validation(_))));
        assert_eq!(multiply(dec("49999999.99"), 2).unwrap().to_string(), "99999999.98");
        assert!(matches!(
            sum([dec("99999999.99"), dec("0.01")]),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn sum_of_nothing_is_zero() {
        assert_eq!(sum(Vec::new()).unwrap().to_string(), "0.00");
    }
}
