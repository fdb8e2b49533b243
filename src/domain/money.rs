//! Fixed-point money arithmetic.
//!
//! Amounts are `BigDecimal` values carried at two decimal places. Rounding is
//! half-up, applied once when a fee is derived from a percentage.

use bigdecimal::BigDecimal;
use serde::Serialize;

pub const MONEY_SCALE: i64 = 2;

/// Rounds half-up to two decimals and pins the scale so that `10` and
/// `10.00` serialize identically.
pub fn to_money(value: &BigDecimal) -> BigDecimal {
    value.round(MONEY_SCALE).with_scale(MONEY_SCALE)
}

pub fn zero() -> BigDecimal {
    BigDecimal::from(0).with_scale(MONEY_SCALE)
}

/// True when `value` carries no more than two significant decimals.
pub fn has_money_precision(value: &BigDecimal) -> bool {
    value.with_scale(MONEY_SCALE) == *value
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeBreakdown {
    pub processing_fee: BigDecimal,
    pub net_amount: BigDecimal,
}

/// `processing_fee = round(amount * fee_percentage / 100, 2)` and
/// `net_amount = amount - processing_fee`.
///
/// The fee is clamped to `[0, amount]` so the net amount can never go
/// negative even if a malformed percentage slips past validation.
pub fn compute_fee(amount: &BigDecimal, fee_percentage: &BigDecimal) -> FeeBreakdown {
    let amount = amount.with_scale(MONEY_SCALE);
    // Dividing by 100 is a shift of the decimal exponent, which keeps the
    // intermediate value exact.
    let (digits, scale) = (&amount * fee_percentage).as_bigint_and_exponent();
    let raw = BigDecimal::new(digits, scale + 2);
    let mut processing_fee = to_money(&raw);

    if processing_fee < zero() {
        processing_fee = zero();
    }
    if processing_fee > amount {
        processing_fee = amount.clone();
    }

    let net_amount = (&amount - &processing_fee).with_scale(MONEY_SCALE);

    FeeBreakdown {
        processing_fee,
        net_amount,
    }
}
