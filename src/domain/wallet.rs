//! Derived per-currency wallet view.
//!
//! Nothing here is persisted: a wallet is recomputed from the earnings oracle
//! and the creator's withdrawal rows every time it is read.

use bigdecimal::BigDecimal;
use serde::Serialize;
use std::collections::HashMap;

use super::money::zero;

/// Lifetime earnings in one currency, as reported by the earnings source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrencyEarnings {
    pub currency: String,
    pub total_earnings: BigDecimal,
}

/// Withdrawal sums for one currency, split by balance bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalTotals {
    pub currency: String,
    pub reserved: BigDecimal,
    pub withdrawn: BigDecimal,
    pub refunded: BigDecimal,
}

impl WithdrawalTotals {
    pub fn empty(currency: &str) -> Self {
        Self {
            currency: currency.to_string(),
            reserved: zero(),
            withdrawn: zero(),
            refunded: zero(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletBalance {
    pub currency: String,
    pub total_earnings: BigDecimal,
    pub available_balance: BigDecimal,
    pub pending_withdrawals: BigDecimal,
    pub total_withdrawn: BigDecimal,
    pub refunded_amount: BigDecimal,
}

impl WalletBalance {
    /// `available = max(earnings - reserved - withdrawn, 0)`. Refunded
    /// amounts are reported but never subtracted.
    pub fn from_parts(earnings: &CurrencyEarnings, totals: &WithdrawalTotals) -> Self {
        let outstanding = &totals.reserved + &totals.withdrawn;
        let mut available = &earnings.total_earnings - &outstanding;
        if available < zero() {
            available = zero();
        }

        Self {
            currency: earnings.currency.clone(),
            total_earnings: earnings.total_earnings.with_scale(2),
            available_balance: available.with_scale(2),
            pending_withdrawals: totals.reserved.with_scale(2),
            total_withdrawn: totals.withdrawn.with_scale(2),
            refunded_amount: totals.refunded.with_scale(2),
        }
    }

    pub fn has_funds(&self) -> bool {
        self.available_balance > zero()
    }
}

/// One wallet entry per currency the creator has earned in, sorted by
/// currency code. Withdrawal totals in currencies without earnings are
/// ignored.
pub fn compose_wallet(
    earnings: Vec<CurrencyEarnings>,
    totals: Vec<WithdrawalTotals>,
) -> Vec<WalletBalance> {
    let totals: HashMap<String, WithdrawalTotals> = totals
        .into_iter()
        .map(|t| (t.currency.clone(), t))
        .collect();

    let mut wallet: Vec<WalletBalance> = earnings
        .iter()
        .map(|e| match totals.get(&e.currency) {
            Some(t) => WalletBalance::from_parts(e, t),
            None => WalletBalance::from_parts(e, &WithdrawalTotals::empty(&e.currency)),
        })
        .collect();

    wallet.sort_by(|a, b| a.currency.cmp(&b.currency));
    wallet
}
