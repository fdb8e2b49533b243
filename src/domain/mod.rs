//! Payout ledger domain types.
//! Framework-agnostic: nothing in here touches sqlx or axum.

pub mod method;
pub mod money;
pub mod status;
pub mod wallet;
pub mod withdrawal;

pub use method::{
    FieldInputType, FieldRules, MethodType, ProcessingTimeUnit, RequiredField, WithdrawalMethod,
};
pub use money::{compute_fee, FeeBreakdown};
pub use status::{Actor, BalanceBucket, WithdrawalStatus};
pub use wallet::{CurrencyEarnings, WalletBalance, WithdrawalTotals};
pub use withdrawal::{Withdrawal, WithdrawalDetail};
