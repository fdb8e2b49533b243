//! Withdrawal domain entity.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::method::WithdrawalMethod;
use super::money::compute_fee;
use super::status::WithdrawalStatus;

/// A single payout request. Money fields are frozen at request time; the
/// row becomes immutable once it reaches `COMPLETED`.
#[derive(Debug, Clone, Serialize)]
pub struct Withdrawal {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub withdrawal_method_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub fee_percentage_at_request: BigDecimal,
    pub processing_fee: BigDecimal,
    pub net_amount: BigDecimal,
    pub status: WithdrawalStatus,
    pub metadata: Value,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processing_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub gateway_transaction_id: Option<String>,
    pub gateway_response: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Withdrawal {
    pub fn new_pending(
        creator_id: Uuid,
        method: &WithdrawalMethod,
        amount: BigDecimal,
        currency: String,
        metadata: Value,
    ) -> Self {
        let fee = compute_fee(&amount, &method.fee_percentage);
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            creator_id,
            withdrawal_method_id: method.id,
            amount: amount.with_scale(super::money::MONEY_SCALE),
            currency,
            fee_percentage_at_request: method.fee_percentage.clone(),
            processing_fee: fee.processing_fee,
            net_amount: fee.net_amount,
            status: WithdrawalStatus::Pending,
            metadata,
            processed_by: None,
            processed_at: None,
            processing_notes: None,
            rejection_reason: None,
            gateway_transaction_id: None,
            gateway_response: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Withdrawal joined with the display name of its method.
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalDetail {
    #[serde(flatten)]
    pub withdrawal: Withdrawal,
    pub method_name: String,
    pub method_type: String,
}
