//! Interfaces to collaborators that live outside the payout ledger.
//! Adapters in `crate::adapters` implement these; services only see the
//! traits.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{CurrencyEarnings, Withdrawal, WithdrawalMethod, WithdrawalStatus};

#[derive(Error, Debug)]
pub enum EarningsError {
    #[error("earnings query failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("earnings source unavailable: {0}")]
    Unavailable(String),
}

/// Read-only oracle for what a creator has earned through completed sales.
#[async_trait]
pub trait EarningsSource: Send + Sync {
    async fn creator_earnings(&self, creator_id: Uuid)
        -> Result<Vec<CurrencyEarnings>, EarningsError>;
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gateway declined payout ({status}): {body}")]
    Declined { status: u16, body: String },
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
    #[error("circuit breaker open: {0}")]
    CircuitOpen(String),
}

/// Proof that money was handed to the payout channel.
#[derive(Debug, Clone, Serialize)]
pub struct PayoutReceipt {
    pub gateway_transaction_id: String,
    pub gateway_response: Value,
}

/// Settlement hook invoked when a withdrawal is marked `COMPLETED`.
/// An error aborts the transition.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn attempt_payout(
        &self,
        withdrawal: &Withdrawal,
        method: &WithdrawalMethod,
    ) -> Result<PayoutReceipt, GatewayError>;
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("notification delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),
    #[error("notification rejected with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalNotification {
    pub creator_id: Uuid,
    pub withdrawal_id: Uuid,
    pub status: WithdrawalStatus,
    pub amount: BigDecimal,
    pub net_amount: BigDecimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl From<&Withdrawal> for WithdrawalNotification {
    fn from(w: &Withdrawal) -> Self {
        Self {
            creator_id: w.creator_id,
            withdrawal_id: w.id,
            status: w.status,
            amount: w.amount.clone(),
            net_amount: w.net_amount.clone(),
            currency: w.currency.clone(),
            rejection_reason: w.rejection_reason.clone(),
        }
    }
}

/// Best-effort delivery; callers log failures and move on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &WithdrawalNotification)
        -> Result<(), NotificationError>;
}
