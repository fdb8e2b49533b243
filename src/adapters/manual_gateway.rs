use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::domain::{Withdrawal, WithdrawalMethod};
use crate::ports::{GatewayError, PaymentGateway, PayoutReceipt};

/// Gateway for payouts an admin settles outside the platform. Completing a
/// withdrawal only records a `manual-` reference.
#[derive(Debug, Clone, Default)]
pub struct ManualPaymentGateway;

#[async_trait]
impl PaymentGateway for ManualPaymentGateway {
    async fn attempt_payout(
        &self,
        withdrawal: &Withdrawal,
        method: &WithdrawalMethod,
    ) -> Result<PayoutReceipt, GatewayError> {
        let reference = format!("manual-{}", Uuid::new_v4());

        tracing::info!(
            withdrawal_id = %withdrawal.id,
            method = %method.name,
            reference = %reference,
            "Recording manual payout"
        );

        Ok(PayoutReceipt {
            gateway_transaction_id: reference,
            gateway_response: json!({
                "mode": "manual",
                "method_type": method.method_type.as_str(),
                "net_amount": withdrawal.net_amount.to_string(),
                "currency": withdrawal.currency,
            }),
        })
    }
}
