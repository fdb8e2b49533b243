use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;

use crate::domain::{Withdrawal, WithdrawalMethod};
use crate::ports::{GatewayError, PaymentGateway, PayoutReceipt};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Payout-Signature";
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Serialize)]
struct PayoutRequest<'a> {
    reference: String,
    creator_id: String,
    amount: String,
    currency: &'a str,
    method_name: &'a str,
    method_type: &'a str,
    destination: &'a Value,
}

#[derive(Debug, Deserialize)]
struct PayoutResponse {
    transaction_id: String,
}

/// Posts payouts to an external settlement API. Requests are signed with
/// HMAC-SHA256 over the raw JSON body and carry the withdrawal id as an
/// idempotency key so an admin retry cannot pay twice.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    secret: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HttpPaymentGateway {
    pub fn new(base_url: String, secret: String) -> Self {
        Self::with_circuit_breaker(base_url, secret, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        secret: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Self {
            client,
            base_url,
            secret,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    pub fn sign(&self, body: &[u8]) -> Result<String, GatewayError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| GatewayError::InvalidResponse("invalid signing secret".to_string()))?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn attempt_payout(
        &self,
        withdrawal: &Withdrawal,
        method: &WithdrawalMethod,
    ) -> Result<PayoutReceipt, GatewayError> {
        let request = PayoutRequest {
            reference: withdrawal.id.to_string(),
            creator_id: withdrawal.creator_id.to_string(),
            amount: withdrawal.net_amount.to_string(),
            currency: &withdrawal.currency,
            method_name: &method.name,
            method_type: method.method_type.as_str(),
            destination: &withdrawal.metadata,
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let signature = self.sign(&body)?;

        let url = format!("{}/payouts", self.base_url.trim_end_matches('/'));
        let client = self.client.clone();
        let idempotency_key = withdrawal.id.to_string();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .header(SIGNATURE_HEADER, signature)
                    .header(IDEMPOTENCY_HEADER, idempotency_key)
                    .body(body)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(GatewayError::Declined {
                        status: status.as_u16(),
                        body,
                    });
                }

                let raw: Value = response.json().await?;
                let parsed: PayoutResponse = serde_json::from_value(raw.clone())
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

                Ok(PayoutReceipt {
                    gateway_transaction_id: parsed.transaction_id,
                    gateway_response: raw,
                })
            })
            .await;

        match result {
            Ok(receipt) => {
                tracing::info!(
                    withdrawal_id = %withdrawal.id,
                    gateway_transaction_id = %receipt.gateway_transaction_id,
                    "Payout accepted by gateway"
                );
                Ok(receipt)
            }
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen(
                "payment gateway circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => {
                tracing::warn!(withdrawal_id = %withdrawal.id, error = %e, "Payout attempt failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_starts_closed() {
        let gateway =
            HttpPaymentGateway::new("https://payouts.example.com".to_string(), "s3cret".to_string());
        assert_eq!(gateway.circuit_state(), "closed");
    }

    #[test]
    fn test_signature_is_hex_sha256_hmac() {
        let gateway =
            HttpPaymentGateway::new("https://payouts.example.com".to_string(), "key".to_string());
        let signature = gateway
            .sign(b"The quick brown fox jumps over the lazy dog")
            .unwrap();
        assert_eq!(
            signature,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }
}
