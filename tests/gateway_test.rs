use bigdecimal::BigDecimal;
use chrono::Utc;
use mockito::{Matcher, Server};
use serde_json::json;
use std::str::FromStr;
use uuid::Uuid;

use payout_core::adapters::http_gateway::{IDEMPOTENCY_HEADER, SIGNATURE_HEADER};
use payout_core::adapters::{HttpPaymentGateway, ManualPaymentGateway, WebhookNotifier};
use payout_core::domain::{
    MethodType, ProcessingTimeUnit, Withdrawal, WithdrawalMethod, WithdrawalStatus,
};
use payout_core::ports::{
    GatewayError, NotificationError, NotificationSink, PaymentGateway, WithdrawalNotification,
};

fn method() -> WithdrawalMethod {
    WithdrawalMethod {
        id: Uuid::new_v4(),
        name: "Instapay".to_string(),
        method_type: MethodType::Instapay,
        description: None,
        instructions: None,
        icon: None,
        fee_percentage: BigDecimal::from_str("2.00").unwrap(),
        min_amount: BigDecimal::from_str("100.00").unwrap(),
        max_amount: BigDecimal::from_str("5000.00").unwrap(),
        currency: "EGP".to_string(),
        supported_currencies: vec!["EGP".to_string()],
        processing_time: 1,
        processing_time_unit: ProcessingTimeUnit::Hours,
        required_fields: vec![],
        display_order: 0,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn withdrawal(method: &WithdrawalMethod) -> Withdrawal {
    Withdrawal::new_pending(
        Uuid::new_v4(),
        method,
        BigDecimal::from_str("500.00").unwrap(),
        "EGP".to_string(),
        json!({ "phone": "+201001234567" }),
    )
}

#[tokio::test]
async fn test_payout_is_signed_and_receipt_returned() {
    let mut server = Server::new_async().await;
    let method = method();
    let withdrawal = withdrawal(&method);

    let mock = server
        .mock("POST", "/payouts")
        .match_header(SIGNATURE_HEADER, Matcher::Regex("^[0-9a-f]{64}$".to_string()))
        .match_header(IDEMPOTENCY_HEADER, withdrawal.id.to_string().as_str())
        .match_body(Matcher::PartialJson(json!({
            "reference": withdrawal.id.to_string(),
            "amount": "490.00",
            "currency": "EGP",
            "method_type": "INSTAPAY",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"transaction_id":"po_123","state":"accepted"}"#)
        .create_async()
        .await;

    let gateway = HttpPaymentGateway::new(server.url(), "s3cret".to_string());
    let receipt = gateway.attempt_payout(&withdrawal, &method).await.unwrap();

    assert_eq!(receipt.gateway_transaction_id, "po_123");
    assert_eq!(receipt.gateway_response["state"], "accepted");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_declined_payout_reports_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/payouts")
        .with_status(422)
        .with_body("account closed")
        .create_async()
        .await;

    let method = method();
    let gateway = HttpPaymentGateway::new(server.url(), "s3cret".to_string());
    let err = gateway
        .attempt_payout(&withdrawal(&method), &method)
        .await
        .unwrap_err();

    match err {
        GatewayError::Declined { status, body } => {
            assert_eq!(status, 422);
            assert_eq!(body, "account closed");
        }
        other => panic!("expected Declined, got {:?}", other),
    }
}

#[tokio::test]
async fn test_response_without_transaction_id_is_invalid() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/payouts")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"state":"accepted"}"#)
        .create_async()
        .await;

    let method = method();
    let gateway = HttpPaymentGateway::new(server.url(), "s3cret".to_string());
    let err = gateway
        .attempt_payout(&withdrawal(&method), &method)
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_circuit_opens_after_consecutive_failures() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/payouts")
        .with_status(503)
        .expect(2)
        .create_async()
        .await;

    let method = method();
    let gateway =
        HttpPaymentGateway::with_circuit_breaker(server.url(), "s3cret".to_string(), 2, 60);

    for _ in 0..2 {
        let err = gateway
            .attempt_payout(&withdrawal(&method), &method)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Declined { status: 503, .. }));
    }

    let err = gateway
        .attempt_payout(&withdrawal(&method), &method)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::CircuitOpen(_)));
    assert_eq!(gateway.circuit_state(), "open");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_manual_gateway_generates_reference() {
    let method = method();
    let receipt = ManualPaymentGateway
        .attempt_payout(&withdrawal(&method), &method)
        .await
        .unwrap();

    assert!(receipt.gateway_transaction_id.starts_with("manual-"));
    assert_eq!(receipt.gateway_response["mode"], "manual");
}

#[tokio::test]
async fn test_webhook_notifier_posts_notification() {
    let mut server = Server::new_async().await;
    let method = method();
    let mut w = withdrawal(&method);
    w.status = WithdrawalStatus::Rejected;
    w.rejection_reason = Some("Name mismatch".to_string());

    let mock = server
        .mock("POST", "/notify")
        .match_body(Matcher::PartialJson(json!({
            "withdrawal_id": w.id.to_string(),
            "status": "REJECTED",
            "rejection_reason": "Name mismatch",
        })))
        .with_status(202)
        .create_async()
        .await;

    let notifier = WebhookNotifier::new(format!("{}/notify", server.url()));
    notifier
        .notify(&WithdrawalNotification::from(&w))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_webhook_notifier_surfaces_rejection() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/notify")
        .with_status(500)
        .create_async()
        .await;

    let method = method();
    let notifier = WebhookNotifier::new(format!("{}/notify", server.url()));
    let err = notifier
        .notify(&WithdrawalNotification::from(&withdrawal(&method)))
        .await
        .unwrap_err();

    assert!(matches!(err, NotificationError::Rejected(500)));
}
