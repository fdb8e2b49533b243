use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::ports::{NotificationError, NotificationSink, WithdrawalNotification};

/// Writes notifications to the log. Used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn notify(&self, notification: &WithdrawalNotification) -> Result<(), NotificationError> {
        tracing::info!(
            creator_id = %notification.creator_id,
            withdrawal_id = %notification.withdrawal_id,
            status = %notification.status,
            amount = %notification.amount,
            currency = %notification.currency,
            "Withdrawal notification"
        );
        Ok(())
    }
}

/// Posts notifications as JSON to an external delivery service.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();

        Self { client, url }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify(&self, notification: &WithdrawalNotification) -> Result<(), NotificationError> {
        let response = self.client.post(&self.url).json(notification).send().await?;

        if !response.status().is_success() {
            return Err(NotificationError::Rejected(response.status().as_u16()));
        }

        Ok(())
    }
}
