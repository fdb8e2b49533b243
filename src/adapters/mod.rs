//! Implementations of the collaborator ports.

pub mod http_gateway;
pub mod manual_gateway;
pub mod notifier;
pub mod postgres_earnings;

pub use http_gateway::HttpPaymentGateway;
pub use manual_gateway::ManualPaymentGateway;
pub use notifier::{TracingNotifier, WebhookNotifier};
pub use postgres_earnings::PostgresEarningsSource;
