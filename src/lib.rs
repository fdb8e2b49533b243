pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod startup;
pub mod validation;

use axum::{
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::adapters::{
    HttpPaymentGateway, ManualPaymentGateway, PostgresEarningsSource, TracingNotifier,
    WebhookNotifier,
};
use crate::config::Config;
use crate::ports::{EarningsSource, NotificationSink, PaymentGateway};
use crate::services::{MethodService, WalletService, WithdrawalService};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub wallets: WalletService,
    pub withdrawals: WithdrawalService,
    pub methods: MethodService,
    pub admin_api_key: String,
}

impl AppState {
    /// Wires services to explicit collaborators. Tests use this to swap in
    /// fakes for the gateway and notification sink.
    pub fn with_collaborators(
        db: PgPool,
        admin_api_key: String,
        earnings: Arc<dyn EarningsSource>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let wallets = WalletService::new(db.clone(), earnings);
        let withdrawals = WithdrawalService::new(db.clone(), wallets.clone(), gateway, notifier);
        let methods = MethodService::new(db.clone());

        Self {
            db,
            wallets,
            withdrawals,
            methods,
            admin_api_key,
        }
    }

    /// Picks adapters from configuration: the HTTP gateway when
    /// `PAYMENT_GATEWAY_URL` is set, manual payouts otherwise; the webhook
    /// notifier when `NOTIFICATION_WEBHOOK_URL` is set, log output otherwise.
    pub fn from_config(config: &Config, db: PgPool) -> Self {
        let earnings: Arc<dyn EarningsSource> = Arc::new(PostgresEarningsSource::new(db.clone()));

        let gateway: Arc<dyn PaymentGateway> =
            match (&config.payment_gateway_url, &config.payment_gateway_secret) {
                (Some(url), Some(secret)) => {
                    tracing::info!(url = %url, "Using HTTP payment gateway");
                    Arc::new(HttpPaymentGateway::new(url.clone(), secret.clone()))
                }
                _ => {
                    tracing::info!("Using manual payment gateway");
                    Arc::new(ManualPaymentGateway)
                }
            };

        let notifier: Arc<dyn NotificationSink> = match &config.notification_webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
            None => Arc::new(TracingNotifier),
        };

        Self::with_collaborators(db, config.admin_api_key.clone(), earnings, gateway, notifier)
    }
}

pub fn create_app(state: AppState) -> Router {
    create_app_with_cors(state, &[])
}

pub fn create_app_with_cors(state: AppState, allowed_origins: &[String]) -> Router {
    let admin = Router::new()
        .route("/all", get(handlers::admin::list_all))
        .route("/stats", get(handlers::admin::stats))
        .route(
            "/methods",
            get(handlers::methods::list_methods).post(handlers::methods::create_method),
        )
        .route(
            "/methods/:id",
            get(handlers::methods::get_method)
                .put(handlers::methods::update_method)
                .delete(handlers::methods::delete_method),
        )
        .route("/:id", get(handlers::admin::get_withdrawal))
        .route("/:id/status", put(handlers::admin::update_status))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::admin_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/withdrawals/wallet", get(handlers::wallet::get_wallet))
        .route(
            "/withdrawals/available-methods",
            get(handlers::wallet::available_methods),
        )
        .route(
            "/withdrawals/request",
            post(handlers::withdrawals::request_withdrawal),
        )
        .route(
            "/withdrawals/my-requests",
            get(handlers::withdrawals::my_requests),
        )
        .route(
            "/withdrawals/:id/cancel",
            post(handlers::withdrawals::cancel_withdrawal),
        )
        .nest("/withdrawals/admin", admin)
        .layer(axum_middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
