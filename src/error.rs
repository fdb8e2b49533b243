use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bigdecimal::BigDecimal;
use serde_json::json;
use thiserror::Error;

use crate::domain::WithdrawalStatus;
use crate::ports::{EarningsError, GatewayError};
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No earnings available in {currency}")]
    NoEarnings { currency: String },

    #[error(
        "Amount {requested} {currency} is outside the limits of {method}: minimum {min}, maximum {max}"
    )]
    AmountOutOfRange {
        method: String,
        currency: String,
        min: BigDecimal,
        max: BigDecimal,
        requested: BigDecimal,
    },

    #[error("Insufficient balance: available {available} {currency}, requested {requested} {currency}")]
    InsufficientBalance {
        currency: String,
        available: BigDecimal,
        requested: BigDecimal,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot change withdrawal status from {from} to {to}")]
    InvalidTransition {
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payout processing failed, retry later: {0}")]
    Gateway(String),

    #[error("Earnings source unavailable: {0}")]
    Earnings(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_)
            | AppError::NoEarnings { .. }
            | AppError::AmountOutOfRange { .. }
            | AppError::InsufficientBalance { .. }
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Earnings(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(sqlx::Error::RowNotFound) => "NOT_FOUND",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NoEarnings { .. } => "NO_EARNINGS",
            AppError::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            AppError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Gateway(_) => "GATEWAY_ERROR",
            AppError::Earnings(_) => "EARNINGS_UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
        }
    }

    /// Transient failures the caller may retry without changing the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Gateway(_) | AppError::Earnings(_))
    }

    /// Maps a unique-constraint violation to `Conflict`, everything else to
    /// `Database`.
    pub fn from_unique_violation(err: sqlx::Error, message: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                AppError::Conflict(message.into())
            }
            _ => AppError::Database(err),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Gateway(err.to_string())
    }
}

impl From<EarningsError> for AppError {
    fn from(err: EarningsError) -> Self {
        match err {
            EarningsError::Database(e) => AppError::Database(e),
            other => AppError::Earnings(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "Request failed");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "Request rejected");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "code": self.error_code(),
            "status": status.as_u16(),
            "retryable": self.is_retryable(),
        }));

        (status, body).into_response()
    }
}
