pub mod admin;
pub mod methods;
pub mod wallet;
pub mod withdrawals;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use bigdecimal::BigDecimal;
use serde::Serialize;
use std::str::FromStr;

use crate::error::AppError;
use crate::validation::validate_money_magnitude;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DbPoolStats {
    pub active_connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
    pub usage_percent: f32,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db: String,
    pub db_pool: DbPoolStats,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_connected = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();

    let pool = &state.db;
    let active_connections = pool.size();
    let max_connections = pool.options().get_max_connections();
    let usage_percent = if max_connections == 0 {
        0.0
    } else {
        (active_connections as f32 / max_connections as f32) * 100.0
    };

    let body = HealthStatus {
        status: if db_connected { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        db: if db_connected { "connected" } else { "disconnected" }.to_string(),
        db_pool: DbPoolStats {
            active_connections,
            idle_connections: pool.num_idle() as u32,
            max_connections,
            usage_percent,
        },
    };

    let status_code = if db_connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(body))
}

/// Parses an optional decimal query parameter. Values outside the range a
/// money column can hold are rejected before any arithmetic runs.
pub fn parse_optional_amount(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<BigDecimal>, AppError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let amount = BigDecimal::from_str(value)
        .map_err(|_| AppError::BadRequest(format!("Invalid '{}': not a number", field)))?;
    validate_money_magnitude(field, &amount)?;

    Ok(Some(amount))
}
