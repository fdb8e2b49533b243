use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::WithdrawalStatus;
use crate::error::AppError;
use crate::handlers::withdrawals::ListQuery;
use crate::middleware::auth::AdminCaller;
use crate::services::withdrawal::StatusChange;
use crate::AppState;

pub async fn list_all(
    State(state): State<AppState>,
    AdminCaller(_admin_id): AdminCaller,
    Query(params): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (filter, pagination) = params.into_filter()?;
    let page = state
        .withdrawals
        .list_withdrawals(&filter, pagination)
        .await?;
    Ok(Json(page))
}

pub async fn stats(
    State(state): State<AppState>,
    AdminCaller(_admin_id): AdminCaller,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.withdrawals.statistics().await?))
}

pub async fn get_withdrawal(
    State(state): State<AppState>,
    AdminCaller(_admin_id): AdminCaller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.withdrawals.get_withdrawal(id, None).await?))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusBody {
    pub status: String,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub processing_notes: Option<String>,
}

pub async fn update_status(
    State(state): State<AppState>,
    AdminCaller(admin_id): AdminCaller,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<impl IntoResponse, AppError> {
    let status = WithdrawalStatus::from_str(&body.status)
        .map_err(|_| AppError::Validation(format!("status: unknown status '{}'", body.status)))?;

    let withdrawal = state
        .withdrawals
        .update_status(
            id,
            admin_id,
            StatusChange {
                status,
                rejection_reason: body.rejection_reason,
                processing_notes: body.processing_notes,
            },
        )
        .await?;

    Ok(Json(withdrawal))
}
