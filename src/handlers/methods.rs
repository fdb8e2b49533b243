use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::AdminCaller;
use crate::services::methods::{CreateMethodRequest, UpdateMethodRequest};
use crate::AppState;

pub async fn list_methods(
    State(state): State<AppState>,
    AdminCaller(_admin_id): AdminCaller,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.methods.list_all().await?))
}

pub async fn create_method(
    State(state): State<AppState>,
    AdminCaller(admin_id): AdminCaller,
    Json(body): Json<CreateMethodRequest>,
) -> Result<impl IntoResponse, AppError> {
    let method = state.methods.create_method(body).await?;
    tracing::info!(admin_id = %admin_id, method_id = %method.id, "Admin created withdrawal method");
    Ok((StatusCode::CREATED, Json(method)))
}

pub async fn get_method(
    State(state): State<AppState>,
    AdminCaller(_admin_id): AdminCaller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.methods.get_method(id).await?))
}

pub async fn update_method(
    State(state): State<AppState>,
    AdminCaller(_admin_id): AdminCaller,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMethodRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.methods.update_method(id, body).await?))
}

pub async fn delete_method(
    State(state): State<AppState>,
    AdminCaller(_admin_id): AdminCaller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.methods.delete_method(id).await?;
    Ok(Json(json!({ "id": id, "outcome": outcome })))
}
