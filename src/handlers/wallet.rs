use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::WalletBalance;
use crate::error::AppError;
use crate::handlers::parse_optional_amount;
use crate::middleware::auth::CreatorCaller;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub creator_id: uuid::Uuid,
    pub balances: Vec<WalletBalance>,
}

pub async fn get_wallet(
    State(state): State<AppState>,
    CreatorCaller(creator_id): CreatorCaller,
) -> Result<impl IntoResponse, AppError> {
    let balances = state.wallets.get_wallet(creator_id).await?;
    Ok(Json(WalletResponse {
        creator_id,
        balances,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AvailableMethodsQuery {
    pub currency: Option<String>,
    pub amount: Option<String>,
}

pub async fn available_methods(
    State(state): State<AppState>,
    CreatorCaller(_creator_id): CreatorCaller,
    Query(params): Query<AvailableMethodsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let currency = params
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_ascii_uppercase);
    let amount = parse_optional_amount("amount", params.amount.as_deref())?;

    let methods = state
        .methods
        .list_available(currency.as_deref(), amount.as_ref())
        .await?;

    Ok(Json(methods))
}
