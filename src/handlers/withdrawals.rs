use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

use crate::db::queries::WithdrawalFilter;
use crate::domain::WithdrawalStatus;
use crate::error::AppError;
use crate::middleware::auth::CreatorCaller;
use crate::services::withdrawal::{NewWithdrawal, Pagination};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WithdrawalRequestBody {
    pub withdrawal_method_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    #[serde(default = "empty_object")]
    pub metadata: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    CreatorCaller(creator_id): CreatorCaller,
    Json(body): Json<WithdrawalRequestBody>,
) -> Result<impl IntoResponse, AppError> {
    let withdrawal = state
        .withdrawals
        .request_withdrawal(
            creator_id,
            NewWithdrawal {
                withdrawal_method_id: body.withdrawal_method_id,
                amount: body.amount,
                currency: body.currency.trim().to_string(),
                metadata: body.metadata,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(withdrawal)))
}

/// Listing query shared by the creator history and the admin listing.
/// Everything arrives as text so malformed values produce a 400 with a
/// useful message instead of a generic rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub method_id: Option<String>,
    pub creator_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListQuery {
    pub fn into_filter(self) -> Result<(WithdrawalFilter, Pagination), AppError> {
        let status = non_empty(self.status.as_deref())
            .map(|s| {
                WithdrawalStatus::from_str(s)
                    .map_err(|_| AppError::BadRequest(format!("Unknown status '{}'", s)))
            })
            .transpose()?;

        let filter = WithdrawalFilter {
            status,
            method_id: parse_uuid("method_id", self.method_id.as_deref())?,
            creator_id: parse_uuid("creator_id", self.creator_id.as_deref())?,
            created_from: parse_date_bound("start_date", self.start_date.as_deref(), false)?,
            created_to: parse_date_bound("end_date", self.end_date.as_deref(), true)?,
        };

        if let (Some(from), Some(to)) = (filter.created_from, filter.created_to) {
            if from > to {
                return Err(AppError::BadRequest(
                    "start_date must not be after end_date".to_string(),
                ));
            }
        }

        let pagination = Pagination::new(
            parse_int("page", self.page.as_deref())?,
            parse_int("limit", self.limit.as_deref())?,
        )?;

        Ok((filter, pagination))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_uuid(field: &str, value: Option<&str>) -> Result<Option<Uuid>, AppError> {
    non_empty(value)
        .map(|v| {
            Uuid::parse_str(v)
                .map_err(|_| AppError::BadRequest(format!("Invalid '{}': not a UUID", field)))
        })
        .transpose()
}

fn parse_int(field: &str, value: Option<&str>) -> Result<Option<i64>, AppError> {
    non_empty(value)
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| AppError::BadRequest(format!("Invalid '{}': not an integer", field)))
        })
        .transpose()
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates. A bare end date
/// covers the whole day.
pub fn parse_date_bound(
    field: &str,
    value: Option<&str>,
    end_of_day: bool,
) -> Result<Option<DateTime<Utc>>, AppError> {
    let Some(value) = non_empty(value) else {
        return Ok(None);
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AppError::BadRequest(format!(
            "Invalid '{}': expected YYYY-MM-DD or an RFC 3339 timestamp",
            field
        ))
    })?;

    let time = if end_of_day {
        date.and_hms_micro_opt(23, 59, 59, 999_999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };

    Ok(time.map(|t| t.and_utc()))
}

pub async fn my_requests(
    State(state): State<AppState>,
    CreatorCaller(creator_id): CreatorCaller,
    Query(params): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (mut filter, pagination) = params.into_filter()?;
    filter.creator_id = Some(creator_id);

    let page = state
        .withdrawals
        .list_withdrawals(&filter, pagination)
        .await?;
    Ok(Json(page))
}

pub async fn cancel_withdrawal(
    State(state): State<AppState>,
    CreatorCaller(creator_id): CreatorCaller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let withdrawal = state.withdrawals.cancel_withdrawal(creator_id, id).await?;
    Ok(Json(withdrawal))
}
