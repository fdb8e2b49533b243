use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::{BigDecimal, Json};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{
    MethodType, ProcessingTimeUnit, RequiredField, Withdrawal, WithdrawalDetail, WithdrawalMethod,
    WithdrawalStatus, WithdrawalTotals,
};

/// Row of `withdrawal_methods`. Enum columns are stored as text and
/// checked when converted into the domain type.
#[derive(Debug, FromRow)]
pub struct WithdrawalMethodRow {
    pub id: Uuid,
    pub name: String,
    pub method_type: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub icon: Option<String>,
    pub fee_percentage: BigDecimal,
    pub min_amount: BigDecimal,
    pub max_amount: BigDecimal,
    pub currency: String,
    pub supported_currencies: Vec<String>,
    pub processing_time: i32,
    pub processing_time_unit: String,
    pub required_fields: Json<Vec<RequiredField>>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WithdrawalMethodRow {
    pub fn into_domain(self) -> Result<WithdrawalMethod, sqlx::Error> {
        let method_type = MethodType::parse(&self.method_type)
            .ok_or_else(|| decode_error("method_type", &self.method_type))?;
        let processing_time_unit = ProcessingTimeUnit::parse(&self.processing_time_unit)
            .ok_or_else(|| decode_error("processing_time_unit", &self.processing_time_unit))?;

        Ok(WithdrawalMethod {
            id: self.id,
            name: self.name,
            method_type,
            description: self.description,
            instructions: self.instructions,
            icon: self.icon,
            fee_percentage: self.fee_percentage,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            currency: self.currency,
            supported_currencies: self.supported_currencies,
            processing_time: self.processing_time,
            processing_time_unit,
            required_fields: self.required_fields.0,
            display_order: self.display_order,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct WithdrawalRow {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub withdrawal_method_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub fee_percentage_at_request: BigDecimal,
    pub processing_fee: BigDecimal,
    pub net_amount: BigDecimal,
    pub status: String,
    pub metadata: Value,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processing_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub gateway_transaction_id: Option<String>,
    pub gateway_response: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WithdrawalRow {
    pub fn into_domain(self) -> Result<Withdrawal, sqlx::Error> {
        let status = WithdrawalStatus::from_str(&self.status)
            .map_err(|_| decode_error("status", &self.status))?;

        Ok(Withdrawal {
            id: self.id,
            creator_id: self.creator_id,
            withdrawal_method_id: self.withdrawal_method_id,
            amount: self.amount,
            currency: self.currency,
            fee_percentage_at_request: self.fee_percentage_at_request,
            processing_fee: self.processing_fee,
            net_amount: self.net_amount,
            status,
            metadata: self.metadata,
            processed_by: self.processed_by,
            processed_at: self.processed_at,
            processing_notes: self.processing_notes,
            rejection_reason: self.rejection_reason,
            gateway_transaction_id: self.gateway_transaction_id,
            gateway_response: self.gateway_response,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Withdrawal row with its method's name and type joined in.
#[derive(Debug, FromRow)]
pub struct WithdrawalDetailRow {
    #[sqlx(flatten)]
    pub withdrawal: WithdrawalRow,
    pub method_name: String,
    pub method_type: String,
}

impl WithdrawalDetailRow {
    pub fn into_domain(self) -> Result<WithdrawalDetail, sqlx::Error> {
        Ok(WithdrawalDetail {
            withdrawal: self.withdrawal.into_domain()?,
            method_name: self.method_name,
            method_type: self.method_type,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct WithdrawalTotalsRow {
    pub currency: String,
    pub reserved: BigDecimal,
    pub withdrawn: BigDecimal,
    pub refunded: BigDecimal,
}

impl From<WithdrawalTotalsRow> for WithdrawalTotals {
    fn from(row: WithdrawalTotalsRow) -> Self {
        WithdrawalTotals {
            currency: row.currency,
            reserved: row.reserved,
            withdrawn: row.withdrawn,
            refunded: row.refunded,
        }
    }
}

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct StatusStat {
    pub status: String,
    pub currency: String,
    pub count: i64,
    pub total_amount: BigDecimal,
    pub total_fees: BigDecimal,
}

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct MethodStat {
    pub method_id: Uuid,
    pub method_name: String,
    pub currency: String,
    pub count: i64,
    pub total_amount: BigDecimal,
    pub total_fees: BigDecimal,
}

fn decode_error(column: &str, value: &str) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("unrecognized value '{}'", value).into(),
    }
}
