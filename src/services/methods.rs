use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use crate::db::queries;
use crate::domain::money::zero;
use crate::domain::{
    compute_fee, FieldInputType, MethodType, ProcessingTimeUnit, RequiredField, WithdrawalMethod,
};
use crate::error::AppError;
use crate::validation::{
    sanitize_string, validate_amount_bounds, validate_currency_code, validate_fee_percentage,
    validate_max_len, validate_positive_amount, validate_required, ValidationError,
    ValidationResult, ICON_MAX_LEN, METHOD_NAME_MAX_LEN,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMethodRequest {
    pub name: String,
    pub method_type: MethodType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    pub fee_percentage: BigDecimal,
    pub min_amount: BigDecimal,
    pub max_amount: BigDecimal,
    pub currency: String,
    #[serde(default)]
    pub supported_currencies: Vec<String>,
    #[serde(default)]
    pub processing_time: i32,
    pub processing_time_unit: ProcessingTimeUnit,
    #[serde(default)]
    pub required_fields: Vec<RequiredField>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMethodRequest {
    pub name: Option<String>,
    pub method_type: Option<MethodType>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub icon: Option<String>,
    pub fee_percentage: Option<BigDecimal>,
    pub min_amount: Option<BigDecimal>,
    pub max_amount: Option<BigDecimal>,
    pub currency: Option<String>,
    pub supported_currencies: Option<Vec<String>>,
    pub processing_time: Option<i32>,
    pub processing_time_unit: Option<ProcessingTimeUnit>,
    pub required_fields: Option<Vec<RequiredField>>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// Method as shown to a creator choosing where to withdraw.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableMethod {
    #[serde(flatten)]
    pub method: WithdrawalMethod,
    pub processing_time_display: String,
    pub estimated_fee: BigDecimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    Deactivated,
}

/// Admin-managed catalogue of payout channels and their fee/limit policy.
#[derive(Clone)]
pub struct MethodService {
    pool: PgPool,
}

impl MethodService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_method(
        &self,
        request: CreateMethodRequest,
    ) -> Result<WithdrawalMethod, AppError> {
        let now = Utc::now();
        let mut method = WithdrawalMethod {
            id: Uuid::new_v4(),
            name: request.name,
            method_type: request.method_type,
            description: request.description,
            instructions: request.instructions,
            icon: request.icon,
            fee_percentage: request.fee_percentage,
            min_amount: request.min_amount,
            max_amount: request.max_amount,
            currency: request.currency,
            supported_currencies: request.supported_currencies,
            processing_time: request.processing_time,
            processing_time_unit: request.processing_time_unit,
            required_fields: request.required_fields,
            display_order: request.display_order,
            is_active: request.is_active,
            created_at: now,
            updated_at: now,
        };
        normalize_method(&mut method);
        validate_method(&method)?;

        let saved = queries::insert_method(&self.pool, &method)
            .await
            .map_err(|e| {
                AppError::from_unique_violation(
                    e,
                    format!("Withdrawal method '{}' already exists", method.name),
                )
            })?;

        tracing::info!(method_id = %saved.id, name = %saved.name, "Withdrawal method created");
        Ok(saved)
    }

    /// Applies a partial update. Existing withdrawals keep the fee they were
    /// charged at request time.
    pub async fn update_method(
        &self,
        id: Uuid,
        request: UpdateMethodRequest,
    ) -> Result<WithdrawalMethod, AppError> {
        let mut method = self.get_method(id).await?;
        apply_update(&mut method, request);
        normalize_method(&mut method);
        validate_method(&method)?;

        let saved = queries::update_method(&self.pool, &method)
            .await
            .map_err(|e| {
                AppError::from_unique_violation(
                    e,
                    format!("Withdrawal method '{}' already exists", method.name),
                )
            })?;

        tracing::info!(method_id = %saved.id, "Withdrawal method updated");
        Ok(saved)
    }

    pub async fn get_method(&self, id: Uuid) -> Result<WithdrawalMethod, AppError> {
        queries::get_method(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Withdrawal method {} not found", id)))
    }

    /// Every method including inactive ones.
    pub async fn list_all(&self) -> Result<Vec<WithdrawalMethod>, AppError> {
        Ok(queries::list_methods(&self.pool).await?)
    }

    /// Active methods paying out in `currency`, each with a fee estimate for
    /// `amount` (zero when no amount is given).
    pub async fn list_available(
        &self,
        currency: Option<&str>,
        amount: Option<&BigDecimal>,
    ) -> Result<Vec<AvailableMethod>, AppError> {
        if let Some(currency) = currency {
            validate_currency_code("currency", currency)?;
        }
        if let Some(amount) = amount {
            validate_positive_amount("amount", amount)?;
        }

        let methods = queries::list_active_methods(&self.pool, currency).await?;
        Ok(methods
            .into_iter()
            .map(|method| describe_available(method, amount))
            .collect())
    }

    /// Methods referenced by a withdrawal are deactivated instead of removed.
    /// The method row stays locked between the reference check and the
    /// delete, so a concurrent request cannot slip a reference in between.
    pub async fn delete_method(&self, id: Uuid) -> Result<DeleteOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        if !queries::lock_method(&mut tx, id).await? {
            return Err(AppError::NotFound(format!("Withdrawal method {} not found", id)));
        }

        let outcome = if queries::method_is_referenced(&mut *tx, id).await? {
            queries::deactivate_method(&mut *tx, id).await?;
            DeleteOutcome::Deactivated
        } else {
            queries::delete_method(&mut *tx, id).await?;
            DeleteOutcome::Deleted
        };
        tx.commit().await?;

        tracing::info!(method_id = %id, outcome = ?outcome, "Withdrawal method removed");
        Ok(outcome)
    }
}

pub fn describe_available(method: WithdrawalMethod, amount: Option<&BigDecimal>) -> AvailableMethod {
    let estimated_fee = amount
        .map(|a| compute_fee(a, &method.fee_percentage).processing_fee)
        .unwrap_or_else(|| zero().with_scale(2));

    AvailableMethod {
        processing_time_display: method.processing_time_display(),
        estimated_fee,
        method,
    }
}

fn apply_update(method: &mut WithdrawalMethod, update: UpdateMethodRequest) {
    if let Some(name) = update.name {
        method.name = name;
    }
    if let Some(method_type) = update.method_type {
        method.method_type = method_type;
    }
    if let Some(description) = update.description {
        method.description = Some(description);
    }
    if let Some(instructions) = update.instructions {
        method.instructions = Some(instructions);
    }
    if let Some(icon) = update.icon {
        method.icon = Some(icon);
    }
    if let Some(fee_percentage) = update.fee_percentage {
        method.fee_percentage = fee_percentage;
    }
    if let Some(min_amount) = update.min_amount {
        method.min_amount = min_amount;
    }
    if let Some(max_amount) = update.max_amount {
        method.max_amount = max_amount;
    }
    if let Some(currency) = update.currency {
        method.currency = currency;
    }
    if let Some(supported) = update.supported_currencies {
        method.supported_currencies = supported;
    }
    if let Some(processing_time) = update.processing_time {
        method.processing_time = processing_time;
    }
    if let Some(unit) = update.processing_time_unit {
        method.processing_time_unit = unit;
    }
    if let Some(fields) = update.required_fields {
        method.required_fields = fields;
    }
    if let Some(display_order) = update.display_order {
        method.display_order = display_order;
    }
    if let Some(is_active) = update.is_active {
        method.is_active = is_active;
    }
}

/// Trims free text and makes sure the primary currency is listed among the
/// supported ones exactly once.
fn normalize_method(method: &mut WithdrawalMethod) {
    method.name = sanitize_string(&method.name);
    method.currency = method.currency.trim().to_string();

    let mut seen = HashSet::new();
    let mut currencies = vec![method.currency.clone()];
    currencies.extend(method.supported_currencies.iter().map(|c| c.trim().to_string()));
    currencies.retain(|c| seen.insert(c.clone()));
    method.supported_currencies = currencies;
}

pub fn validate_method(method: &WithdrawalMethod) -> ValidationResult {
    validate_required("name", &method.name)?;
    validate_max_len("name", &method.name, METHOD_NAME_MAX_LEN)?;
    if let Some(icon) = &method.icon {
        validate_max_len("icon", icon, ICON_MAX_LEN)?;
    }

    validate_fee_percentage(&method.fee_percentage)?;
    validate_amount_bounds(&method.min_amount, &method.max_amount)?;

    validate_currency_code("currency", &method.currency)?;
    for currency in &method.supported_currencies {
        validate_currency_code("supported_currencies", currency)?;
    }

    if method.processing_time < 0 {
        return Err(ValidationError::new(
            "processing_time",
            "must not be negative",
        ));
    }

    validate_required_fields(&method.required_fields)
}

/// Schema sanity: unique non-empty names, consistent length rules and
/// options for every SELECT field.
pub fn validate_required_fields(fields: &[RequiredField]) -> ValidationResult {
    let mut names = HashSet::new();

    for field in fields {
        let field_ref = format!("required_fields.{}", field.name);

        if field.name.trim().is_empty() {
            return Err(ValidationError::new(
                "required_fields",
                "every field needs a name",
            ));
        }
        if !names.insert(field.name.as_str()) {
            return Err(ValidationError::new(field_ref, "is defined more than once"));
        }
        if field.label.trim().is_empty() {
            return Err(ValidationError::new(field_ref, "needs a label"));
        }

        if let (Some(min), Some(max)) = (field.rules.min_length, field.rules.max_length) {
            if min > max {
                return Err(ValidationError::new(
                    field_ref,
                    "min_length must not exceed max_length",
                ));
            }
        }

        if field.input_type == FieldInputType::Select
            && field.rules.options.as_ref().map_or(true, |o| o.is_empty())
        {
            return Err(ValidationError::new(
                field_ref,
                "SELECT fields need at least one option",
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldRules;
    use serde_json::json;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn method() -> WithdrawalMethod {
        WithdrawalMethod {
            id: Uuid::new_v4(),
            name: "Bank transfer".to_string(),
            method_type: MethodType::BankTransfer,
            description: None,
            instructions: None,
            icon: None,
            fee_percentage: dec("1.50"),
            min_amount: dec("50.00"),
            max_amount: dec("10000.00"),
            currency: "EGP".to_string(),
            supported_currencies: vec![],
            processing_time: 3,
            processing_time_unit: ProcessingTimeUnit::BusinessDays,
            required_fields: vec![],
            display_order: 1,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn field(name: &str, input_type: FieldInputType) -> RequiredField {
        RequiredField {
            name: name.to_string(),
            label: name.to_uppercase(),
            input_type,
            required: true,
            rules: FieldRules::default(),
        }
    }

    #[test]
    fn normalize_puts_primary_currency_first_once() {
        let mut m = method();
        m.supported_currencies = vec!["USD".to_string(), "EGP".to_string(), "USD".to_string()];
        normalize_method(&mut m);
        assert_eq!(m.supported_currencies, vec!["EGP", "USD"]);
    }

    #[test]
    fn valid_method_passes() {
        let mut m = method();
        normalize_method(&mut m);
        assert!(validate_method(&m).is_ok());
    }

    #[test]
    fn rejects_limits_beyond_column_range() {
        let huge = dec("1e900000000");

        let mut m = method();
        m.fee_percentage = huge.clone();
        assert_eq!(validate_method(&m).unwrap_err().field, "fee_percentage");

        let mut m = method();
        m.min_amount = huge.clone();
        assert_eq!(validate_method(&m).unwrap_err().field, "min_amount");

        let mut m = method();
        m.max_amount = huge;
        assert_eq!(validate_method(&m).unwrap_err().field, "max_amount");
    }

    #[test]
    fn rejects_inverted_limits_and_bad_fee() {
        let mut m = method();
        m.min_amount = dec("500");
        m.max_amount = dec("100");
        assert_eq!(validate_method(&m).unwrap_err().field, "max_amount");

        let mut m = method();
        m.fee_percentage = dec("120");
        assert_eq!(validate_method(&m).unwrap_err().field, "fee_percentage");
    }

    #[test]
    fn rejects_bad_currency_codes() {
        let mut m = method();
        m.supported_currencies = vec!["usd".to_string()];
        assert_eq!(
            validate_method(&m).unwrap_err().field,
            "supported_currencies"
        );
    }

    #[test]
    fn select_fields_need_options() {
        let mut select = field("bank", FieldInputType::Select);
        assert!(validate_required_fields(&[select.clone()]).is_err());

        select.rules.options = Some(vec!["CIB".to_string(), "NBE".to_string()]);
        assert!(validate_required_fields(&[select]).is_ok());
    }

    #[test]
    fn duplicate_field_names_rejected() {
        let fields = vec![
            field("iban", FieldInputType::Iban),
            field("iban", FieldInputType::Text),
        ];
        let err = validate_required_fields(&fields).unwrap_err();
        assert_eq!(err.field, "required_fields.iban");
    }

    #[test]
    fn update_only_touches_given_fields() {
        let mut m = method();
        apply_update(
            &mut m,
            UpdateMethodRequest {
                fee_percentage: Some(dec("3.00")),
                is_active: Some(false),
                ..Default::default()
            },
        );
        assert_eq!(m.fee_percentage, dec("3.00"));
        assert!(!m.is_active);
        assert_eq!(m.name, "Bank transfer");
        assert_eq!(m.min_amount, dec("50.00"));
    }

    #[test]
    fn available_method_estimates_fee() {
        let available = describe_available(method(), Some(&dec("1000")));
        assert_eq!(available.estimated_fee.to_string(), "15.00");
        assert_eq!(available.processing_time_display, "3 business days");

        let available = describe_available(method(), None);
        assert_eq!(available.estimated_fee.to_string(), "0.00");
    }

    #[test]
    fn create_request_rejects_unknown_fields() {
        let body = json!({
            "name": "Vodafone Cash",
            "method_type": "E_WALLET",
            "fee_percentage": "1.00",
            "min_amount": "10.00",
            "max_amount": "2000.00",
            "currency": "EGP",
            "processing_time_unit": "HOURS",
            "surprise": true
        });
        assert!(serde_json::from_value::<CreateMethodRequest>(body).is_err());
    }

    #[test]
    fn create_request_applies_defaults() {
        let body = json!({
            "name": "Vodafone Cash",
            "method_type": "E_WALLET",
            "fee_percentage": "1.00",
            "min_amount": "10.00",
            "max_amount": "2000.00",
            "currency": "EGP",
            "processing_time_unit": "HOURS"
        });
        let request: CreateMethodRequest = serde_json::from_value(body).unwrap();
        assert!(request.is_active);
        assert!(request.required_fields.is_empty());
        assert_eq!(request.processing_time, 0);
    }
}
