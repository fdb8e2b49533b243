//! Payout channel definitions and the metadata schema they impose on
//! withdrawal requests.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::validation::{ValidationError, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MethodType {
    BankTransfer,
    EWallet,
    Paypal,
    Crypto,
    Instapay,
    MobileMoney,
    Other,
}

impl MethodType {
    pub const ALL: [MethodType; 7] = [
        MethodType::BankTransfer,
        MethodType::EWallet,
        MethodType::Paypal,
        MethodType::Crypto,
        MethodType::Instapay,
        MethodType::MobileMoney,
        MethodType::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MethodType::BankTransfer => "BANK_TRANSFER",
            MethodType::EWallet => "E_WALLET",
            MethodType::Paypal => "PAYPAL",
            MethodType::Crypto => "CRYPTO",
            MethodType::Instapay => "INSTAPAY",
            MethodType::MobileMoney => "MOBILE_MONEY",
            MethodType::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        MethodType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingTimeUnit {
    Minutes,
    Hours,
    Days,
    BusinessDays,
}

impl ProcessingTimeUnit {
    pub const ALL: [ProcessingTimeUnit; 4] = [
        ProcessingTimeUnit::Minutes,
        ProcessingTimeUnit::Hours,
        ProcessingTimeUnit::Days,
        ProcessingTimeUnit::BusinessDays,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingTimeUnit::Minutes => "MINUTES",
            ProcessingTimeUnit::Hours => "HOURS",
            ProcessingTimeUnit::Days => "DAYS",
            ProcessingTimeUnit::BusinessDays => "BUSINESS_DAYS",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        ProcessingTimeUnit::ALL
            .iter()
            .copied()
            .find(|unit| unit.as_str() == value)
    }

    fn label(self, plural: bool) -> &'static str {
        match (self, plural) {
            (ProcessingTimeUnit::Minutes, false) => "minute",
            (ProcessingTimeUnit::Minutes, true) => "minutes",
            (ProcessingTimeUnit::Hours, false) => "hour",
            (ProcessingTimeUnit::Hours, true) => "hours",
            (ProcessingTimeUnit::Days, false) => "day",
            (ProcessingTimeUnit::Days, true) => "days",
            (ProcessingTimeUnit::BusinessDays, false) => "business day",
            (ProcessingTimeUnit::BusinessDays, true) => "business days",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldInputType {
    Text,
    Number,
    Email,
    Phone,
    Iban,
    Select,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub digits_only: bool,
}

/// One entry of a method's metadata schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredField {
    pub name: String,
    pub label: String,
    pub input_type: FieldInputType,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub rules: FieldRules,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalMethod {
    pub id: Uuid,
    pub name: String,
    pub method_type: MethodType,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub icon: Option<String>,
    pub fee_percentage: BigDecimal,
    pub min_amount: BigDecimal,
    pub max_amount: BigDecimal,
    pub currency: String,
    pub supported_currencies: Vec<String>,
    pub processing_time: i32,
    pub processing_time_unit: ProcessingTimeUnit,
    pub required_fields: Vec<RequiredField>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WithdrawalMethod {
    pub fn supports_currency(&self, currency: &str) -> bool {
        self.currency == currency || self.supported_currencies.iter().any(|c| c == currency)
    }

    pub fn within_limits(&self, amount: &BigDecimal) -> bool {
        amount >= &self.min_amount && amount <= &self.max_amount
    }

    /// Human readable estimate such as "2 business days" or "Instant".
    pub fn processing_time_display(&self) -> String {
        match self.processing_time {
            n if n <= 0 => "Instant".to_string(),
            1 => format!("1 {}", self.processing_time_unit.label(false)),
            n => format!("{} {}", n, self.processing_time_unit.label(true)),
        }
    }

    pub fn validate_metadata(&self, metadata: &Value) -> ValidationResult {
        validate_metadata(&self.required_fields, metadata)
    }
}

/// Checks a request's metadata object against a method's field schema.
/// Unknown keys are tolerated; the first failing field is reported.
pub fn validate_metadata(fields: &[RequiredField], metadata: &Value) -> ValidationResult {
    let map = metadata
        .as_object()
        .ok_or_else(|| ValidationError::new("metadata", "must be a JSON object"))?;

    for field in fields {
        field.validate(map.get(&field.name))?;
    }

    Ok(())
}

impl RequiredField {
    fn error(&self, message: impl Into<String>) -> ValidationError {
        ValidationError::new(format!("metadata.{}", self.name), message)
    }

    pub fn validate(&self, value: Option<&Value>) -> ValidationResult {
        let text = match value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(Value::Number(n)) if self.input_type == FieldInputType::Number => {
                Some(n.to_string())
            }
            Some(_) => return Err(self.error(format!("{} must be a string", self.label))),
        };

        let text = match text {
            Some(text) => text,
            None if self.required => {
                return Err(self.error(format!("{} is required", self.label)))
            }
            None => return Ok(()),
        };

        self.check_input_type(&text)?;
        self.check_rules(&text)
    }

    fn check_input_type(&self, text: &str) -> ValidationResult {
        let ok = match self.input_type {
            FieldInputType::Text => true,
            FieldInputType::Number => is_decimal_number(text),
            FieldInputType::Email => is_email(text),
            FieldInputType::Phone => is_phone(text),
            FieldInputType::Iban => is_iban(text),
            FieldInputType::Select => self
                .rules
                .options
                .as_ref()
                .map(|options| options.iter().any(|o| o == text))
                .unwrap_or(false),
        };

        if ok {
            return Ok(());
        }

        let expected = match self.input_type {
            FieldInputType::Text => "text",
            FieldInputType::Number => "a number",
            FieldInputType::Email => "a valid email address",
            FieldInputType::Phone => "a valid phone number",
            FieldInputType::Iban => "a valid IBAN",
            FieldInputType::Select => "one of the listed options",
        };
        Err(self.error(format!("{} must be {}", self.label, expected)))
    }

    fn check_rules(&self, text: &str) -> ValidationResult {
        let rules = &self.rules;
        let len = text.chars().count();

        if let Some(min) = rules.min_length {
            if len < min {
                return Err(self.error(format!(
                    "{} must be at least {} characters",
                    self.label, min
                )));
            }
        }

        if let Some(max) = rules.max_length {
            if len > max {
                return Err(self.error(format!(
                    "{} must be at most {} characters",
                    self.label, max
                )));
            }
        }

        if let Some(prefix) = &rules.prefix {
            if !text.starts_with(prefix.as_str()) {
                return Err(self.error(format!("{} must start with '{}'", self.label, prefix)));
            }
        }

        if rules.digits_only && !text.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(self.error(format!("{} must contain only digits", self.label)));
        }

        if self.input_type != FieldInputType::Select {
            if let Some(options) = &rules.options {
                if !options.iter().any(|o| o == text) {
                    return Err(self.error(format!(
                        "{} must be one of: {}",
                        self.label,
                        options.join(", ")
                    )));
                }
            }
        }

        Ok(())
    }
}

fn is_decimal_number(text: &str) -> bool {
    let mut parts = text.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let fraction = parts.next();

    !whole.is_empty()
        && whole.chars().all(|ch| ch.is_ascii_digit())
        && fraction.map_or(true, |f| !f.is_empty() && f.chars().all(|ch| ch.is_ascii_digit()))
}

fn is_email(text: &str) -> bool {
    let mut parts = text.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !text.contains(char::is_whitespace)
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}

fn is_phone(text: &str) -> bool {
    let body = text.strip_prefix('+').unwrap_or(text);
    if !body
        .chars()
        .all(|ch| ch.is_ascii_digit() || ch == ' ' || ch == '-')
    {
        return false;
    }
    let digits = body.chars().filter(|ch| ch.is_ascii_digit()).count();
    (7..=15).contains(&digits)
}

/// ISO 13616 structure plus the mod-97 checksum.
fn is_iban(text: &str) -> bool {
    let compact: String = text
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .map(|ch| ch.to_ascii_uppercase())
        .collect();

    if !(15..=34).contains(&compact.len()) || !compact.chars().all(|ch| ch.is_ascii_alphanumeric())
    {
        return false;
    }

    let bytes = compact.as_bytes();
    if !bytes[0].is_ascii_alphabetic()
        || !bytes[1].is_ascii_alphabetic()
        || !bytes[2].is_ascii_digit()
        || !bytes[3].is_ascii_digit()
    {
        return false;
    }

    let rearranged = compact[4..].chars().chain(compact[..4].chars());
    let mut remainder: u32 = 0;
    for ch in rearranged {
        let value = match ch.to_digit(36) {
            Some(v) => v,
            None => return false,
        };
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }

    remainder == 1
}
