use bigdecimal::BigDecimal;
use std::fmt;

use crate::domain::money::has_money_precision;

pub const CURRENCY_CODE_LEN: usize = 3;
pub const METHOD_NAME_MAX_LEN: usize = 100;
pub const REASON_MAX_LEN: usize = 1000;
pub const ICON_MAX_LEN: usize = 255;
/// Integer digits that fit a `NUMERIC(18, 2)` column.
pub const MONEY_MAX_INTEGER_DIGITS: i64 = 16;
/// Decimal places accepted on input before rounding checks run.
pub const MONEY_MAX_INPUT_SCALE: i64 = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Drops control characters and collapses runs of whitespace.
pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// ISO 4217 shape: three upper-case ASCII letters.
pub fn validate_currency_code(field: &'static str, currency: &str) -> ValidationResult {
    validate_required(field, currency)?;

    if currency.len() != CURRENCY_CODE_LEN || !currency.chars().all(|ch| ch.is_ascii_uppercase())
    {
        return Err(ValidationError::new(
            field,
            "must be a 3-letter upper-case currency code",
        ));
    }

    Ok(())
}

/// Bounds the digits and exponent of a decimal before any comparison or
/// rescale touches it. Only the stored digit string is inspected, so values
/// like `1e900000000` are rejected without being expanded.
pub fn validate_money_magnitude(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    let (digits, scale) = amount.as_bigint_and_exponent();

    if scale > MONEY_MAX_INPUT_SCALE {
        return Err(ValidationError::new(field, "has too many decimal places"));
    }

    let digit_count = digits.to_string().trim_start_matches('-').len() as i64;
    if digit_count.saturating_sub(scale) > MONEY_MAX_INTEGER_DIGITS {
        return Err(ValidationError::new(
            field,
            format!("must have at most {} integer digits", MONEY_MAX_INTEGER_DIGITS),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    validate_money_magnitude(field, amount)?;

    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    if !has_money_precision(amount) {
        return Err(ValidationError::new(
            field,
            "must have at most 2 decimal places",
        ));
    }

    Ok(())
}

pub fn validate_fee_percentage(fee_percentage: &BigDecimal) -> ValidationResult {
    validate_money_magnitude("fee_percentage", fee_percentage)?;

    if fee_percentage < &BigDecimal::from(0) || fee_percentage > &BigDecimal::from(100) {
        return Err(ValidationError::new(
            "fee_percentage",
            "must be between 0 and 100",
        ));
    }

    if !has_money_precision(fee_percentage) {
        return Err(ValidationError::new(
            "fee_percentage",
            "must have at most 2 decimal places",
        ));
    }

    Ok(())
}

pub fn validate_amount_bounds(min_amount: &BigDecimal, max_amount: &BigDecimal) -> ValidationResult {
    validate_positive_amount("min_amount", min_amount)?;
    validate_positive_amount("max_amount", max_amount)?;

    if max_amount < min_amount {
        return Err(ValidationError::new(
            "max_amount",
            "must be greater than or equal to min_amount",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).expect("valid decimal")
    }

    #[test]
    fn blank_method_name_is_rejected() {
        assert!(validate_required("name", "Vodafone Cash").is_ok());
        let err = validate_required("name", " \t ").unwrap_err();
        assert_eq!(err.to_string(), "name: must not be empty");
    }

    #[test]
    fn reason_length_counts_characters() {
        let reason = "é".repeat(REASON_MAX_LEN);
        assert!(validate_max_len("rejection_reason", &reason, REASON_MAX_LEN).is_ok());
        let reason = format!("{}x", reason);
        assert!(validate_max_len("rejection_reason", &reason, REASON_MAX_LEN).is_err());
    }

    #[test]
    fn sanitizes_admin_input() {
        assert_eq!(sanitize_string("  invalid\taccount\r\n"), "invalid account");
        assert_eq!(sanitize_string("IBAN\u{0000} mismatch\u{0007}"), "IBAN mismatch");
        assert_eq!(sanitize_string("\n\n"), "");
    }

    #[test]
    fn validates_currency_code() {
        assert!(validate_currency_code("currency", "EGP").is_ok());
        assert!(validate_currency_code("currency", "USD").is_ok());
        assert!(validate_currency_code("currency", "usd").is_err());
        assert!(validate_currency_code("currency", "US").is_err());
        assert!(validate_currency_code("currency", "USDT").is_err());
        assert!(validate_currency_code("currency", "").is_err());
    }

    #[test]
    fn validates_positive_amount() {
        assert!(validate_positive_amount("amount", &dec("1.23")).is_ok());
        assert!(validate_positive_amount("amount", &dec("0")).is_err());
        assert!(validate_positive_amount("amount", &dec("-1")).is_err());
        assert!(validate_positive_amount("amount", &dec("1.234")).is_err());
    }

    #[test]
    fn rejects_unbounded_exponents_without_expanding() {
        let started = std::time::Instant::now();

        for raw in ["1e900000000", "-1e900000000", "0e900000000", "1e-900000000"] {
            let huge: BigDecimal = serde_json::from_value(serde_json::json!(raw)).unwrap();
            assert!(validate_money_magnitude("amount", &huge).is_err(), "{}", raw);
            assert!(validate_positive_amount("amount", &huge).is_err(), "{}", raw);
            assert!(validate_fee_percentage(&huge).is_err(), "{}", raw);
        }

        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn money_magnitude_matches_column_size() {
        assert!(validate_money_magnitude("amount", &dec("9999999999999999.99")).is_ok());
        assert!(validate_money_magnitude("amount", &dec("10000000000000000")).is_err());
        assert!(validate_money_magnitude("amount", &dec("1e16")).is_err());
        assert!(validate_money_magnitude("amount", &dec("5e3")).is_ok());
        assert!(validate_money_magnitude("amount", &dec("0.000000000000000001")).is_ok());
        assert!(validate_money_magnitude("amount", &dec("0.0000000000000000001")).is_err());
        assert!(validate_money_magnitude("amount", &dec("0")).is_ok());
    }

    #[test]
    fn validates_fee_percentage_range() {
        assert!(validate_fee_percentage(&dec("0")).is_ok());
        assert!(validate_fee_percentage(&dec("2.5")).is_ok());
        assert!(validate_fee_percentage(&dec("100")).is_ok());
        assert!(validate_fee_percentage(&dec("100.01")).is_err());
        assert!(validate_fee_percentage(&dec("-0.5")).is_err());
    }

    #[test]
    fn validates_amount_bounds() {
        assert!(validate_amount_bounds(&dec("100"), &dec("5000")).is_ok());
        assert!(validate_amount_bounds(&dec("100"), &dec("100")).is_ok());
        let err = validate_amount_bounds(&dec("500"), &dec("100")).unwrap_err();
        assert_eq!(err.field, "max_amount");
        assert!(validate_amount_bounds(&dec("0"), &dec("100")).is_err());
    }
}
