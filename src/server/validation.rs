use chrono::NaiveDate;

use crate::server::response::ApiError;
use crate::types::PaymentMethod;

/// Trimmed value of a required text field.
pub fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::bad_request(format!("{field} is required"))),
    }
}

/// Empty strings from form fields count as absent.
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn required_amount(value: Option<f64>, field: &str) -> Result<f64, ApiError> {
    let amount = value.ok_or_else(|| ApiError::bad_request(format!("{field} is required")))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(ApiError::bad_request(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(amount)
}

/// Parses an optional `YYYY-MM-DD` date.
pub fn date(value: Option<&str>, field: &str) -> Result<Option<NaiveDate>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("{field} must be a date in YYYY-MM-DD format"))),
    }
}

/// Defaults to cash when absent.
pub fn payment_method(value: Option<&str>) -> Result<PaymentMethod, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(PaymentMethod::default()),
        Some(v) => v.parse().map_err(|e: crate::error::Error| ApiError::bad_request(e.to_string())),
    }
}
