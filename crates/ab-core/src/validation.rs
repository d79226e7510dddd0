//! # Field Validation
//!
//! Write-time checks shared by every path that persists an ad. Mirrors the
//! column definition `price DECIMAL(10, 2) CHECK (price > 0)`.

use std::str::FromStr;

use rust_decimal::Decimal;
use validator::ValidationError;

use crate::error::{AppError, Result};

/// Total significant digits a price may carry.
pub const PRICE_MAX_DIGITS: u32 = 10;
/// Fraction digits a price may carry.
pub const PRICE_DECIMAL_PLACES: u32 = 2;

/// Rejects prices that are not strictly positive or do not fit `DECIMAL(10, 2)`.
pub fn validate_price(value: &Decimal) -> Result<()> {
    if *value <= Decimal::ZERO {
        return Err(AppError::validation("Price must be greater than 0"));
    }
    if value.normalize().scale() > PRICE_DECIMAL_PLACES {
        return Err(AppError::validation(format!(
            "Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."
        )));
    }
    let whole_digit_limit = Decimal::from(10_i64.pow(PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES));
    if value.trunc() >= whole_digit_limit {
        return Err(AppError::validation(format!(
            "Ensure that there are no more than {PRICE_MAX_DIGITS} digits in total."
        )));
    }
    Ok(())
}

/// Parses a user-supplied price and validates it.
/// The returned value always has a scale of two (`"5"` becomes `5.00`).
pub fn parse_price(raw: &str) -> Result<Decimal> {
    let mut value = Decimal::from_str(raw.trim())
        .map_err(|_| AppError::validation("Invalid price: must be a number."))?;
    validate_price(&value)?;
    value.rescale(PRICE_DECIMAL_PLACES);
    Ok(value)
}

/// Accepts a JSON number or numeric string; anything else is not a price.
pub fn price_from_json(raw: &serde_json::Value) -> Result<Decimal> {
    match raw {
        serde_json::Value::Number(n) => parse_price(&n.to_string()),
        serde_json::Value::String(s) => parse_price(s),
        _ => Err(AppError::validation("Invalid price: must be a number.")),
    }
}

/// `validator` hook for required text fields.
pub fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("This field may not be blank.".into());
        return Err(err);
    }
    Ok(())
}
