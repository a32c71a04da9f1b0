//! Money Conversion Module
//!
//! Unified conversion between the internal minor-unit representation and the
//! client-facing string/Decimal representation. All conversions MUST go
//! through this module.
//!
//! ## Internal Representation
//! - All amounts are stored as `u64` minor units
//! - The scale factor is `10^decimals` (e.g., 10^2 for a cent-based ledger)
//! - The decimal count comes from `AppConfig.asset_decimals`
//!
//! Amounts are strictly positive: zero and negative inputs are rejected at
//! parse time, never silently truncated.

use rust_decimal::prelude::*;
use std::str::FromStr;
use thiserror::Error;

/// Money conversion errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Convert a client amount string to internal minor units.
///
/// # Errors
/// * `PrecisionOverflow` - input has more decimal places than allowed
/// * `InvalidAmount` - amount is zero or negative
/// * `Overflow` - result would overflow u64
/// * `InvalidFormat` - string is not a decimal number
pub fn parse_amount(amount_str: &str, decimals: u32) -> Result<u64, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    // Reject explicit signs up front; "-1" must not reach the Decimal parser
    // and come back as a negative we have to special-case everywhere.
    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let decimal = Decimal::from_str(amount_str)
        .map_err(|e| MoneyError::InvalidFormat(e.to_string()))?;

    parse_decimal(decimal, decimals)
}

/// Convert a `Decimal` to internal minor units.
///
/// Used at API boundaries where `rust_decimal::Decimal` is the JSON
/// deserialization target.
pub fn parse_decimal(decimal: Decimal, decimals: u32) -> Result<u64, MoneyError> {
    if decimal.is_sign_negative() || decimal.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }

    let normalized = decimal.normalize();
    if normalized.scale() > decimals {
        return Err(MoneyError::PrecisionOverflow {
            provided: normalized.scale(),
            max: decimals,
        });
    }

    let multiplier = Decimal::from(10u64.pow(decimals));
    let scaled = normalized
        .checked_mul(multiplier)
        .ok_or(MoneyError::Overflow)?;

    // Scale check above guarantees no fractional remainder here.
    scaled.to_u64().ok_or(MoneyError::Overflow)
}

/// Convert internal minor units to a full-precision display string.
pub fn format_amount(value: u64, decimals: u32) -> String {
    let decimal_value = Decimal::from(value) / Decimal::from(10u64.pow(decimals));
    format!("{:.prec$}", decimal_value, prec = decimals as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1.5", 2).unwrap(), 150);
        assert_eq!(parse_amount("100", 2).unwrap(), 10_000);
        assert_eq!(parse_amount("0.01", 2).unwrap(), 1);
        assert_eq!(parse_amount(" 42.00 ", 2).unwrap(), 4_200);
    }

    #[test]
    fn test_parse_amount_rejects_non_positive() {
        assert_eq!(parse_amount("0", 2), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_amount("0.00", 2), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_amount("-1", 2), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_amount("+1", 2), Err(MoneyError::InvalidAmount));
    }

    #[test]
    fn test_parse_amount_precision() {
        assert!(matches!(
            parse_amount("1.234", 2),
            Err(MoneyError::PrecisionOverflow { provided: 3, max: 2 })
        ));
        // Trailing zeros beyond the scale are not an error
        assert_eq!(parse_amount("1.2300", 2).unwrap(), 123);
    }

    #[test]
    fn test_parse_amount_invalid_format() {
        assert!(matches!(
            parse_amount("abc", 2),
            Err(MoneyError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_amount("", 2),
            Err(MoneyError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(150, 2), "1.50");
        assert_eq!(format_amount(1, 2), "0.01");
        assert_eq!(format_amount(0, 2), "0.00");
        assert_eq!(format_amount(10_000, 2), "100.00");
    }

    #[test]
    fn test_roundtrip() {
        let value = parse_amount("123.45", 2).unwrap();
        assert_eq!(format_amount(value, 2), "123.45");
    }
}
