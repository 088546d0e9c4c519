//! Smallest-unit currency math.
//!
//! Budget caps are configured as human decimal strings ("5.00") and offers
//! arrive as smallest-unit strings ("10000"). Both convert to `U256` here;
//! no floating point ever touches money.

use alloy_primitives::U256;

use crate::error::{BudgetError, Result};

/// Decimal places of the supported stablecoin (USDC).
pub const USDC_DECIMALS: u32 = 6;

/// Parse a human decimal string ("5.00") into smallest units.
pub fn parse_decimal(value: &str, decimals: u32) -> Result<U256> {
    let value = value.trim();
    let invalid = |reason: &str| BudgetError::InvalidAmount {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if value.is_empty() {
        return Err(invalid("empty string"));
    }
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("no digits"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("non-digit character"));
    }
    if frac.len() as u32 > decimals {
        return Err(invalid("too many decimal places"));
    }

    let scale = U256::from(10u64).pow(U256::from(decimals));
    let whole_units = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).map_err(|_| invalid("whole part out of range"))?
    };

    let mut frac_padded = frac.to_string();
    while (frac_padded.len() as u32) < decimals {
        frac_padded.push('0');
    }
    let frac_units = if frac_padded.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(&frac_padded, 10).map_err(|_| invalid("fraction out of range"))?
    };

    whole_units
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(|| invalid("amount overflows"))
}

/// Parse a smallest-unit integer string ("10000") as it appears on the wire.
pub fn parse_units(value: &str) -> Result<U256> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(BudgetError::InvalidAmount {
            value: value.to_string(),
            reason: "expected an unsigned integer".to_string(),
        });
    }
    U256::from_str_radix(value, 10).map_err(|_| BudgetError::InvalidAmount {
        value: value.to_string(),
        reason: "out of range".to_string(),
    })
}

/// Render smallest units as a human decimal string with trailing zeros trimmed.
pub fn format_units(units: U256, decimals: u32) -> String {
    let scale = U256::from(10u64).pow(U256::from(decimals));
    let whole = units / scale;
    let frac = units % scale;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac_str = format!("{:0>width$}", frac, width = decimals as usize);
    let trimmed = frac_str.trim_end_matches('0');
    format!("{}.{}", whole, trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_basic() {
        assert_eq!(parse_decimal("5.00", 6).unwrap(), U256::from(5_000_000u64));
        assert_eq!(parse_decimal("0.01", 6).unwrap(), U256::from(10_000u64));
        assert_eq!(parse_decimal("1", 6).unwrap(), U256::from(1_000_000u64));
        assert_eq!(parse_decimal(".5", 6).unwrap(), U256::from(500_000u64));
        assert_eq!(parse_decimal("0.000001", 6).unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert!(parse_decimal("", 6).is_err());
        assert!(parse_decimal(".", 6).is_err());
        assert!(parse_decimal("-1", 6).is_err());
        assert!(parse_decimal("1.2.3", 6).is_err());
        assert!(parse_decimal("1e6", 6).is_err());
        assert!(parse_decimal("0.0000001", 6).is_err()); // 7 places
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("10000").unwrap(), U256::from(10_000u64));
        assert!(parse_units("10.5").is_err());
        assert!(parse_units("-3").is_err());
        assert!(parse_units("").is_err());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(5_000_000u64), 6), "5");
        assert_eq!(format_units(U256::from(10_000u64), 6), "0.01");
        assert_eq!(format_units(U256::from(1u64), 6), "0.000001");
        assert_eq!(format_units(U256::ZERO, 6), "0");
    }

    #[test]
    fn test_roundtrip() {
        for s in ["0.01", "5", "123.456789"] {
            let units = parse_decimal(s, 6).unwrap();
            assert_eq!(parse_decimal(&format_units(units, 6), 6).unwrap(), units);
        }
    }
}
