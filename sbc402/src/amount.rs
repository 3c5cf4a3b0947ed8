//! Token amounts.
//!
//! Amounts travel on the wire as decimal strings of atomic units. Human
//! readable prices (e.g., a USD budget of `"0.01"`) are converted with
//! [`to_atomic_units`] at the target network's precision. The conversion is
//! purely textual so it never loses precision for 18-decimal tokens.

use alloy_primitives::U256;
use std::cmp::Ordering;

/// Errors from parsing or converting amounts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The input is not a non-negative decimal number.
    #[error("Invalid decimal amount '{0}'")]
    InvalidDecimal(String),
    /// The input is not a non-negative integer in atomic units.
    #[error("Invalid atomic amount '{0}'")]
    InvalidAtomic(String),
}

/// Converts a decimal string into atomic units at `decimals` precision.
///
/// The fractional part is truncated or right-padded to `decimals` digits,
/// joined with the integer part and stripped of leading zeros. An all-zero
/// result is `"0"`.
///
/// ```
/// use sbc402::amount::to_atomic_units;
///
/// assert_eq!(to_atomic_units("0.001", 18).unwrap(), "1000000000000000");
/// assert_eq!(to_atomic_units("1.0", 9).unwrap(), "1000000000");
/// ```
///
/// # Errors
///
/// Returns [`AmountError::InvalidDecimal`] when the input has a sign, more
/// than one decimal point or any non-digit character.
pub fn to_atomic_units(amount: &str, decimals: u8) -> Result<String, AmountError> {
    let trimmed = amount.trim();
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(AmountError::InvalidDecimal(amount.to_owned()));
    }

    let precision = usize::from(decimals);
    let mut digits = String::with_capacity(whole.len() + precision);
    digits.push_str(whole);
    if fraction.len() >= precision {
        digits.push_str(&fraction[..precision]);
    } else {
        digits.push_str(fraction);
        digits.extend(std::iter::repeat_n('0', precision - fraction.len()));
    }

    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() {
        Ok("0".to_owned())
    } else {
        Ok(stripped.to_owned())
    }
}

/// Parses an atomic amount string into a [`U256`].
///
/// # Errors
///
/// Returns [`AmountError::InvalidAtomic`] if the input is not a decimal
/// integer that fits in 256 bits.
pub fn parse_atomic(amount: &str) -> Result<U256, AmountError> {
    U256::from_str_radix(amount.trim(), 10).map_err(|_| AmountError::InvalidAtomic(amount.to_owned()))
}

/// Compares two atomic amount strings numerically.
///
/// Unparseable amounts order after every valid amount so they never win a
/// "cheapest" comparison.
#[must_use]
pub fn compare_atomic(a: &str, b: &str) -> Ordering {
    match (parse_atomic(a), parse_atomic(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => Ordering::Equal,
    }
}
