//! # Numeric Value Decoder
//!
//! Ledger integers to fixed-point decimal strings at scale 10^7, and user
//! input back into base units.
//!
//! 128-bit words are combined with native `i128`/`u128` arithmetic, which is
//! exact over the whole wire range.

use crate::domain::{
    DomainErrorCode, QueryOutcome, WalletError, WireValue, AMOUNT_DECIMALS, AMOUNT_SCALE,
};

/// Ledger error fragments that mean "this entry was never written".
const ENTRY_ABSENT_PATTERNS: [&str; 4] = [
    "not found",
    "missing entry",
    "entry does not exist",
    "does not exist",
];

/// Decode a contract value into a decimal balance string.
pub fn decode_balance(value: &WireValue) -> Result<String, WalletError> {
    let (negative, magnitude) = match *value {
        WireValue::I128 { hi, lo } => {
            let combined = ((hi as i128) << 64) | lo as i128;
            (combined < 0, combined.unsigned_abs())
        }
        WireValue::U128 { hi, lo } => (false, ((hi as u128) << 64) | lo as u128),
        WireValue::I64(v) => (v < 0, v.unsigned_abs() as u128),
        WireValue::U64(v) => (false, v as u128),
        WireValue::I32(v) => (v < 0, v.unsigned_abs() as u128),
        WireValue::U32(v) => (false, v as u128),
        WireValue::Void => (false, 0),
        ref other => {
            return Err(WalletError::UnexpectedValueType(format!(
                "cannot decode a {} value as a balance",
                other.tag()
            )))
        }
    };
    Ok(format_base_units(negative, magnitude))
}

/// Render `magnitude` base units as a decimal, trailing fractional zeros
/// stripped. Zero is never signed.
pub fn format_base_units(negative: bool, magnitude: u128) -> String {
    let whole = magnitude / AMOUNT_SCALE;
    let fraction = magnitude % AMOUNT_SCALE;
    let sign = if negative && magnitude != 0 { "-" } else { "" };

    if fraction == 0 {
        return format!("{sign}{whole}");
    }

    let digits = format!("{:0width$}", fraction, width = AMOUNT_DECIMALS as usize);
    format!("{sign}{whole}.{}", digits.trim_end_matches('0'))
}

/// Parse a user-entered amount into base units.
///
/// Accepts plain positive decimals with at most 7 fractional digits.
pub fn parse_amount(text: &str) -> Result<i128, WalletError> {
    let invalid = |reason: &str| {
        WalletError::validation(
            DomainErrorCode::InvalidAmount,
            format!("Invalid amount '{text}': {reason}"),
        )
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("no digits"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid("not a positive decimal number"));
    }
    if fraction.len() > AMOUNT_DECIMALS as usize {
        return Err(invalid("too many decimal places"));
    }

    let whole_units: i128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("out of range"))?
    };
    let padded = format!("{:0<width$}", fraction, width = AMOUNT_DECIMALS as usize);
    let fraction_units: i128 = padded.parse().map_err(|_| invalid("out of range"))?;

    let units = whole_units
        .checked_mul(AMOUNT_SCALE as i128)
        .and_then(|v| v.checked_add(fraction_units))
        .ok_or_else(|| invalid("out of range"))?;

    if units == 0 {
        return Err(invalid("must be greater than zero"));
    }
    Ok(units)
}

/// Whether a failed read means the entry is absent.
pub fn classify_query_failure(error: &WalletError) -> QueryOutcome {
    match error {
        WalletError::Ledger(message) if is_entry_absent_message(message) => {
            QueryOutcome::EntryAbsent
        }
        _ => QueryOutcome::Failed,
    }
}

fn is_entry_absent_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    ENTRY_ABSENT_PATTERNS.iter().any(|p| lower.contains(p))
}
