//! Human-readable size strings: `"500M"`, `"2G"`, `"1024"`.
//!
//! The accepted grammar is `[0-9]+(\.[0-9]+)?[KkMmGg]?[Bb]?` with optional
//! surrounding whitespace. Multipliers are 1024-based; a bare number is raw
//! bytes. Anything else is a configuration error, the only fatal error the
//! retention engine knows.

use thiserror::Error;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SizeError {
    #[error("empty size string")]
    Empty,
    #[error("invalid size format: {0:?}")]
    Invalid(String),
}

/// Parse a size budget string into bytes.
///
/// A trailing `b`/`B` is ignored (`"1KB"` == `"1K"`), fractional values
/// truncate toward zero (`"1.5K"` == 1536, `"1.5"` == 1).
pub fn parse_size(input: &str) -> Result<u64, SizeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SizeError::Empty);
    }
    let lower = trimmed.to_ascii_lowercase();
    let body = lower.strip_suffix('b').unwrap_or(&lower);
    let (number, multiplier) = match body.as_bytes().last() {
        Some(b'k') => (&body[..body.len() - 1], KIB),
        Some(b'm') => (&body[..body.len() - 1], MIB),
        Some(b'g') => (&body[..body.len() - 1], GIB),
        _ => (body, 1),
    };
    if !is_decimal(number) {
        return Err(SizeError::Invalid(trimmed.to_string()));
    }
    let value: f64 = number
        .parse()
        .map_err(|_| SizeError::Invalid(trimmed.to_string()))?;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let bytes = (value * multiplier as f64) as u64;
    Ok(bytes)
}

// Strict `[0-9]+(\.[0-9]+)?` check so exponent/sign/infinity forms that the
// float parser would accept stay rejected.
fn is_decimal(s: &str) -> bool {
    fn digits(part: &str) -> bool {
        !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
    }
    match s.split_once('.') {
        Some((int_part, frac_part)) => digits(int_part) && digits(frac_part),
        None => digits(s),
    }
}

/// Render bytes the way the capture tooling does: one decimal for K/M/G,
/// plain bytes below 1K.
pub fn format_size(bytes: u64) -> String {
    let value = bytes as f64;
    if bytes >= GIB {
        format!("{:.1}G", value / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1}M", value / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1}K", value / KIB as f64)
    } else {
        format!("{bytes}B")
    }
}
