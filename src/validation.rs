use chrono::{DateTime, Utc};
use thiserror::Error;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid Sui address format: {0}")]
    InvalidAddress(String),

    #[error("Invalid transaction digest: {0}")]
    InvalidDigest(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// `0x` followed by 1 to 64 hex digits.
pub fn validate_sui_address(address: &str) -> Result<(), ValidationError> {
    if address.trim().is_empty() {
        return Err(ValidationError::MissingParameter("address".to_string()));
    }

    let hex = address
        .strip_prefix("0x")
        .ok_or_else(|| ValidationError::InvalidAddress(address.to_string()))?;

    if hex.is_empty() || hex.len() > 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidAddress(address.to_string()));
    }

    Ok(())
}

/// Transaction and checkpoint digests are base58-encoded 32-byte hashes.
pub fn validate_digest(digest: &str) -> Result<(), ValidationError> {
    if digest.trim().is_empty() {
        return Err(ValidationError::MissingParameter("digest".to_string()));
    }

    let decoded = bs58::decode(digest)
        .into_vec()
        .map_err(|_| ValidationError::InvalidDigest(digest.to_string()))?;

    if decoded.len() != 32 {
        return Err(ValidationError::InvalidDigest(digest.to_string()));
    }

    Ok(())
}

pub fn validate_offset(offset: Option<i64>) -> Result<i64, ValidationError> {
    match offset {
        None => Ok(0),
        Some(o) if o >= 0 => Ok(o),
        Some(o) => Err(ValidationError::InvalidParameter(format!(
            "offset must be non-negative, got {}",
            o
        ))),
    }
}

pub fn validate_limit(limit: Option<i64>) -> Result<i64, ValidationError> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(l) if (1..=MAX_LIMIT).contains(&l) => Ok(l),
        Some(l) => Err(ValidationError::InvalidParameter(format!(
            "limit must be between 1 and {}, got {}",
            MAX_LIMIT, l
        ))),
    }
}

/// Accepts Unix milliseconds or an RFC 3339 timestamp.
pub fn validate_timestamp(name: &str, value: &str) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(ms) = value.parse::<i64>() {
        return DateTime::<Utc>::from_timestamp_millis(ms)
            .ok_or_else(|| ValidationError::InvalidParameter(format!("{} out of range", name)));
    }

    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidParameter(format!("{} is not a valid timestamp", name)))
}

pub fn validate_time_range(
    start: &str,
    end: &str,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ValidationError> {
    let start = validate_timestamp("start", start)?;
    let end = validate_timestamp("end", end)?;

    if start >= end {
        return Err(ValidationError::InvalidParameter(
            "start must be earlier than end".to_string(),
        ));
    }

    Ok((start, end))
}
