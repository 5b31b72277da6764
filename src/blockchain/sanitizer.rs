//! Cleans arbitrary chain JSON so it can be stored in a text/JSON column.
//!
//! Strings lose escape-sequence text (`\uXXXX`, `\xXX`, `\NNN`, `\b` and
//! friends) and raw control characters. The whole cleaned value is then
//! serialized and parsed back before it is handed to the caller.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

pub const MAX_DEPTH: usize = 64;
pub const MAX_COLLECTION_LEN: usize = 100_000;

#[derive(Error, Debug)]
pub enum SanitizeError {
    #[error("payload nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("collection with {0} entries exceeds the limit of {MAX_COLLECTION_LEN}")]
    TooLarge(usize),

    #[error("round trip failed: {0}")]
    RoundTrip(#[from] serde_json::Error),
}

/// Sanitize `value`, returning an error instead of panicking on pathological
/// input.
pub fn sanitize(value: &Value) -> Result<Value, SanitizeError> {
    let cleaned = sanitize_value(value, 0)?;
    let text = serde_json::to_string(&cleaned)?;
    Ok(serde_json::from_str(&text)?)
}

/// Like [`sanitize`], but logs the failure and yields `None` so the caller can
/// store `null` instead.
pub fn sanitize_for_storage(value: &Value, network: &str) -> Option<Value> {
    match sanitize(value) {
        Ok(clean) => Some(clean),
        Err(e) => {
            warn!("[{}] Payload sanitization failed, storing null: {}", network, e);
            None
        }
    }
}

pub fn sanitize_optional(value: Option<&Value>, network: &str) -> Option<Value> {
    value.and_then(|v| sanitize_for_storage(v, network))
}

fn sanitize_value(value: &Value, depth: usize) -> Result<Value, SanitizeError> {
    if depth > MAX_DEPTH {
        return Err(SanitizeError::TooDeep(MAX_DEPTH));
    }

    match value {
        Value::String(s) => Ok(Value::String(sanitize_str(s))),
        Value::Array(items) => {
            if items.len() > MAX_COLLECTION_LEN {
                return Err(SanitizeError::TooLarge(items.len()));
            }
            items
                .iter()
                .map(|item| sanitize_value(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        Value::Object(fields) => {
            if fields.len() > MAX_COLLECTION_LEN {
                return Err(SanitizeError::TooLarge(fields.len()));
            }
            let mut out = Map::with_capacity(fields.len());
            for (key, field) in fields {
                out.insert(sanitize_str(key), sanitize_value(field, depth + 1)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

/// Strip escape text and control characters in one pass. Removing a
/// sequence can splice together a new one (`\u00\u0041BC` leaves `\u00BC`),
/// so the output tail is re-checked after every push. The result contains no
/// strippable sequence, which makes the function idempotent.
pub fn sanitize_str(input: &str) -> String {
    let mut out: Vec<char> = Vec::with_capacity(input.len());

    for c in input.chars() {
        if is_control(c) {
            continue;
        }
        out.push(c);
        if let Some(len) = escape_at_tail(&out) {
            out.truncate(out.len() - len);
        }
    }

    out.into_iter().collect()
}

fn is_control(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
}

/// Length of a complete escape sequence ending at the last char of `out`.
/// At most one candidate can match: the longer forms hold no backslash after
/// their first char.
fn escape_at_tail(out: &[char]) -> Option<usize> {
    // `\b`, `\xHH` or `\NNN`, `\uHHHH`
    [2, 4, 6].into_iter().find(|&len| {
        out.len() >= len
            && out[out.len() - len] == '\\'
            && escape_len(&out[out.len() - len + 1..]) == len - 1
    })
}

/// Length of the escape body following a backslash, or 0 when the backslash
/// does not start a sequence we strip.
fn escape_len(rest: &[char]) -> usize {
    let hex_run = |n: usize| rest.len() > n && rest[1..=n].iter().all(|c| c.is_ascii_hexdigit());

    match rest.first() {
        Some('u') if hex_run(4) => 5,
        Some('x') if hex_run(2) => 3,
        Some(c) if c.is_digit(8) => {
            if rest.len() >= 3 && rest[..3].iter().all(|c| c.is_digit(8)) {
                3
            } else {
                0
            }
        }
        Some('b' | 'f' | 'n' | 'r' | 't' | 'v') => 1,
        _ => 0,
    }
}
