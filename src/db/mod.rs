pub mod block;
pub mod connection;
pub mod migration;
pub mod parsed;
pub mod raw_response;
pub mod transaction;
pub mod wallet;

use chrono::{DateTime, Utc};

/// Result of an insert against a table with a natural unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// True when `err` is a UNIQUE / PRIMARY KEY violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

/// Map an insert result onto `InsertOutcome`, swallowing conflicts.
pub(crate) fn insert_outcome<T>(result: Result<T, sqlx::Error>) -> Result<InsertOutcome, sqlx::Error> {
    match result {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::AlreadyExists),
        Err(e) => Err(e),
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}
