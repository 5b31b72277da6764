use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{Pool, Row, Sqlite};

use crate::db::{insert_outcome, now_millis, to_millis, InsertOutcome};
use crate::models::{datetime_from_millis, NewRawTransactionResponse, ProcessingMetadata, RawTransactionResponse};

const RESPONSE_COLUMNS: &str = "id, digest, block_number, timestamp, transaction_data, effects, events, \
     object_changes, balance_changes, checkpoint, timestamp_ms, confirmed_local_execution, \
     raw_response, metadata, created_at";

fn json_column(row: &SqliteRow, column: &str) -> Option<Value> {
    row.get::<Option<Json<Value>>, _>(column).map(|Json(v)| v)
}

fn response_from_row(row: &SqliteRow) -> RawTransactionResponse {
    RawTransactionResponse {
        id: row.get("id"),
        digest: row.get("digest"),
        block_number: row.get("block_number"),
        timestamp: datetime_from_millis(row.get("timestamp")),
        transaction: json_column(row, "transaction_data"),
        effects: json_column(row, "effects"),
        events: json_column(row, "events"),
        object_changes: json_column(row, "object_changes"),
        balance_changes: json_column(row, "balance_changes"),
        checkpoint: row.get("checkpoint"),
        timestamp_ms: row.get("timestamp_ms"),
        confirmed_local_execution: row.get("confirmed_local_execution"),
        raw_response: json_column(row, "raw_response"),
        metadata: row
            .get::<Option<Json<ProcessingMetadata>>, _>("metadata")
            .map(|Json(m)| m),
        created_at: datetime_from_millis(row.get("created_at")),
    }
}

pub async fn insert_response(
    pool: &Pool<Sqlite>,
    response: &NewRawTransactionResponse,
) -> Result<InsertOutcome, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO transaction_responses
         (digest, block_number, timestamp, transaction_data, effects, events, object_changes,
          balance_changes, checkpoint, timestamp_ms, confirmed_local_execution, raw_response,
          metadata, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&response.digest)
    .bind(response.block_number)
    .bind(response.timestamp_ms)
    .bind(response.transaction.as_ref().map(Json))
    .bind(response.effects.as_ref().map(Json))
    .bind(response.events.as_ref().map(Json))
    .bind(response.object_changes.as_ref().map(Json))
    .bind(response.balance_changes.as_ref().map(Json))
    .bind(&response.checkpoint)
    .bind(&response.timestamp_ms_raw)
    .bind(response.confirmed_local_execution)
    .bind(response.raw_response.as_ref().map(Json))
    .bind(Json(&response.metadata))
    .bind(now_millis())
    .execute(pool)
    .await;

    insert_outcome(result)
}

pub async fn response_exists(pool: &Pool<Sqlite>, digest: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM transaction_responses WHERE digest = ?")
        .bind(digest)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

pub async fn get_response_by_digest(
    pool: &Pool<Sqlite>,
    digest: &str,
) -> Result<Option<RawTransactionResponse>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM transaction_responses WHERE digest = ?",
        RESPONSE_COLUMNS
    ))
    .bind(digest)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(response_from_row))
}

pub async fn get_responses_by_block(
    pool: &Pool<Sqlite>,
    block_number: i64,
) -> Result<Vec<RawTransactionResponse>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM transaction_responses WHERE block_number = ? ORDER BY id ASC",
        RESPONSE_COLUMNS
    ))
    .bind(block_number)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(response_from_row).collect())
}

/// Page of responses, newest first, with the total row count.
pub async fn list_responses(
    pool: &Pool<Sqlite>,
    offset: i64,
    limit: i64,
) -> Result<(Vec<RawTransactionResponse>, i64), sqlx::Error> {
    let total = count_responses(pool).await?;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM transaction_responses ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
        RESPONSE_COLUMNS
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((rows.iter().map(response_from_row).collect(), total))
}

pub async fn get_responses_by_time_range(
    pool: &Pool<Sqlite>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<RawTransactionResponse>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM transaction_responses WHERE timestamp >= ? AND timestamp < ? ORDER BY timestamp ASC",
        RESPONSE_COLUMNS
    ))
    .bind(to_millis(&start))
    .bind(to_millis(&end))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(response_from_row).collect())
}

pub async fn count_responses(pool: &Pool<Sqlite>) -> Result<i64, sqlx::Error> {
    let count = sqlx::query("SELECT COUNT(*) FROM transaction_responses")
        .fetch_one(pool)
        .await?
        .get::<i64, _>(0);

    Ok(count)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStatistics {
    pub total: i64,
    pub latest_timestamp: Option<DateTime<Utc>>,
    pub average_per_day: i64,
}

pub async fn get_response_statistics(pool: &Pool<Sqlite>) -> Result<ResponseStatistics, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total, MAX(timestamp) AS latest,
                COUNT(DISTINCT date(timestamp / 1000, 'unixepoch')) AS days
         FROM transaction_responses",
    )
    .fetch_one(pool)
    .await?;

    let total: i64 = row.get("total");
    let days: i64 = row.get("days");
    let average_per_day = if days == 0 {
        0
    } else {
        (total as f64 / days as f64).round() as i64
    };

    Ok(ResponseStatistics {
        total,
        latest_timestamp: row.get::<Option<i64>, _>("latest").map(datetime_from_millis),
        average_per_day,
    })
}

/// Delete responses older than `days_to_keep` days.
pub async fn delete_older_than(pool: &Pool<Sqlite>, days_to_keep: i64) -> Result<u64, sqlx::Error> {
    let cutoff = Utc::now() - Duration::days(days_to_keep);

    let result = sqlx::query("DELETE FROM transaction_responses WHERE timestamp < ?")
        .bind(to_millis(&cutoff))
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
