use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{Pool, Row, Sqlite};

use crate::db::{insert_outcome, now_millis, to_millis, InsertOutcome};
use crate::models::{datetime_from_millis, Block, BlockStats, NewBlock};

const BLOCK_COLUMNS: &str = "id, block_number, block_hash, timestamp, transaction_count, \
     total_gas_used, total_gas_cost, block_data, created_at";

fn block_from_row(row: &SqliteRow) -> Block {
    Block {
        id: row.get("id"),
        block_number: row.get("block_number"),
        block_hash: row.get("block_hash"),
        timestamp: datetime_from_millis(row.get("timestamp")),
        transaction_count: row.get("transaction_count"),
        total_gas_used: row.get("total_gas_used"),
        total_gas_cost: row.get("total_gas_cost"),
        block_data: row
            .get::<Option<Json<Value>>, _>("block_data")
            .map(|Json(v)| v),
        created_at: datetime_from_millis(row.get("created_at")),
    }
}

/// Insert a block; a duplicate number or hash yields `AlreadyExists`.
pub async fn insert_block(pool: &Pool<Sqlite>, block: &NewBlock) -> Result<InsertOutcome, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO blocks
         (block_number, block_hash, timestamp, transaction_count, total_gas_used, total_gas_cost, block_data, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(block.block_number)
    .bind(&block.block_hash)
    .bind(block.timestamp_ms)
    .bind(block.transaction_count)
    .bind(&block.total_gas_used)
    .bind(&block.total_gas_cost)
    .bind(block.block_data.as_ref().map(Json))
    .bind(now_millis())
    .execute(pool)
    .await;

    insert_outcome(result)
}

pub async fn block_exists(pool: &Pool<Sqlite>, block_number: i64) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM blocks WHERE block_number = ?")
        .bind(block_number)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

/// Highest persisted block number, if any.
pub async fn get_max_block_number(pool: &Pool<Sqlite>) -> Result<Option<i64>, sqlx::Error> {
    let max = sqlx::query("SELECT MAX(block_number) AS max_number FROM blocks")
        .fetch_one(pool)
        .await?
        .get::<Option<i64>, _>("max_number");

    Ok(max)
}

pub async fn get_block_by_number(pool: &Pool<Sqlite>, block_number: i64) -> Result<Option<Block>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {} FROM blocks WHERE block_number = ?", BLOCK_COLUMNS))
        .bind(block_number)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(block_from_row))
}

pub async fn get_block_by_hash(pool: &Pool<Sqlite>, block_hash: &str) -> Result<Option<Block>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {} FROM blocks WHERE block_hash = ?", BLOCK_COLUMNS))
        .bind(block_hash)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(block_from_row))
}

pub async fn get_latest_blocks(pool: &Pool<Sqlite>, limit: i64) -> Result<Vec<Block>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM blocks ORDER BY block_number DESC LIMIT ?",
        BLOCK_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(block_from_row).collect())
}

/// Page of blocks, newest first, with the total row count.
pub async fn list_blocks(
    pool: &Pool<Sqlite>,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Block>, i64), sqlx::Error> {
    let total = count_blocks(pool).await?;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM blocks ORDER BY block_number DESC LIMIT ? OFFSET ?",
        BLOCK_COLUMNS
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((rows.iter().map(block_from_row).collect(), total))
}

/// Blocks with `start <= timestamp < end`, oldest first.
pub async fn get_blocks_by_time_range(
    pool: &Pool<Sqlite>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Block>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM blocks WHERE timestamp >= ? AND timestamp < ? ORDER BY timestamp ASC",
        BLOCK_COLUMNS
    ))
    .bind(to_millis(&start))
    .bind(to_millis(&end))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(block_from_row).collect())
}

pub async fn count_blocks(pool: &Pool<Sqlite>) -> Result<i64, sqlx::Error> {
    let count = sqlx::query("SELECT COUNT(*) FROM blocks")
        .fetch_one(pool)
        .await?
        .get::<i64, _>(0);

    Ok(count)
}

pub async fn get_block_stats(pool: &Pool<Sqlite>) -> Result<BlockStats, sqlx::Error> {
    let start_of_day = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0);

    let row = sqlx::query(
        "SELECT
            COUNT(*) AS total_blocks,
            COALESCE(SUM(CASE WHEN timestamp >= ? THEN 1 ELSE 0 END), 0) AS today_blocks,
            CAST(COALESCE(SUM(CAST(total_gas_used AS INTEGER)), 0) AS TEXT) AS total_gas_used,
            CAST(COALESCE(SUM(CAST(total_gas_cost AS INTEGER)), 0) AS TEXT) AS total_gas_cost
         FROM blocks",
    )
    .bind(start_of_day)
    .fetch_one(pool)
    .await?;

    Ok(BlockStats {
        total_blocks: row.get("total_blocks"),
        today_blocks: row.get("today_blocks"),
        total_gas_used: row.get("total_gas_used"),
        total_gas_cost: row.get("total_gas_cost"),
    })
}
