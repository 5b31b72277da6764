// Legacy `transactions` projection: one lightweight row per digest.

use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{Executor, Pool, Row, Sqlite};

use crate::db::{insert_outcome, now_millis, to_millis, InsertOutcome};
use crate::models::{datetime_from_millis, Transaction};

const INSERT_SQL: &str = "INSERT INTO transactions
    (digest, block_number, timestamp, sender, status, gas_used, gas_price, gas_cost,
     transaction_type, effects, events, arguments, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

fn transaction_from_row(row: &SqliteRow) -> Transaction {
    let json = |column: &str| row.get::<Option<Json<Value>>, _>(column).map(|Json(v)| v);

    Transaction {
        digest: row.get("digest"),
        block_number: row.get("block_number"),
        timestamp: datetime_from_millis(row.get("timestamp")),
        sender: row.get("sender"),
        status: row.get("status"),
        gas_used: row.get("gas_used"),
        gas_price: row.get("gas_price"),
        gas_cost: row.get("gas_cost"),
        transaction_type: row.get("transaction_type"),
        effects: json("effects"),
        events: json("events"),
        arguments: json("arguments"),
    }
}

async fn insert<'e, E>(executor: E, transaction: &Transaction, on_conflict_ignore: bool) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = if on_conflict_ignore {
        format!("{} ON CONFLICT(digest) DO NOTHING", INSERT_SQL)
    } else {
        INSERT_SQL.to_string()
    };

    sqlx::query(&sql)
        .bind(&transaction.digest)
        .bind(transaction.block_number)
        .bind(to_millis(&transaction.timestamp))
        .bind(&transaction.sender)
        .bind(&transaction.status)
        .bind(&transaction.gas_used)
        .bind(&transaction.gas_price)
        .bind(&transaction.gas_cost)
        .bind(&transaction.transaction_type)
        .bind(transaction.effects.as_ref().map(Json))
        .bind(transaction.events.as_ref().map(Json))
        .bind(transaction.arguments.as_ref().map(Json))
        .bind(now_millis())
        .execute(executor)
        .await?;

    Ok(())
}

/// Batch insert inside one database transaction; existing digests are skipped.
pub async fn add_transactions(pool: &Pool<Sqlite>, transactions: &[Transaction]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for transaction in transactions {
        insert(&mut *tx, transaction, true).await?;
    }

    tx.commit().await?;

    Ok(())
}

pub async fn add_transaction(pool: &Pool<Sqlite>, transaction: &Transaction) -> Result<InsertOutcome, sqlx::Error> {
    insert_outcome(insert(pool, transaction, false).await)
}

pub async fn transaction_exists(pool: &Pool<Sqlite>, digest: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM transactions WHERE digest = ?")
        .bind(digest)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

pub async fn get_transaction_by_digest(pool: &Pool<Sqlite>, digest: &str) -> Result<Option<Transaction>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT digest, block_number, timestamp, sender, status, gas_used, gas_price, gas_cost,
                transaction_type, effects, events, arguments
         FROM transactions WHERE digest = ?",
    )
    .bind(digest)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(transaction_from_row))
}

pub async fn count_transactions_in_block(pool: &Pool<Sqlite>, block_number: i64) -> Result<i64, sqlx::Error> {
    let count = sqlx::query("SELECT COUNT(*) FROM transactions WHERE block_number = ?")
        .bind(block_number)
        .fetch_one(pool)
        .await?
        .get::<i64, _>(0);

    Ok(count)
}
