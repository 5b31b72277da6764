use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashSet;

use crate::db::{insert_outcome, now_millis, to_millis, InsertOutcome};
use crate::models::{
    datetime_from_millis, BalanceChangeInfo, GroupCount, ObjectChangeInfo, ParsedTransaction,
    ParsedTransactionInfo, TokenActivityStats, TokenInfo, TransactionStatistics, TransactionStatus,
};

const PARSED_COLUMNS: &str = "id, digest, block_number, timestamp, sender, recipients, involved_addresses, \
     transaction_type, transaction_kind, module_name, function_name, tokens, balance_changes, \
     object_changes, status, error_message, gas_used, gas_cost, summary, network, created_at";

/// Rows scanned when computing token activity.
const TOKEN_STATS_SCAN_LIMIT: i64 = 1000;

fn parsed_from_row(row: &SqliteRow) -> ParsedTransaction {
    let Json(recipients) = row.get::<Json<Vec<String>>, _>("recipients");
    let Json(involved_addresses) = row.get::<Json<Vec<String>>, _>("involved_addresses");
    let Json(tokens) = row.get::<Json<Vec<TokenInfo>>, _>("tokens");
    let Json(balance_changes) = row.get::<Json<Vec<BalanceChangeInfo>>, _>("balance_changes");
    let Json(object_changes) = row.get::<Json<Vec<ObjectChangeInfo>>, _>("object_changes");

    ParsedTransaction {
        id: row.get("id"),
        info: ParsedTransactionInfo {
            digest: row.get("digest"),
            timestamp: datetime_from_millis(row.get("timestamp")),
            block_number: row.get("block_number"),
            sender: row.get("sender"),
            recipients,
            involved_addresses,
            transaction_type: row.get("transaction_type"),
            transaction_kind: row.get("transaction_kind"),
            module_name: row.get("module_name"),
            function_name: row.get("function_name"),
            tokens,
            balance_changes,
            object_changes,
            status: TransactionStatus::from_db(row.get::<&str, _>("status")),
            error_message: row.get("error_message"),
            gas_used: row.get("gas_used"),
            gas_cost: row.get("gas_cost"),
        },
        summary: row.get("summary"),
        network: row.get("network"),
        created_at: datetime_from_millis(row.get("created_at")),
    }
}

pub async fn insert_parsed(
    pool: &Pool<Sqlite>,
    info: &ParsedTransactionInfo,
    summary: &str,
    network: &str,
) -> Result<InsertOutcome, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO parsed_transactions
         (digest, block_number, timestamp, sender, recipients, involved_addresses, transaction_type,
          transaction_kind, module_name, function_name, tokens, balance_changes, object_changes,
          status, error_message, gas_used, gas_cost, summary, network, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&info.digest)
    .bind(info.block_number)
    .bind(to_millis(&info.timestamp))
    .bind(&info.sender)
    .bind(Json(&info.recipients))
    .bind(Json(&info.involved_addresses))
    .bind(&info.transaction_type)
    .bind(&info.transaction_kind)
    .bind(&info.module_name)
    .bind(&info.function_name)
    .bind(Json(&info.tokens))
    .bind(Json(&info.balance_changes))
    .bind(Json(&info.object_changes))
    .bind(info.status.as_str())
    .bind(&info.error_message)
    .bind(&info.gas_used)
    .bind(&info.gas_cost)
    .bind(summary)
    .bind(network)
    .bind(now_millis())
    .execute(pool)
    .await;

    insert_outcome(result)
}

pub async fn parsed_exists(pool: &Pool<Sqlite>, digest: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM parsed_transactions WHERE digest = ?")
        .bind(digest)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

pub async fn get_parsed_by_digest(
    pool: &Pool<Sqlite>,
    digest: &str,
) -> Result<Option<ParsedTransaction>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM parsed_transactions WHERE digest = ?",
        PARSED_COLUMNS
    ))
    .bind(digest)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(parsed_from_row))
}

pub async fn get_parsed_by_block(
    pool: &Pool<Sqlite>,
    block_number: i64,
) -> Result<Vec<ParsedTransaction>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM parsed_transactions WHERE block_number = ? ORDER BY id ASC",
        PARSED_COLUMNS
    ))
    .bind(block_number)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(parsed_from_row).collect())
}

/// Filtered page, newest first. `filter` is a WHERE clause with one `?`
/// bound to `value`.
async fn fetch_filtered_page(
    pool: &Pool<Sqlite>,
    filter: &str,
    value: &str,
    offset: i64,
    limit: i64,
) -> Result<(Vec<ParsedTransaction>, i64), sqlx::Error> {
    let total = sqlx::query(&format!(
        "SELECT COUNT(*) FROM parsed_transactions WHERE {}",
        filter
    ))
    .bind(value)
    .fetch_one(pool)
    .await?
    .get::<i64, _>(0);

    let rows = sqlx::query(&format!(
        "SELECT {} FROM parsed_transactions WHERE {} ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
        PARSED_COLUMNS, filter
    ))
    .bind(value)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((rows.iter().map(parsed_from_row).collect(), total))
}

pub async fn get_parsed_by_sender(
    pool: &Pool<Sqlite>,
    sender: &str,
    offset: i64,
    limit: i64,
) -> Result<(Vec<ParsedTransaction>, i64), sqlx::Error> {
    fetch_filtered_page(pool, "sender = ?", sender, offset, limit).await
}

/// Transactions whose recipient list contains `address`.
pub async fn get_parsed_by_recipient(
    pool: &Pool<Sqlite>,
    address: &str,
    offset: i64,
    limit: i64,
) -> Result<(Vec<ParsedTransaction>, i64), sqlx::Error> {
    fetch_filtered_page(
        pool,
        "EXISTS (SELECT 1 FROM json_each(parsed_transactions.recipients) WHERE json_each.value = ?)",
        address,
        offset,
        limit,
    )
    .await
}

/// Transactions whose involved address set contains `address`.
pub async fn get_parsed_by_involved_address(
    pool: &Pool<Sqlite>,
    address: &str,
    offset: i64,
    limit: i64,
) -> Result<(Vec<ParsedTransaction>, i64), sqlx::Error> {
    fetch_filtered_page(
        pool,
        "EXISTS (SELECT 1 FROM json_each(parsed_transactions.involved_addresses) WHERE json_each.value = ?)",
        address,
        offset,
        limit,
    )
    .await
}

pub async fn get_parsed_by_type(
    pool: &Pool<Sqlite>,
    transaction_type: &str,
    offset: i64,
    limit: i64,
) -> Result<(Vec<ParsedTransaction>, i64), sqlx::Error> {
    fetch_filtered_page(pool, "transaction_type = ?", transaction_type, offset, limit).await
}

/// Transactions that moved `coin_type`.
pub async fn get_parsed_by_coin_type(
    pool: &Pool<Sqlite>,
    coin_type: &str,
    offset: i64,
    limit: i64,
) -> Result<(Vec<ParsedTransaction>, i64), sqlx::Error> {
    fetch_filtered_page(
        pool,
        "EXISTS (SELECT 1 FROM json_each(parsed_transactions.tokens) WHERE json_extract(json_each.value, '$.coinType') = ?)",
        coin_type,
        offset,
        limit,
    )
    .await
}

pub async fn get_latest_parsed(pool: &Pool<Sqlite>, limit: i64) -> Result<Vec<ParsedTransaction>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM parsed_transactions ORDER BY timestamp DESC, id DESC LIMIT ?",
        PARSED_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(parsed_from_row).collect())
}

pub async fn list_parsed(
    pool: &Pool<Sqlite>,
    offset: i64,
    limit: i64,
) -> Result<(Vec<ParsedTransaction>, i64), sqlx::Error> {
    let total = count_parsed(pool).await?;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM parsed_transactions ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
        PARSED_COLUMNS
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((rows.iter().map(parsed_from_row).collect(), total))
}

pub async fn get_parsed_by_time_range(
    pool: &Pool<Sqlite>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<ParsedTransaction>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM parsed_transactions WHERE timestamp >= ? AND timestamp < ? ORDER BY timestamp ASC",
        PARSED_COLUMNS
    ))
    .bind(to_millis(&start))
    .bind(to_millis(&end))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(parsed_from_row).collect())
}

pub async fn count_parsed(pool: &Pool<Sqlite>) -> Result<i64, sqlx::Error> {
    let count = sqlx::query("SELECT COUNT(*) FROM parsed_transactions")
        .fetch_one(pool)
        .await?
        .get::<i64, _>(0);

    Ok(count)
}

async fn group_counts(pool: &Pool<Sqlite>, column: &str) -> Result<Vec<GroupCount>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {col} AS group_key, COUNT(*) AS group_count FROM parsed_transactions
         GROUP BY {col} ORDER BY group_count DESC, group_key ASC",
        col = column
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| GroupCount {
            key: row.get("group_key"),
            count: row.get("group_count"),
        })
        .collect())
}

/// Transaction count per `transaction_type`, most frequent first.
pub async fn get_type_counts(pool: &Pool<Sqlite>) -> Result<Vec<GroupCount>, sqlx::Error> {
    group_counts(pool, "transaction_type").await
}

pub async fn get_status_counts(pool: &Pool<Sqlite>) -> Result<Vec<GroupCount>, sqlx::Error> {
    group_counts(pool, "status").await
}

pub async fn get_statistics(pool: &Pool<Sqlite>) -> Result<TransactionStatistics, sqlx::Error> {
    let total = count_parsed(pool).await?;
    let latest_timestamp = sqlx::query("SELECT MAX(timestamp) AS latest FROM parsed_transactions")
        .fetch_one(pool)
        .await?
        .get::<Option<i64>, _>("latest")
        .map(datetime_from_millis);

    Ok(TransactionStatistics {
        total,
        latest_timestamp,
        type_stats: get_type_counts(pool).await?,
        status_stats: get_status_counts(pool).await?,
    })
}

/// Volume and distinct owners for `coin_type` over its most recent
/// transactions. Volume is the exact sum of absolute balance changes.
pub async fn get_token_activity_stats(
    pool: &Pool<Sqlite>,
    coin_type: &str,
) -> Result<TokenActivityStats, sqlx::Error> {
    let (transactions, _) = get_parsed_by_coin_type(pool, coin_type, 0, TOKEN_STATS_SCAN_LIMIT).await?;

    let mut total_volume: u128 = 0;
    let mut owners = HashSet::new();
    for change in transactions
        .iter()
        .flat_map(|tx| tx.info.balance_changes.iter())
        .filter(|change| change.coin_type == coin_type)
    {
        let amount: u128 = change.amount.parse().unwrap_or(0);
        total_volume = total_volume.saturating_add(amount);
        owners.insert(change.owner.as_str());
    }

    Ok(TokenActivityStats {
        transaction_count: transactions.len() as i64,
        total_volume: total_volume.to_string(),
        unique_addresses: owners.len() as i64,
    })
}

/// Delete parsed transactions older than `days_to_keep` days.
pub async fn delete_older_than(pool: &Pool<Sqlite>, days_to_keep: i64) -> Result<u64, sqlx::Error> {
    let cutoff = Utc::now() - Duration::days(days_to_keep);

    let result = sqlx::query("DELETE FROM parsed_transactions WHERE timestamp < ?")
        .bind(to_millis(&cutoff))
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
