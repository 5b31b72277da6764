use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{Pool, Row, Sqlite};

use crate::db::{now_millis, to_millis};
use crate::models::{datetime_from_millis, NewWalletAsset, Wallet, WalletAsset, WalletDetails, WalletStats};

const WALLET_COLUMNS: &str = "id, address, label, description, transaction_count, sent_transaction_count, \
     received_transaction_count, first_seen_at, last_seen_at, total_value_usd, created_at, updated_at";

fn wallet_from_row(row: &SqliteRow) -> Wallet {
    Wallet {
        id: row.get("id"),
        address: row.get("address"),
        label: row.get("label"),
        description: row.get("description"),
        transaction_count: row.get("transaction_count"),
        sent_transaction_count: row.get("sent_transaction_count"),
        received_transaction_count: row.get("received_transaction_count"),
        first_seen_at: datetime_from_millis(row.get("first_seen_at")),
        last_seen_at: datetime_from_millis(row.get("last_seen_at")),
        total_value_usd: row.get("total_value_usd"),
        created_at: datetime_from_millis(row.get("created_at")),
        updated_at: datetime_from_millis(row.get("updated_at")),
    }
}

fn asset_from_row(row: &SqliteRow) -> WalletAsset {
    WalletAsset {
        id: row.get("id"),
        wallet_address: row.get("wallet_address"),
        coin_type: row.get("coin_type"),
        symbol: row.get("symbol"),
        name: row.get("name"),
        decimals: row.get("decimals"),
        balance: row.get("balance"),
        value_usd: row.get("value_usd"),
        price_usd: row.get("price_usd"),
        icon_url: row.get("icon_url"),
        metadata: row.get::<Option<Json<Value>>, _>("metadata").map(|Json(v)| v),
        last_updated_at: datetime_from_millis(row.get("last_updated_at")),
    }
}

/// How an address took part in the transaction being recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalletRole {
    pub sender: bool,
    pub recipient: bool,
}

/// Create the wallet on first sight or move `last_seen_at` forward.
///
/// `first_seen_at` is only written on creation and `last_seen_at` never goes
/// backwards, so replaying an older transaction leaves both untouched. The
/// counters are bumped in the same statement.
pub async fn upsert_wallet(
    pool: &Pool<Sqlite>,
    address: &str,
    seen_at: DateTime<Utc>,
    role: WalletRole,
) -> Result<Wallet, sqlx::Error> {
    let seen_ms = to_millis(&seen_at);
    let now = now_millis();
    let sent = i64::from(role.sender);
    let received = i64::from(role.recipient);

    let row = sqlx::query(&format!(
        "INSERT INTO wallets
         (address, transaction_count, sent_transaction_count, received_transaction_count,
          first_seen_at, last_seen_at, total_value_usd, created_at, updated_at)
         VALUES (?1, 1, ?2, ?3, ?4, ?4, 0, ?5, ?5)
         ON CONFLICT(address) DO UPDATE SET
            transaction_count = transaction_count + 1,
            sent_transaction_count = sent_transaction_count + excluded.sent_transaction_count,
            received_transaction_count = received_transaction_count + excluded.received_transaction_count,
            last_seen_at = MAX(last_seen_at, excluded.last_seen_at),
            updated_at = excluded.updated_at
         RETURNING {}",
        WALLET_COLUMNS
    ))
    .bind(address)
    .bind(sent)
    .bind(received)
    .bind(seen_ms)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(wallet_from_row(&row))
}

/// Replace the wallet's asset set and recompute `total_value_usd`.
/// Returns the new total.
pub async fn update_wallet_assets(
    pool: &Pool<Sqlite>,
    address: &str,
    assets: &[NewWalletAsset],
) -> Result<f64, sqlx::Error> {
    let now = now_millis();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM wallet_assets WHERE wallet_address = ?")
        .bind(address)
        .execute(&mut *tx)
        .await?;

    for asset in assets {
        sqlx::query(
            "INSERT INTO wallet_assets
             (wallet_address, coin_type, symbol, name, decimals, balance, value_usd, price_usd,
              icon_url, metadata, last_updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(address)
        .bind(&asset.coin_type)
        .bind(&asset.symbol)
        .bind(&asset.name)
        .bind(asset.decimals)
        .bind(&asset.balance)
        .bind(asset.value_usd)
        .bind(asset.price_usd)
        .bind(&asset.icon_url)
        .bind(asset.metadata.as_ref().map(Json))
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    let total_value: f64 = assets.iter().filter_map(|a| a.value_usd).sum();

    sqlx::query("UPDATE wallets SET total_value_usd = ?, updated_at = ? WHERE address = ?")
        .bind(total_value)
        .bind(now)
        .bind(address)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(total_value)
}

pub async fn update_wallet_label(
    pool: &Pool<Sqlite>,
    address: &str,
    label: Option<&str>,
    description: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE wallets SET label = ?, description = ?, updated_at = ? WHERE address = ?")
        .bind(label)
        .bind(description)
        .bind(now_millis())
        .bind(address)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_wallet(pool: &Pool<Sqlite>, address: &str) -> Result<Option<Wallet>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {} FROM wallets WHERE address = ?", WALLET_COLUMNS))
        .bind(address)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(wallet_from_row))
}

/// Page of wallets, most valuable first, then most recently seen.
pub async fn list_wallets(
    pool: &Pool<Sqlite>,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Wallet>, i64), sqlx::Error> {
    let total = sqlx::query("SELECT COUNT(*) FROM wallets")
        .fetch_one(pool)
        .await?
        .get::<i64, _>(0);

    let rows = sqlx::query(&format!(
        "SELECT {} FROM wallets ORDER BY total_value_usd DESC, last_seen_at DESC LIMIT ? OFFSET ?",
        WALLET_COLUMNS
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((rows.iter().map(wallet_from_row).collect(), total))
}

/// Case-insensitive substring match on address or label.
pub async fn search_wallets(pool: &Pool<Sqlite>, query: &str, limit: i64) -> Result<Vec<Wallet>, sqlx::Error> {
    let pattern = format!("%{}%", query.to_lowercase());

    let rows = sqlx::query(&format!(
        "SELECT {} FROM wallets
         WHERE lower(address) LIKE ?1 OR lower(COALESCE(label, '')) LIKE ?1
         ORDER BY total_value_usd DESC LIMIT ?2",
        WALLET_COLUMNS
    ))
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(wallet_from_row).collect())
}

pub async fn get_wallet_assets(pool: &Pool<Sqlite>, address: &str) -> Result<Vec<WalletAsset>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, wallet_address, coin_type, symbol, name, decimals, balance, value_usd, price_usd,
                icon_url, metadata, last_updated_at
         FROM wallet_assets WHERE wallet_address = ?
         ORDER BY COALESCE(value_usd, 0) DESC, coin_type ASC",
    )
    .bind(address)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(asset_from_row).collect())
}

pub async fn get_wallet_details(pool: &Pool<Sqlite>, address: &str) -> Result<Option<WalletDetails>, sqlx::Error> {
    let Some(wallet) = get_wallet(pool, address).await? else {
        return Ok(None);
    };
    let assets = get_wallet_assets(pool, address).await?;

    Ok(Some(WalletDetails { wallet, assets }))
}

pub async fn get_wallet_stats(pool: &Pool<Sqlite>) -> Result<WalletStats, sqlx::Error> {
    let row = sqlx::query(
        "SELECT
            (SELECT COUNT(*) FROM wallets) AS total_wallets,
            (SELECT COUNT(*) FROM wallet_assets) AS total_assets,
            (SELECT COALESCE(SUM(total_value_usd), 0.0) FROM wallets) AS total_value_usd",
    )
    .fetch_one(pool)
    .await?;

    Ok(WalletStats {
        total_wallets: row.get("total_wallets"),
        total_assets: row.get("total_assets"),
        total_value_usd: row.get("total_value_usd"),
    })
}
