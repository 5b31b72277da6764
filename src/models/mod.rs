// Stored entities, the parser's normalized output and API response models.
// Timestamps are persisted as Unix milliseconds and surfaced as `DateTime<Utc>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub fn datetime_from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Failure,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Success => "success",
            TransactionStatus::Failure => "failure",
        }
    }

    pub fn from_db(value: &str) -> Self {
        if value == "success" {
            TransactionStatus::Success
        } else {
            TransactionStatus::Failure
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceChangeType {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub coin_type: String,
    pub symbol: String,
    pub decimals: u8,
    pub amount: String,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChangeInfo {
    pub owner: String,
    pub coin_type: String,
    pub symbol: String,
    /// Absolute value of the chain's signed amount.
    pub amount: String,
    pub change_type: BalanceChangeType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectChangeInfo {
    #[serde(rename = "type")]
    pub change_type: String,
    pub object_id: Option<String>,
    pub object_type: Option<String>,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub amount: Option<String>,
    pub coin_type: Option<String>,
}

/// Normalized projection of one raw transaction response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransactionInfo {
    pub digest: String,
    pub timestamp: DateTime<Utc>,
    pub block_number: i64,
    pub sender: String,
    pub recipients: Vec<String>,
    pub involved_addresses: Vec<String>,
    pub transaction_type: String,
    pub transaction_kind: String,
    pub module_name: Option<String>,
    pub function_name: Option<String>,
    pub tokens: Vec<TokenInfo>,
    pub balance_changes: Vec<BalanceChangeInfo>,
    pub object_changes: Vec<ObjectChangeInfo>,
    pub status: TransactionStatus,
    pub error_message: Option<String>,
    pub gas_used: String,
    pub gas_cost: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransaction {
    pub id: i64,
    #[serde(flatten)]
    pub info: ParsedTransactionInfo,
    pub summary: String,
    pub network: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: i64,
    pub block_number: i64,
    pub block_hash: String,
    pub timestamp: DateTime<Utc>,
    pub transaction_count: i64,
    pub total_gas_used: String,
    pub total_gas_cost: String,
    pub block_data: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBlock {
    pub block_number: i64,
    pub block_hash: String,
    pub timestamp_ms: i64,
    pub transaction_count: i64,
    pub total_gas_used: String,
    pub total_gas_cost: String,
    pub block_data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMetadata {
    pub processed_at: DateTime<Utc>,
    pub version: String,
    pub network: String,
    pub processing_time_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransactionResponse {
    pub id: i64,
    pub digest: String,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub transaction: Option<Value>,
    pub effects: Option<Value>,
    pub events: Option<Value>,
    pub object_changes: Option<Value>,
    pub balance_changes: Option<Value>,
    pub checkpoint: Option<String>,
    pub timestamp_ms: Option<String>,
    pub confirmed_local_execution: Option<bool>,
    pub raw_response: Option<Value>,
    pub metadata: Option<ProcessingMetadata>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRawTransactionResponse {
    pub digest: String,
    pub block_number: i64,
    pub timestamp_ms: i64,
    pub transaction: Option<Value>,
    pub effects: Option<Value>,
    pub events: Option<Value>,
    pub object_changes: Option<Value>,
    pub balance_changes: Option<Value>,
    pub checkpoint: Option<String>,
    pub timestamp_ms_raw: Option<String>,
    pub confirmed_local_execution: Option<bool>,
    pub raw_response: Option<Value>,
    pub metadata: ProcessingMetadata,
}

/// Lightweight per-transaction row kept for older consumers of the
/// `transactions` table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub digest: String,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub sender: Option<String>,
    pub status: String,
    pub gas_used: String,
    pub gas_price: String,
    pub gas_cost: String,
    pub transaction_type: String,
    pub effects: Option<Value>,
    pub events: Option<Value>,
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: i64,
    pub address: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub transaction_count: i64,
    pub sent_transaction_count: i64,
    pub received_transaction_count: i64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub total_value_usd: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAsset {
    pub id: i64,
    pub wallet_address: String,
    pub coin_type: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<i64>,
    pub balance: String,
    pub value_usd: Option<f64>,
    pub price_usd: Option<f64>,
    pub icon_url: Option<String>,
    pub metadata: Option<Value>,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWalletAsset {
    pub coin_type: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<i64>,
    pub balance: String,
    pub value_usd: Option<f64>,
    pub price_usd: Option<f64>,
    pub icon_url: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDetails {
    pub wallet: Wallet,
    pub assets: Vec<WalletAsset>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStats {
    pub total_wallets: i64,
    pub total_assets: i64,
    pub total_value_usd: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStats {
    pub total_blocks: i64,
    pub today_blocks: i64,
    pub total_gas_used: String,
    pub total_gas_cost: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCount {
    pub key: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatistics {
    pub total: i64,
    pub latest_timestamp: Option<DateTime<Utc>>,
    pub type_stats: Vec<GroupCount>,
    pub status_stats: Vec<GroupCount>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenActivityStats {
    pub transaction_count: i64,
    pub total_volume: String,
    pub unique_addresses: i64,
}

// API response models
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: Meta,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}
