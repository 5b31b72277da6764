use crate::blockchain::client::{ChainClient, ClientError};
use crate::blockchain::parser::{self, ParseError};
use crate::blockchain::sanitizer::{sanitize_for_storage, sanitize_optional};
use crate::blockchain::types::{TransactionBlockResponse, TransactionBlockResponseOptions};
use crate::blockchain::wallet_aggregator;
use crate::config::NetworkConfig;
use crate::db::{parsed, raw_response, transaction, InsertOutcome};
use crate::models::{datetime_from_millis, NewRawTransactionResponse, ProcessingMetadata, Transaction};
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const PAYLOAD_VERSION: &str = "1.0";

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Fetch failed: {0}")]
    Client(#[from] ClientError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Parse failed: {0}")]
    Parse(#[from] ParseError),
}

#[derive(Debug)]
pub enum ProcessOutcome {
    /// A row for this digest already existed; nothing was written.
    AlreadyProcessed,
    /// Stored and parsed; carries the legacy projection for batch insert.
    Processed(Transaction),
}

/// Everything a single transaction needs from the scanner.
pub struct TransactionContext<'a> {
    pub client: &'a dyn ChainClient,
    pub pool: &'a SqlitePool,
    pub network: &'a NetworkConfig,
}

/// Fetch, store, parse and aggregate one transaction.
pub async fn process_transaction(
    ctx: &TransactionContext<'_>,
    digest: &str,
    block_number: i64,
) -> Result<ProcessOutcome, ProcessError> {
    let network = &ctx.network.display_name;
    let started = Instant::now();

    if transaction::transaction_exists(ctx.pool, digest).await? {
        return Ok(ProcessOutcome::AlreadyProcessed);
    }
    if raw_response::response_exists(ctx.pool, digest).await? {
        info!("[{}] Transaction response already stored: {}", network, digest);
        return Ok(ProcessOutcome::AlreadyProcessed);
    }

    let response = ctx
        .client
        .get_transaction_block(digest, TransactionBlockResponseOptions::full())
        .await?;

    let record = raw_record(&response, block_number, ctx.network, started);
    if raw_response::insert_response(ctx.pool, &record).await? == InsertOutcome::AlreadyExists {
        warn!("[{}] Transaction response stored concurrently: {}", network, digest);
        return Ok(ProcessOutcome::AlreadyProcessed);
    }
    info!("[{}] Transaction response saved: {}", network, digest);

    let info = parser::parse_transaction(&response, block_number)?;
    if parsed::parsed_exists(ctx.pool, digest).await? {
        info!("[{}] Parsed transaction already stored: {}", network, digest);
    } else {
        let summary = parser::generate_summary(&info);
        match parsed::insert_parsed(ctx.pool, &info, &summary, &ctx.network.name).await? {
            InsertOutcome::Inserted => debug!("[{}] {}", network, summary),
            InsertOutcome::AlreadyExists => {
                warn!("[{}] Parsed transaction stored concurrently: {}", network, digest)
            }
        }
    }

    let wallets = wallet_aggregator::process_transaction_wallets(ctx.pool, &info, network).await;
    debug!("[{}] {} wallets updated for {}", network, wallets, digest);

    Ok(ProcessOutcome::Processed(legacy_projection(&response, block_number, network)))
}

fn raw_record(
    response: &TransactionBlockResponse,
    block_number: i64,
    network: &NetworkConfig,
    started: Instant,
) -> NewRawTransactionResponse {
    let name = network.display_name.as_str();
    let full = match serde_json::to_value(response) {
        Ok(value) => sanitize_for_storage(&value, name),
        Err(e) => {
            warn!("[{}] Failed to serialize response {}: {}", name, response.digest, e);
            None
        }
    };

    NewRawTransactionResponse {
        digest: response.digest.clone(),
        block_number,
        timestamp_ms: response.timestamp_millis(),
        transaction: sanitize_optional(response.transaction.as_ref(), name),
        effects: sanitize_optional(response.effects.as_ref(), name),
        events: sanitize_optional(response.events.as_ref(), name),
        object_changes: sanitize_optional(response.object_changes.as_ref(), name),
        balance_changes: sanitize_optional(response.balance_changes.as_ref(), name),
        checkpoint: response.checkpoint.clone(),
        timestamp_ms_raw: response.timestamp_ms.clone(),
        confirmed_local_execution: response.confirmed_local_execution,
        raw_response: full,
        metadata: ProcessingMetadata {
            processed_at: Utc::now(),
            version: PAYLOAD_VERSION.to_string(),
            network: network.name.clone(),
            processing_time_ms: Some(started.elapsed().as_millis() as i64),
        },
    }
}

/// Row for the legacy `transactions` table.
pub fn legacy_projection(
    response: &TransactionBlockResponse,
    block_number: i64,
    network: &str,
) -> Transaction {
    let effects = response.effects.as_ref();
    let status = effects
        .and_then(|e| e.pointer("/status/status"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let gas_used = effects
        .and_then(|e| e.pointer("/gasUsed/computationCost"))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "0".to_string());
    let sender = response
        .transaction
        .as_ref()
        .and_then(|t| t.pointer("/data/sender"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Transaction {
        digest: response.digest.clone(),
        block_number,
        timestamp: datetime_from_millis(response.timestamp_millis()),
        sender,
        status,
        gas_used,
        gas_price: "0".to_string(),
        gas_cost: "0".to_string(),
        transaction_type: "Unknown".to_string(),
        effects: sanitize_optional(effects, network),
        events: sanitize_optional(response.events.as_ref(), network),
        arguments: Some(json!({
            "transaction": sanitize_optional(response.transaction.as_ref(), network),
            "timestampMs": response.timestamp_ms,
            "checkpoint": response.checkpoint,
            "processedAt": Utc::now(),
            "version": PAYLOAD_VERSION,
        })),
    }
}
