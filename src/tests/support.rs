//! Shared fixtures: an in-memory database, a fixed config and a scripted
//! chain client.

use crate::blockchain::client::{ChainClient, ClientError};
use crate::blockchain::types::{Checkpoint, TransactionBlockResponse, TransactionBlockResponseOptions};
use crate::config::{Config, NetworkConfig};
use crate::db::migration::run_migrations;
use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const SUI: &str = "0x2::sui::SUI";

/// A fresh, migrated in-memory database. One connection keeps every query on
/// the same memory database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        network: NetworkConfig::mainnet(),
        scan_interval: Duration::from_millis(10),
        rpc_timeout_secs: 5,
        rpc_rate_limit: None,
        init_max_retries: 2,
        init_retry_delay: Duration::from_millis(1),
        tx_concurrency: 1,
        cache_ttl: Duration::from_secs(60),
        cache_max_capacity: 100,
    }
}

fn rpc_failure(message: &str) -> ClientError {
    ClientError::Rpc {
        code: -32000,
        message: message.to_string(),
    }
}

/// Chain client answering from in-memory fixtures.
#[derive(Default)]
pub struct MockChainClient {
    latest: Mutex<Option<u64>>,
    checkpoints: Mutex<HashMap<u64, Checkpoint>>,
    transactions: Mutex<HashMap<String, TransactionBlockResponse>>,
    checkpoint_gate: Mutex<Option<Arc<Notify>>>,
    pub latest_calls: AtomicUsize,
    pub transaction_fetches: AtomicUsize,
}

impl MockChainClient {
    pub fn with_latest(latest: u64) -> Self {
        let client = Self::default();
        client.set_latest(Some(latest));
        client
    }

    /// `None` makes every tip query fail.
    pub fn set_latest(&self, latest: Option<u64>) {
        *self.latest.lock().unwrap() = latest;
    }

    pub fn add_checkpoint(&self, sequence_number: u64, checkpoint: Checkpoint) {
        self.checkpoints.lock().unwrap().insert(sequence_number, checkpoint);
    }

    /// Every checkpoint fetch waits for a permit from `gate`.
    pub fn hold_checkpoints(&self, gate: Arc<Notify>) {
        *self.checkpoint_gate.lock().unwrap() = Some(gate);
    }

    pub fn add_transaction(&self, response: TransactionBlockResponse) {
        self.transactions
            .lock()
            .unwrap()
            .insert(response.digest.clone(), response);
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn latest_checkpoint_sequence_number(&self) -> Result<u64, ClientError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        let latest = *self.latest.lock().unwrap();
        latest.ok_or_else(|| rpc_failure("node unavailable"))
    }

    async fn get_checkpoint(&self, sequence_number: u64) -> Result<Checkpoint, ClientError> {
        let gate = self.checkpoint_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.checkpoints
            .lock()
            .unwrap()
            .get(&sequence_number)
            .cloned()
            .ok_or_else(|| rpc_failure(&format!("checkpoint {} not found", sequence_number)))
    }

    async fn get_transaction_block(
        &self,
        digest: &str,
        _options: TransactionBlockResponseOptions,
    ) -> Result<TransactionBlockResponse, ClientError> {
        self.transaction_fetches.fetch_add(1, Ordering::SeqCst);
        self.transactions
            .lock()
            .unwrap()
            .get(digest)
            .cloned()
            .ok_or_else(|| rpc_failure(&format!("transaction {} not found", digest)))
    }

    async fn latest_system_state(&self) -> Result<Value, ClientError> {
        Ok(json!({ "epoch": "512", "protocolVersion": 70 }))
    }
}

pub fn checkpoint(sequence_number: u64, timestamp_ms: i64, digests: &[&str]) -> Checkpoint {
    serde_json::from_value(json!({
        "digest": format!("checkpoint-digest-{}", sequence_number),
        "sequenceNumber": sequence_number.to_string(),
        "epoch": "512",
        "timestampMs": timestamp_ms.to_string(),
        "transactions": digests,
        "epochRollingGasCostSummary": {
            "computationCost": "1000",
            "storageCost": "2000",
            "storageRebate": "500",
            "nonRefundableStorageFee": "10"
        }
    }))
    .expect("valid checkpoint fixture")
}

/// A SUI transfer from `sender` to `recipient`.
pub fn transfer(digest: &str, sender: &str, recipient: &str, amount: u64, timestamp_ms: i64) -> TransactionBlockResponse {
    response(json!({
        "digest": digest,
        "transaction": {
            "data": {
                "sender": sender,
                "transaction": { "kind": "transferSui" }
            }
        },
        "effects": {
            "status": { "status": "success" },
            "gasUsed": {
                "computationCost": "750000",
                "storageCost": "1976000",
                "storageRebate": "978120",
                "nonRefundableStorageFee": "9880"
            }
        },
        "events": [{ "sender": sender }],
        "objectChanges": [{
            "type": "mutated",
            "objectId": "0x5a1",
            "objectType": "0x2::coin::Coin<0x2::sui::SUI>",
            "sender": sender,
            "owner": { "AddressOwner": recipient }
        }],
        "balanceChanges": [
            { "owner": { "AddressOwner": sender }, "coinType": SUI, "amount": format!("-{}", amount) },
            { "owner": { "AddressOwner": recipient }, "coinType": SUI, "amount": amount.to_string() }
        ],
        "timestampMs": timestamp_ms.to_string(),
        "checkpoint": "100"
    }))
}

/// A transaction with no input section and a single credited owner.
pub fn credit(digest: &str, owner: &str, amount: &str, timestamp_ms: i64) -> TransactionBlockResponse {
    response(json!({
        "digest": digest,
        "effects": {
            "status": { "status": "success" },
            "gasUsed": { "computationCost": "1000", "storageCost": "2000" }
        },
        "balanceChanges": [
            { "owner": { "AddressOwner": owner }, "coinType": SUI, "amount": amount }
        ],
        "timestampMs": timestamp_ms.to_string(),
        "checkpoint": "100"
    }))
}

pub fn response(value: Value) -> TransactionBlockResponse {
    serde_json::from_value(value).expect("valid transaction fixture")
}
