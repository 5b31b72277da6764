// Cursor-driven checkpoint scanner.
//
// The cursor holds the last checkpoint a tick attempted. Every tick moves it
// forward by exactly one, whether or not the checkpoint could be stored, so a
// failing checkpoint is skipped rather than retried.

use crate::blockchain::client::{ChainClient, ClientError};
use crate::blockchain::processor::{self, ProcessOutcome, TransactionContext, PAYLOAD_VERSION};
use crate::blockchain::sanitizer;
use crate::blockchain::types::Checkpoint;
use crate::config::{Config, NetworkConfig};
use crate::db::{block, transaction, InsertOutcome};
use crate::models::{NewBlock, Transaction};
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("Failed to initialize scanner after {attempts} attempts: {source}")]
    Initialization {
        attempts: usize,
        #[source]
        source: ClientError,
    },

    #[error("Failed to fetch checkpoint {number}: {source}")]
    CheckpointFetch {
        number: u64,
        #[source]
        source: ClientError,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ScanState {
    Idle = 0,
    Scanning = 1,
    Stopped = 2,
}

impl ScanState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ScanState::Idle,
            1 => ScanState::Scanning,
            _ => ScanState::Stopped,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BlockOutcome {
    /// A block row with this number already existed.
    AlreadyProcessed,
    Processed {
        transactions: usize,
        saved: usize,
    },
}

#[derive(Debug)]
pub enum TickOutcome {
    /// The scanner was busy or stopped.
    Skipped,
    Ran {
        block_number: u64,
        result: Result<BlockOutcome, ScannerError>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSummary {
    pub name: String,
    pub display_name: String,
    pub description: String,
}

impl From<&NetworkConfig> for NetworkSummary {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            name: network.name.clone(),
            display_name: network.display_name.clone(),
            description: network.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerStatus {
    pub is_scanning: bool,
    pub state: ScanState,
    pub last_processed_block: u64,
    pub timestamp: DateTime<Utc>,
    pub network: NetworkSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    pub success: bool,
    pub network: NetworkSummary,
    pub rpc_url: String,
    pub latest_checkpoint: Option<u64>,
    pub epoch: Option<String>,
    pub protocol_version: Option<String>,
    pub error: Option<String>,
}

pub struct Scanner {
    client: Arc<dyn ChainClient>,
    pool: SqlitePool,
    network: NetworkConfig,
    state: AtomicU8,
    cursor: AtomicU64,
    tx_concurrency: usize,
    init_max_retries: usize,
    init_retry_delay: Duration,
}

impl Scanner {
    pub fn new(client: Arc<dyn ChainClient>, pool: SqlitePool, config: &Config) -> Self {
        Self {
            client,
            pool,
            network: config.network.clone(),
            state: AtomicU8::new(ScanState::Idle as u8),
            cursor: AtomicU64::new(0),
            tx_concurrency: config.tx_concurrency.max(1),
            init_max_retries: config.init_max_retries,
            init_retry_delay: config.init_retry_delay,
        }
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn state(&self) -> ScanState {
        ScanState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn last_processed_block(&self) -> u64 {
        self.cursor.load(Ordering::SeqCst)
    }

    fn transition(&self, from: ScanState, to: ScanState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Set the cursor from the highest stored block, or from the chain tip
    /// when nothing is stored yet. The chain is retried with backoff.
    pub async fn initialize(&self) -> Result<u64, ScannerError> {
        let name = &self.network.display_name;

        if let Some(max) = block::get_max_block_number(&self.pool).await? {
            let cursor = max.max(0) as u64;
            self.cursor.store(cursor, Ordering::SeqCst);
            info!("[{}] Resuming from stored checkpoint {}", name, cursor);
            return Ok(cursor);
        }

        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.init_retry_delay)
            .with_max_times(self.init_max_retries);

        let latest = (|| async { self.client.latest_checkpoint_sequence_number().await })
            .retry(backoff)
            .notify(|e: &ClientError, delay: Duration| {
                warn!(
                    "[{}] Failed to fetch latest checkpoint, retrying in {:?}: {}",
                    name, delay, e
                );
            })
            .await
            .map_err(|source| ScannerError::Initialization {
                attempts: self.init_max_retries + 1,
                source,
            })?;

        self.cursor.store(latest, Ordering::SeqCst);
        info!("[{}] Starting from latest checkpoint {}", name, latest);
        Ok(latest)
    }

    /// Attempt one scan step. Never overlaps with another tick.
    pub async fn tick(&self) -> TickOutcome {
        if !self.transition(ScanState::Idle, ScanState::Scanning) {
            debug!("[{}] Scanner busy or stopped, skipping tick", self.network.display_name);
            return TickOutcome::Skipped;
        }

        let previous = self.cursor.load(Ordering::SeqCst);
        let next = previous + 1;
        let result = self.process_block(next).await;

        if let Err(e) = &result {
            error!("[{}] Failed to process checkpoint {}: {}", self.network.display_name, next, e);
        }

        // A reset during the tick wins over this advance
        let _ = self
            .cursor
            .compare_exchange(previous, next, Ordering::SeqCst, Ordering::SeqCst);
        // stop() during the tick leaves the scanner stopped
        self.transition(ScanState::Scanning, ScanState::Idle);

        TickOutcome::Ran {
            block_number: next,
            result,
        }
    }

    /// Drive `tick` on a fixed interval until `shutdown` fires. Ticks that
    /// fall due while one is running are dropped.
    pub async fn run(self: Arc<Self>, every: Duration, shutdown: CancellationToken) {
        info!(
            "[{}] Scanner running every {:?} from checkpoint {}",
            self.network.display_name,
            every,
            self.last_processed_block()
        );

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.cancelled() => {
                    info!("[{}] Shutting down scanner", self.network.display_name);
                    break;
                }
            }
        }
    }

    pub async fn process_block(&self, number: u64) -> Result<BlockOutcome, ScannerError> {
        let name = &self.network.display_name;
        info!("[{}] Processing checkpoint {}", name, number);

        let checkpoint = self
            .client
            .get_checkpoint(number)
            .await
            .map_err(|source| ScannerError::CheckpointFetch { number, source })?;

        let block_number = number as i64;
        if block::block_exists(&self.pool, block_number).await? {
            info!("[{}] Checkpoint {} already stored, skipping", name, number);
            return Ok(BlockOutcome::AlreadyProcessed);
        }

        self.store_block(block_number, &checkpoint).await;

        let rows = self.process_transactions(block_number, &checkpoint.transactions).await;
        let saved = self.save_legacy_rows(block_number, &rows).await;

        Ok(BlockOutcome::Processed {
            transactions: checkpoint.transactions.len(),
            saved,
        })
    }

    async fn store_block(&self, block_number: i64, checkpoint: &Checkpoint) {
        let name = &self.network.display_name;
        let mut new_block = NewBlock {
            block_number,
            block_hash: checkpoint.digest.clone(),
            timestamp_ms: checkpoint.timestamp_ms.parse().unwrap_or(0),
            transaction_count: checkpoint.transactions.len() as i64,
            total_gas_used: "0".to_string(),
            total_gas_cost: "0".to_string(),
            block_data: block_payload(checkpoint, name),
        };

        if new_block.block_data.is_some() {
            match block::insert_block(&self.pool, &new_block).await {
                Ok(InsertOutcome::Inserted) => {
                    info!("[{}] Checkpoint {} saved", name, block_number);
                    return;
                }
                Ok(InsertOutcome::AlreadyExists) => {
                    warn!("[{}] Checkpoint {} already exists", name, block_number);
                    return;
                }
                Err(e) => error!("[{}] Failed to save checkpoint {}: {}", name, block_number, e),
            }
        }

        new_block.block_data = Some(fallback_payload(checkpoint));
        match block::insert_block(&self.pool, &new_block).await {
            Ok(InsertOutcome::Inserted) => {
                info!("[{}] Checkpoint {} saved with minimal payload", name, block_number)
            }
            Ok(InsertOutcome::AlreadyExists) => {
                warn!("[{}] Checkpoint {} already exists", name, block_number)
            }
            Err(e) => error!(
                "[{}] Failed to save minimal payload for checkpoint {}: {}",
                name, block_number, e
            ),
        }
    }

    /// Run every digest through the transaction pipeline, at most
    /// `tx_concurrency` at a time. Rows come back in digest order.
    async fn process_transactions(&self, block_number: i64, digests: &[String]) -> Vec<Transaction> {
        let name = &self.network.display_name;
        let ctx = TransactionContext {
            client: self.client.as_ref(),
            pool: &self.pool,
            network: &self.network,
        };
        let ctx = &ctx;

        // Collected first so the `run` future stays `Send`
        let pending: Vec<_> = digests
            .iter()
            .map(|digest| async move {
                (digest, processor::process_transaction(ctx, digest, block_number).await)
            })
            .collect();

        let results: Vec<_> = stream::iter(pending)
            .buffered(self.tx_concurrency)
            .collect()
            .await;

        let mut rows = Vec::new();
        for (digest, result) in results {
            match result {
                Ok(ProcessOutcome::Processed(row)) => rows.push(row),
                Ok(ProcessOutcome::AlreadyProcessed) => {
                    debug!("[{}] Transaction {} already processed", name, digest)
                }
                Err(e) => error!("[{}] Failed to process transaction {}: {}", name, digest, e),
            }
        }
        rows
    }

    /// Batch insert, falling back to one insert per row. Returns rows saved.
    async fn save_legacy_rows(&self, block_number: i64, rows: &[Transaction]) -> usize {
        let name = &self.network.display_name;

        if rows.is_empty() {
            info!("[{}] Checkpoint {} done, no new transactions", name, block_number);
            return 0;
        }

        match transaction::add_transactions(&self.pool, rows).await {
            Ok(()) => {
                info!(
                    "[{}] Checkpoint {} done, saved {} transactions",
                    name,
                    block_number,
                    rows.len()
                );
                rows.len()
            }
            Err(e) => {
                error!("[{}] Batch save failed, saving one by one: {}", name, e);
                let mut saved = 0;
                for row in rows {
                    match transaction::add_transaction(&self.pool, row).await {
                        Ok(InsertOutcome::Inserted) => saved += 1,
                        Ok(InsertOutcome::AlreadyExists) => {
                            warn!("[{}] Transaction {} already exists", name, row.digest)
                        }
                        Err(e) => error!("[{}] Failed to save transaction {}: {}", name, row.digest, e),
                    }
                }
                info!(
                    "[{}] Checkpoint {} done, saved {}/{} transactions",
                    name,
                    block_number,
                    saved,
                    rows.len()
                );
                saved
            }
        }
    }

    pub fn get_status(&self) -> ScannerStatus {
        let state = self.state();
        ScannerStatus {
            is_scanning: state == ScanState::Scanning,
            state,
            last_processed_block: self.last_processed_block(),
            timestamp: Utc::now(),
            network: NetworkSummary::from(&self.network),
        }
    }

    /// Allow ticks again after `stop`.
    pub fn start(&self) -> bool {
        let started = self.transition(ScanState::Stopped, ScanState::Idle);
        if started {
            info!("[{}] Scanner started", self.network.display_name);
        }
        started
    }

    /// Make future ticks no-ops. A tick already running finishes normally.
    pub fn stop(&self) {
        self.state.store(ScanState::Stopped as u8, Ordering::SeqCst);
        info!("[{}] Scanner stopped", self.network.display_name);
    }

    /// Return to `Idle` and recompute the cursor.
    pub async fn reset(&self) -> Result<u64, ScannerError> {
        info!("[{}] Resetting scanner", self.network.display_name);
        self.state.store(ScanState::Idle as u8, Ordering::SeqCst);
        self.initialize().await
    }

    pub async fn test_connection(&self) -> ConnectionReport {
        test_connection(self.client.as_ref(), &self.network).await
    }
}

/// Query the chain tip and system state to check the endpoint is usable.
pub async fn test_connection(client: &dyn ChainClient, network: &NetworkConfig) -> ConnectionReport {
    let mut report = ConnectionReport {
        success: false,
        network: NetworkSummary::from(network),
        rpc_url: network.rpc_url.clone(),
        latest_checkpoint: None,
        epoch: None,
        protocol_version: None,
        error: None,
    };

    let checked = async {
        report.latest_checkpoint = Some(client.latest_checkpoint_sequence_number().await?);
        let system_state = client.latest_system_state().await?;
        report.epoch = field_as_string(&system_state, "epoch");
        report.protocol_version = field_as_string(&system_state, "protocolVersion");
        Ok::<_, ClientError>(())
    }
    .await;

    match checked {
        Ok(()) => {
            report.success = true;
            info!(
                "[{}] Connection OK, latest checkpoint {:?}",
                network.display_name, report.latest_checkpoint
            );
        }
        Err(e) => {
            error!("[{}] Connection test failed: {}", network.display_name, e);
            report.error = Some(e.to_string());
        }
    }
    report
}

fn field_as_string(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Sanitized checkpoint plus processing metadata, or `None` when the
/// checkpoint cannot be sanitized.
pub fn block_payload(checkpoint: &Checkpoint, network: &str) -> Option<Value> {
    let raw = serde_json::to_value(checkpoint).ok()?;
    match sanitizer::sanitize_for_storage(&raw, network)? {
        Value::Object(mut fields) => {
            fields.insert("processedAt".to_string(), json!(Utc::now()));
            fields.insert("version".to_string(), json!(PAYLOAD_VERSION));
            Some(Value::Object(fields))
        }
        _ => None,
    }
}

/// Minimal payload stored when the full checkpoint could not be.
pub fn fallback_payload(checkpoint: &Checkpoint) -> Value {
    json!({
        "digest": checkpoint.digest,
        "timestampMs": checkpoint.timestamp_ms,
        "transactionCount": checkpoint.transactions.len(),
        "processedAt": Utc::now(),
        "version": PAYLOAD_VERSION,
    })
}
