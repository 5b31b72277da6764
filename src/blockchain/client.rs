use crate::blockchain::types::{Checkpoint, TransactionBlockResponse, TransactionBlockResponseOptions};
use crate::config::Config;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Failed to decode {method} response: {source}")]
    Decode {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Empty result for {0}")]
    MissingResult(&'static str),

    #[error("Invalid sequence number: {0}")]
    InvalidSequence(String),
}

/// Read-only view of a Sui full node used by the scanner.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Sequence number of the most recent checkpoint.
    async fn latest_checkpoint_sequence_number(&self) -> Result<u64, ClientError>;

    async fn get_checkpoint(&self, sequence_number: u64) -> Result<Checkpoint, ClientError>;

    async fn get_transaction_block(
        &self,
        digest: &str,
        options: TransactionBlockResponseOptions,
    ) -> Result<TransactionBlockResponse, ClientError>;

    /// `suix_getLatestSuiSystemState`, returned as-is.
    async fn latest_system_state(&self) -> Result<Value, ClientError>;
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

pub struct SuiRpcClient {
    http: reqwest::Client,
    rpc_url: String,
    next_id: AtomicU64,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl SuiRpcClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let rpc_url = config.network.rpc_url.clone();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.rpc_timeout_secs))
            .build()?;
        let limiter = config
            .rpc_rate_limit
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        info!(
            "Initializing Sui client for {} with RPC endpoint: {}",
            config.network.display_name, rpc_url
        );

        Ok(Self {
            http,
            rpc_url,
            next_id: AtomicU64::new(1),
            limiter,
        })
    }

    async fn call(&self, method: &'static str, params: Value) -> Result<Value, ClientError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!("RPC {} (id {})", method, id);

        let envelope: RpcEnvelope = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = envelope.error {
            return Err(ClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        match envelope.result {
            None | Some(Value::Null) => Err(ClientError::MissingResult(method)),
            Some(result) => Ok(result),
        }
    }

    async fn call_typed<T: serde::de::DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<T, ClientError> {
        let result = self.call(method, params).await?;
        serde_json::from_value(result).map_err(|source| ClientError::Decode { method, source })
    }
}

#[async_trait]
impl ChainClient for SuiRpcClient {
    async fn latest_checkpoint_sequence_number(&self) -> Result<u64, ClientError> {
        let result = self
            .call("sui_getLatestCheckpointSequenceNumber", json!([]))
            .await?;
        parse_sequence_number(&result)
    }

    async fn get_checkpoint(&self, sequence_number: u64) -> Result<Checkpoint, ClientError> {
        self.call_typed("sui_getCheckpoint", json!([sequence_number.to_string()]))
            .await
    }

    async fn get_transaction_block(
        &self,
        digest: &str,
        options: TransactionBlockResponseOptions,
    ) -> Result<TransactionBlockResponse, ClientError> {
        self.call_typed("sui_getTransactionBlock", json!([digest, options]))
            .await
    }

    async fn latest_system_state(&self) -> Result<Value, ClientError> {
        self.call("suix_getLatestSuiSystemState", json!([])).await
    }
}

/// Sequence numbers arrive as decimal strings; plain numbers are accepted too.
pub fn parse_sequence_number(value: &Value) -> Result<u64, ClientError> {
    match value {
        Value::String(s) => s
            .parse()
            .map_err(|_| ClientError::InvalidSequence(s.clone())),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ClientError::InvalidSequence(n.to_string())),
        other => Err(ClientError::InvalidSequence(other.to_string())),
    }
}
