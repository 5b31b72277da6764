//! Read-through caches for lookups whose answer never changes once stored.

use crate::config::Config;
use crate::models::{Block, ParsedTransaction};
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

/// Blocks and parsed transactions are immutable after insert, so entries are
/// only ever evicted by size or TTL.
#[derive(Clone)]
pub struct AppCache {
    blocks: Cache<i64, Block>,
    parsed: Cache<String, ParsedTransaction>,
}

impl AppCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            blocks: Cache::builder().max_capacity(capacity).time_to_live(ttl).build(),
            parsed: Cache::builder().max_capacity(capacity).time_to_live(ttl).build(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache_max_capacity, config.cache_ttl)
    }

    pub async fn get_block(&self, number: i64) -> Option<Block> {
        let result = self.blocks.get(&number).await;
        debug!("Block cache {} for {}", if result.is_some() { "hit" } else { "miss" }, number);
        result
    }

    pub async fn insert_block(&self, block: Block) {
        self.blocks.insert(block.block_number, block).await;
    }

    pub async fn get_parsed(&self, digest: &str) -> Option<ParsedTransaction> {
        let result = self.parsed.get(digest).await;
        debug!("Parsed cache {} for {}", if result.is_some() { "hit" } else { "miss" }, digest);
        result
    }

    pub async fn insert_parsed(&self, parsed: ParsedTransaction) {
        self.parsed.insert(parsed.info.digest.clone(), parsed).await;
    }
}
