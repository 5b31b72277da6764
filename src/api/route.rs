use crate::{
    api::{
        error::ApiError,
        response::{with_total_count, ApiResponse},
    },
    blockchain::{
        scanner::{ConnectionReport, ScannerStatus},
        wallet_aggregator,
    },
    config::NetworkConfig,
    db::{block, parsed, raw_response, wallet},
    models::{
        Block, BlockStats, GroupCount, Meta, NewWalletAsset, Page, ParsedTransaction,
        RawTransactionResponse, TokenActivityStats, TransactionStatistics, Wallet, WalletDetails,
        WalletStats,
    },
    state::AppState,
    validation::{
        validate_digest, validate_limit, validate_offset, validate_sui_address, validate_time_range,
    },
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Deserialize)]
pub struct PageQuery {
    offset: Option<i64>,
    limit: Option<i64>,
}

impl PageQuery {
    fn validate(&self) -> Result<(i64, i64), ApiError> {
        Ok((validate_offset(self.offset)?, validate_limit(self.limit)?))
    }
}

#[derive(Deserialize)]
pub struct RangeQuery {
    start: String,
    end: String,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: String,
    limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct WalletLabelBody {
    label: Option<String>,
    description: Option<String>,
}

fn page_response<T: serde::Serialize>(data: Vec<T>, total: i64, offset: i64, limit: i64) -> Response {
    with_total_count(
        Page {
            data,
            meta: Meta { total, offset, limit },
        },
        total,
    )
}

// Create router with all routes
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/blocks", get(list_blocks))
        .route("/blocks/latest", get(latest_blocks))
        .route("/blocks/stats", get(block_stats))
        .route("/blocks/range", get(blocks_in_range))
        .route("/blocks/hash/{hash}", get(block_by_hash))
        .route("/blocks/{number}", get(block_by_number))
        .route("/blocks/{number}/transactions", get(block_transactions))
        .route("/transactions", get(list_transactions))
        .route("/transactions/latest", get(latest_transactions))
        .route("/transactions/stats", get(transaction_stats))
        .route("/transactions/types", get(transaction_types))
        .route("/transactions/range", get(transactions_in_range))
        .route("/transactions/sender/{address}", get(transactions_by_sender))
        .route("/transactions/recipient/{address}", get(transactions_by_recipient))
        .route("/transactions/address/{address}", get(transactions_by_address))
        .route("/transactions/type/{transaction_type}", get(transactions_by_type))
        .route("/transactions/token/{coin_type}", get(transactions_by_token))
        .route("/transactions/{digest}", get(transaction_by_digest))
        .route("/tokens/{coin_type}/stats", get(token_stats))
        .route("/responses", get(list_responses))
        .route("/responses/stats", get(response_stats))
        .route("/responses/range", get(responses_in_range))
        .route("/responses/block/{number}", get(responses_by_block))
        .route("/responses/{digest}", get(response_by_digest))
        .route("/wallets", get(list_wallets))
        .route("/wallets/search", get(search_wallets))
        .route("/wallets/stats", get(wallet_stats))
        .route("/wallets/{address}", get(wallet_by_address).put(update_wallet_label))
        .route("/wallets/{address}/details", get(wallet_details))
        .route("/wallets/{address}/assets", get(wallet_assets).put(replace_wallet_assets))
        .route("/scanner/status", get(scanner_status))
        .route("/scanner/start", post(start_scanner))
        .route("/scanner/stop", post(stop_scanner))
        .route("/scanner/reset", post(reset_scanner))
        .route("/scanner/test-connection", get(test_connection))
        .route("/scanner/network", get(network_info))
        .route("/scanner/networks", get(list_networks))
        .route("/scanner/networks/{name}", get(network_by_name))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

// Blocks

async fn list_blocks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let (offset, limit) = params.validate()?;
    let (blocks, total) = block::list_blocks(&state.db_pool, offset, limit).await?;
    Ok(page_response(blocks, total, offset, limit))
}

async fn latest_blocks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> Result<Response, ApiError> {
    let limit = validate_limit(params.limit)?;
    let blocks = block::get_latest_blocks(&state.db_pool, limit).await?;
    let total = blocks.len() as i64;
    Ok(with_total_count(blocks, total))
}

async fn block_stats(State(state): State<Arc<AppState>>) -> Result<ApiResponse<BlockStats>, ApiError> {
    Ok(ApiResponse {
        data: block::get_block_stats(&state.db_pool).await?,
    })
}

async fn blocks_in_range(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeQuery>,
) -> Result<Response, ApiError> {
    let (start, end) = validate_time_range(&params.start, &params.end)?;
    let blocks = block::get_blocks_by_time_range(&state.db_pool, start, end).await?;
    let total = blocks.len() as i64;
    Ok(with_total_count(blocks, total))
}

async fn block_by_number(
    State(state): State<Arc<AppState>>,
    Path(number): Path<i64>,
) -> Result<ApiResponse<Block>, ApiError> {
    if let Some(cached) = state.cache.get_block(number).await {
        return Ok(ApiResponse { data: cached });
    }

    let found = block::get_block_by_number(&state.db_pool, number)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("block {}", number)))?;
    state.cache.insert_block(found.clone()).await;

    Ok(ApiResponse { data: found })
}

async fn block_by_hash(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<ApiResponse<Block>, ApiError> {
    validate_digest(&hash)?;
    let found = block::get_block_by_hash(&state.db_pool, &hash)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("block {}", hash)))?;
    Ok(ApiResponse { data: found })
}

async fn block_transactions(
    State(state): State<Arc<AppState>>,
    Path(number): Path<i64>,
) -> Result<Response, ApiError> {
    let transactions = parsed::get_parsed_by_block(&state.db_pool, number).await?;
    let total = transactions.len() as i64;
    Ok(with_total_count(transactions, total))
}

// Parsed transactions

async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let (offset, limit) = params.validate()?;
    let (transactions, total) = parsed::list_parsed(&state.db_pool, offset, limit).await?;
    Ok(page_response(transactions, total, offset, limit))
}

async fn latest_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> Result<Response, ApiError> {
    let limit = validate_limit(params.limit)?;
    let transactions = parsed::get_latest_parsed(&state.db_pool, limit).await?;
    let total = transactions.len() as i64;
    Ok(with_total_count(transactions, total))
}

async fn transaction_stats(
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<TransactionStatistics>, ApiError> {
    Ok(ApiResponse {
        data: parsed::get_statistics(&state.db_pool).await?,
    })
}

async fn transaction_types(
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<Vec<GroupCount>>, ApiError> {
    Ok(ApiResponse {
        data: parsed::get_type_counts(&state.db_pool).await?,
    })
}

async fn transactions_in_range(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeQuery>,
) -> Result<Response, ApiError> {
    let (start, end) = validate_time_range(&params.start, &params.end)?;
    let transactions = parsed::get_parsed_by_time_range(&state.db_pool, start, end).await?;
    let total = transactions.len() as i64;
    Ok(with_total_count(transactions, total))
}

async fn transactions_by_sender(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(params): Query<PageQuery>,
) -> Result<Response, ApiError> {
    validate_sui_address(&address)?;
    let (offset, limit) = params.validate()?;
    let (transactions, total) = parsed::get_parsed_by_sender(&state.db_pool, &address, offset, limit).await?;
    Ok(page_response(transactions, total, offset, limit))
}

async fn transactions_by_recipient(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(params): Query<PageQuery>,
) -> Result<Response, ApiError> {
    validate_sui_address(&address)?;
    let (offset, limit) = params.validate()?;
    let (transactions, total) =
        parsed::get_parsed_by_recipient(&state.db_pool, &address, offset, limit).await?;
    Ok(page_response(transactions, total, offset, limit))
}

async fn transactions_by_address(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(params): Query<PageQuery>,
) -> Result<Response, ApiError> {
    validate_sui_address(&address)?;
    let (offset, limit) = params.validate()?;
    let (transactions, total) =
        parsed::get_parsed_by_involved_address(&state.db_pool, &address, offset, limit).await?;
    Ok(page_response(transactions, total, offset, limit))
}

async fn transactions_by_type(
    State(state): State<Arc<AppState>>,
    Path(transaction_type): Path<String>,
    Query(params): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let (offset, limit) = params.validate()?;
    let (transactions, total) =
        parsed::get_parsed_by_type(&state.db_pool, &transaction_type, offset, limit).await?;
    Ok(page_response(transactions, total, offset, limit))
}

async fn transactions_by_token(
    State(state): State<Arc<AppState>>,
    Path(coin_type): Path<String>,
    Query(params): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let (offset, limit) = params.validate()?;
    let (transactions, total) =
        parsed::get_parsed_by_coin_type(&state.db_pool, &coin_type, offset, limit).await?;
    Ok(page_response(transactions, total, offset, limit))
}

async fn transaction_by_digest(
    State(state): State<Arc<AppState>>,
    Path(digest): Path<String>,
) -> Result<ApiResponse<ParsedTransaction>, ApiError> {
    validate_digest(&digest)?;

    if let Some(cached) = state.cache.get_parsed(&digest).await {
        return Ok(ApiResponse { data: cached });
    }

    let found = parsed::get_parsed_by_digest(&state.db_pool, &digest)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("transaction {}", digest)))?;
    state.cache.insert_parsed(found.clone()).await;

    Ok(ApiResponse { data: found })
}

async fn token_stats(
    State(state): State<Arc<AppState>>,
    Path(coin_type): Path<String>,
) -> Result<ApiResponse<TokenActivityStats>, ApiError> {
    Ok(ApiResponse {
        data: parsed::get_token_activity_stats(&state.db_pool, &coin_type).await?,
    })
}

// Raw transaction responses

async fn list_responses(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let (offset, limit) = params.validate()?;
    let (responses, total) = raw_response::list_responses(&state.db_pool, offset, limit).await?;
    Ok(page_response(responses, total, offset, limit))
}

async fn response_stats(
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<raw_response::ResponseStatistics>, ApiError> {
    Ok(ApiResponse {
        data: raw_response::get_response_statistics(&state.db_pool).await?,
    })
}

async fn responses_in_range(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeQuery>,
) -> Result<Response, ApiError> {
    let (start, end) = validate_time_range(&params.start, &params.end)?;
    let responses = raw_response::get_responses_by_time_range(&state.db_pool, start, end).await?;
    let total = responses.len() as i64;
    Ok(with_total_count(responses, total))
}

async fn responses_by_block(
    State(state): State<Arc<AppState>>,
    Path(number): Path<i64>,
) -> Result<Response, ApiError> {
    let responses = raw_response::get_responses_by_block(&state.db_pool, number).await?;
    let total = responses.len() as i64;
    Ok(with_total_count(responses, total))
}

async fn response_by_digest(
    State(state): State<Arc<AppState>>,
    Path(digest): Path<String>,
) -> Result<ApiResponse<RawTransactionResponse>, ApiError> {
    validate_digest(&digest)?;
    let found = raw_response::get_response_by_digest(&state.db_pool, &digest)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("transaction response {}", digest)))?;
    Ok(ApiResponse { data: found })
}

// Wallets

async fn list_wallets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let (offset, limit) = params.validate()?;
    let (wallets, total) = wallet::list_wallets(&state.db_pool, offset, limit).await?;
    Ok(page_response(wallets, total, offset, limit))
}

async fn search_wallets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Result<Response, ApiError> {
    if params.q.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing parameter: q".to_string()));
    }
    let limit = validate_limit(params.limit)?;
    let wallets = wallet::search_wallets(&state.db_pool, params.q.trim(), limit).await?;
    let total = wallets.len() as i64;
    Ok(with_total_count(wallets, total))
}

async fn wallet_stats(
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<WalletStats>, ApiError> {
    Ok(ApiResponse {
        data: wallet::get_wallet_stats(&state.db_pool).await?,
    })
}

async fn wallet_by_address(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<ApiResponse<Wallet>, ApiError> {
    validate_sui_address(&address)?;
    let found = wallet::get_wallet(&state.db_pool, &address)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("wallet {}", address)))?;
    Ok(ApiResponse { data: found })
}

async fn update_wallet_label(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Json(body): Json<WalletLabelBody>,
) -> Result<ApiResponse<Wallet>, ApiError> {
    validate_sui_address(&address)?;
    let updated = wallet::update_wallet_label(
        &state.db_pool,
        &address,
        body.label.as_deref(),
        body.description.as_deref(),
    )
    .await?;
    if !updated {
        return Err(ApiError::NotFound(format!("wallet {}", address)));
    }

    let found = wallet::get_wallet(&state.db_pool, &address)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("wallet {}", address)))?;
    Ok(ApiResponse { data: found })
}

async fn wallet_details(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<ApiResponse<WalletDetails>, ApiError> {
    validate_sui_address(&address)?;
    let found = wallet::get_wallet_details(&state.db_pool, &address)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("wallet {}", address)))?;
    Ok(ApiResponse { data: found })
}

async fn wallet_assets(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Response, ApiError> {
    validate_sui_address(&address)?;
    let assets = wallet::get_wallet_assets(&state.db_pool, &address).await?;
    let total = assets.len() as i64;
    Ok(with_total_count(assets, total))
}

async fn replace_wallet_assets(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Json(assets): Json<Vec<NewWalletAsset>>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    validate_sui_address(&address)?;
    if wallet::get_wallet(&state.db_pool, &address).await?.is_none() {
        return Err(ApiError::NotFound(format!("wallet {}", address)));
    }

    let total = wallet_aggregator::update_wallet_assets(&state.db_pool, &address, &assets).await?;
    Ok(ApiResponse {
        data: json!({ "address": address, "assetCount": assets.len(), "totalValueUsd": total }),
    })
}

// Scanner control

async fn scanner_status(
    State(state): State<Arc<AppState>>,
) -> ApiResponse<ScannerStatus> {
    ApiResponse {
        data: state.scanner.get_status(),
    }
}

async fn start_scanner(
    State(state): State<Arc<AppState>>,
) -> ApiResponse<ScannerStatus> {
    if !state.scanner.start() {
        info!("Start requested but scanner was not stopped");
    }
    ApiResponse {
        data: state.scanner.get_status(),
    }
}

async fn stop_scanner(
    State(state): State<Arc<AppState>>,
) -> ApiResponse<ScannerStatus> {
    state.scanner.stop();
    ApiResponse {
        data: state.scanner.get_status(),
    }
}

async fn reset_scanner(
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<ScannerStatus>, ApiError> {
    state.scanner.reset().await?;
    Ok(ApiResponse {
        data: state.scanner.get_status(),
    })
}

async fn test_connection(
    State(state): State<Arc<AppState>>,
) -> ApiResponse<ConnectionReport> {
    ApiResponse {
        data: state.scanner.test_connection().await,
    }
}

async fn network_info(State(state): State<Arc<AppState>>) -> ApiResponse<NetworkConfig> {
    ApiResponse {
        data: state.config.network.clone(),
    }
}

async fn list_networks() -> ApiResponse<Vec<NetworkConfig>> {
    ApiResponse {
        data: NetworkConfig::presets(),
    }
}

async fn network_by_name(Path(name): Path<String>) -> Result<ApiResponse<NetworkConfig>, ApiError> {
    let network = NetworkConfig::find_preset(&name)
        .ok_or_else(|| ApiError::NotFound(format!("network {}", name)))?;
    Ok(ApiResponse { data: network })
}
