// Keeps the wallets table in step with parsed transactions.

use crate::blockchain::parser::UNKNOWN_SENDER;
use crate::db::wallet::{self, WalletRole};
use crate::models::{NewWalletAsset, ParsedTransactionInfo};
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::{debug, error, info};

/// Distinct addresses touched by a transaction: sender, recipients, then the
/// remaining involved addresses. The unknown-sender placeholder is skipped.
pub fn wallet_addresses(info: &ParsedTransactionInfo) -> Vec<&str> {
    let mut seen = HashSet::new();
    std::iter::once(info.sender.as_str())
        .chain(info.recipients.iter().map(String::as_str))
        .chain(info.involved_addresses.iter().map(String::as_str))
        .filter(|address| !address.is_empty() && *address != UNKNOWN_SENDER)
        .filter(|address| seen.insert(*address))
        .collect()
}

/// Upsert one wallet row per address in the transaction. A failing address is
/// logged and does not stop the others. Returns how many were written.
pub async fn process_transaction_wallets(
    pool: &SqlitePool,
    info: &ParsedTransactionInfo,
    network: &str,
) -> usize {
    let addresses = wallet_addresses(info);
    let mut updated = 0;

    for address in &addresses {
        let role = WalletRole {
            sender: *address == info.sender,
            recipient: info.recipients.iter().any(|r| r.as_str() == *address),
        };
        match wallet::upsert_wallet(pool, address, info.timestamp, role).await {
            Ok(wallet) => {
                debug!(
                    "[{}] Wallet {} updated ({} transactions)",
                    network, wallet.address, wallet.transaction_count
                );
                updated += 1;
            }
            Err(e) => error!("[{}] Failed to update wallet {}: {}", network, address, e),
        }
    }

    debug!(
        "[{}] Processed wallets for {}: {}/{} addresses",
        network,
        info.digest,
        updated,
        addresses.len()
    );
    updated
}

/// Replace a wallet's asset list; the wallet total follows the new set.
pub async fn update_wallet_assets(
    pool: &SqlitePool,
    address: &str,
    assets: &[NewWalletAsset],
) -> Result<f64, sqlx::Error> {
    let total = wallet::update_wallet_assets(pool, address, assets).await?;
    info!(
        "Updated {} assets for wallet {} (total ${:.2})",
        assets.len(),
        address,
        total
    );
    Ok(total)
}
