// Checks that the configured Sui RPC endpoint answers.
// Usage: SUI_NETWORK=testnet cargo run --bin rpc_check

use std::process::ExitCode;

use sui_indexer_service::{blockchain::scanner, config::Config, SuiRpcClient};
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = Config::from_env();
    let client = match SuiRpcClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build RPC client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = scanner::test_connection(&client, &config.network).await;
    match serde_json::to_string_pretty(&report) {
        Ok(json) => info!("{}", json),
        Err(e) => error!("Failed to render report: {}", e),
    }

    if report.success {
        info!("✅ {} is reachable", config.network.display_name);
        ExitCode::SUCCESS
    } else {
        error!("❌ {} is not reachable", config.network.display_name);
        ExitCode::FAILURE
    }
}
