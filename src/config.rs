// Configuration for:
// - Sui network selection (preset or custom RPC endpoint)
// - Database connection string
// - Server listening address/port
// - Scanner interval, startup retries and transaction concurrency
// - Cache settings (size, TTL)

use dotenv::dotenv;
use serde::Serialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct NetworkConfig {
    pub name: String,
    pub display_name: String,
    pub rpc_url: String,
    pub ws_url: String,
    pub description: String,
}

impl NetworkConfig {
    fn preset(name: &str, display_name: &str, host: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            rpc_url: format!("https://{}:443", host),
            ws_url: format!("wss://{}:443", host),
            description: description.to_string(),
        }
    }

    pub fn mainnet() -> Self {
        Self::preset(
            "mainnet",
            "Mainnet",
            "fullnode.mainnet.sui.io",
            "Sui mainnet, production environment",
        )
    }

    /// All networks the service knows how to reach without extra configuration.
    pub fn presets() -> Vec<NetworkConfig> {
        vec![
            Self::mainnet(),
            Self::preset(
                "testnet",
                "Testnet",
                "fullnode.testnet.sui.io",
                "Sui testnet, used for testing",
            ),
            Self::preset(
                "devnet",
                "Devnet",
                "fullnode.devnet.sui.io",
                "Sui devnet, used for development",
            ),
        ]
    }

    pub fn find_preset(name: &str) -> Option<NetworkConfig> {
        let name = name.to_lowercase();
        Self::presets().into_iter().find(|n| n.name == name)
    }

    /// Resolve the active network from `SUI_NETWORK`.
    ///
    /// Presets may have their endpoints overridden with `SUI_<NETWORK>_RPC_URL`
    /// and `SUI_<NETWORK>_WS_URL`. Unknown names use `SUI_RPC_URL` when set and
    /// fall back to mainnet otherwise.
    pub fn from_env() -> Self {
        let name = env::var("SUI_NETWORK")
            .unwrap_or_else(|_| "mainnet".to_string())
            .to_lowercase();

        if let Some(mut network) = Self::find_preset(&name) {
            let upper = name.to_uppercase();
            if let Ok(url) = env::var(format!("SUI_{}_RPC_URL", upper)) {
                network.rpc_url = url;
            }
            if let Ok(url) = env::var(format!("SUI_{}_WS_URL", upper)) {
                network.ws_url = url;
            }
            return network;
        }

        if let Ok(rpc_url) = env::var("SUI_RPC_URL") {
            return Self {
                display_name: format!("Custom ({})", name),
                name,
                rpc_url,
                ws_url: env::var("SUI_WS_URL")
                    .unwrap_or_else(|_| "wss://fullnode.mainnet.sui.io:443".to_string()),
                description: "Custom RPC configuration".to_string(),
            };
        }

        Self::mainnet()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub network: NetworkConfig,
    pub scan_interval: Duration,
    pub rpc_timeout_secs: u64,
    pub rpc_rate_limit: Option<u32>,
    pub init_max_retries: usize,
    pub init_retry_delay: Duration,
    pub tx_concurrency: usize,
    pub cache_ttl: Duration,
    pub cache_max_capacity: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data.db".to_string());
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);
        let network = NetworkConfig::from_env();
        let scan_interval = env::var("SCAN_INTERVAL_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));
        let rpc_timeout_secs = env::var("RPC_TIMEOUT_SECS")
            .map(|v| v.parse().unwrap_or(30))
            .unwrap_or(30);
        let rpc_rate_limit = env::var("RPC_RATE_LIMIT")
            .map(|v| v.parse().ok())
            .unwrap_or(None);
        let init_max_retries = env::var("INIT_MAX_RETRIES")
            .map(|v| v.parse().unwrap_or(5))
            .unwrap_or(5);
        let init_retry_delay = env::var("INIT_RETRY_DELAY_MS")
            .unwrap_or_else(|_| "500".to_string())
            .parse()
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(500));
        // Zero would stall the transaction stream
        let tx_concurrency = env::var("TX_CONCURRENCY")
            .map(|v| v.parse::<usize>().unwrap_or(1))
            .unwrap_or(1)
            .max(1);
        let cache_ttl = env::var("CACHE_TTL")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));
        let cache_max_capacity = env::var("CACHE_MAX_CAPACITY")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .unwrap_or(1000);

        Self {
            database_url,
            server_host,
            server_port,
            network,
            scan_interval,
            rpc_timeout_secs,
            rpc_rate_limit,
            init_max_retries,
            init_retry_delay,
            tx_concurrency,
            cache_ttl,
            cache_max_capacity,
        }
    }
}
