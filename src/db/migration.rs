use sqlx::SqlitePool;
use tracing::info;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS blocks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        block_number INTEGER NOT NULL UNIQUE,
        block_hash TEXT NOT NULL UNIQUE,
        timestamp INTEGER NOT NULL,
        transaction_count INTEGER NOT NULL DEFAULT 0,
        total_gas_used TEXT NOT NULL DEFAULT '0',
        total_gas_cost TEXT NOT NULL DEFAULT '0',
        block_data TEXT,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_blocks_timestamp ON blocks(timestamp)",
    "CREATE TABLE IF NOT EXISTS transactions (
        digest TEXT PRIMARY KEY,
        block_number INTEGER NOT NULL,
        timestamp INTEGER NOT NULL,
        sender TEXT,
        status TEXT NOT NULL,
        gas_used TEXT NOT NULL DEFAULT '0',
        gas_price TEXT NOT NULL DEFAULT '0',
        gas_cost TEXT NOT NULL DEFAULT '0',
        transaction_type TEXT NOT NULL,
        effects TEXT,
        events TEXT,
        arguments TEXT,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_transactions_block_number ON transactions(block_number)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_sender ON transactions(sender)",
    "CREATE TABLE IF NOT EXISTS transaction_responses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        digest TEXT NOT NULL UNIQUE,
        block_number INTEGER NOT NULL,
        timestamp INTEGER NOT NULL,
        transaction_data TEXT,
        effects TEXT,
        events TEXT,
        object_changes TEXT,
        balance_changes TEXT,
        checkpoint TEXT,
        timestamp_ms TEXT,
        confirmed_local_execution INTEGER,
        raw_response TEXT,
        metadata TEXT,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_transaction_responses_block_number ON transaction_responses(block_number)",
    "CREATE INDEX IF NOT EXISTS idx_transaction_responses_timestamp ON transaction_responses(timestamp)",
    "CREATE TABLE IF NOT EXISTS parsed_transactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        digest TEXT NOT NULL UNIQUE,
        block_number INTEGER NOT NULL,
        timestamp INTEGER NOT NULL,
        sender TEXT NOT NULL,
        recipients TEXT NOT NULL DEFAULT '[]',
        involved_addresses TEXT NOT NULL DEFAULT '[]',
        transaction_type TEXT NOT NULL,
        transaction_kind TEXT NOT NULL,
        module_name TEXT,
        function_name TEXT,
        tokens TEXT NOT NULL DEFAULT '[]',
        balance_changes TEXT NOT NULL DEFAULT '[]',
        object_changes TEXT NOT NULL DEFAULT '[]',
        status TEXT NOT NULL,
        error_message TEXT,
        gas_used TEXT NOT NULL DEFAULT '0',
        gas_cost TEXT NOT NULL DEFAULT '0',
        summary TEXT NOT NULL,
        network TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_parsed_transactions_block_number ON parsed_transactions(block_number)",
    "CREATE INDEX IF NOT EXISTS idx_parsed_transactions_sender ON parsed_transactions(sender)",
    "CREATE INDEX IF NOT EXISTS idx_parsed_transactions_timestamp ON parsed_transactions(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_parsed_transactions_type ON parsed_transactions(transaction_type)",
    "CREATE TABLE IF NOT EXISTS wallets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        address TEXT NOT NULL UNIQUE,
        label TEXT,
        description TEXT,
        transaction_count INTEGER NOT NULL DEFAULT 0,
        sent_transaction_count INTEGER NOT NULL DEFAULT 0,
        received_transaction_count INTEGER NOT NULL DEFAULT 0,
        first_seen_at INTEGER NOT NULL,
        last_seen_at INTEGER NOT NULL,
        total_value_usd REAL NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_wallets_last_seen ON wallets(last_seen_at)",
    "CREATE TABLE IF NOT EXISTS wallet_assets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        wallet_address TEXT NOT NULL,
        coin_type TEXT NOT NULL,
        symbol TEXT,
        name TEXT,
        decimals INTEGER,
        balance TEXT NOT NULL DEFAULT '0',
        value_usd REAL,
        price_usd REAL,
        icon_url TEXT,
        metadata TEXT,
        last_updated_at INTEGER NOT NULL,
        UNIQUE(wallet_address, coin_type),
        FOREIGN KEY (wallet_address) REFERENCES wallets(address) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_wallet_assets_wallet ON wallet_assets(wallet_address)",
];

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database migrations completed successfully");
    Ok(())
}
