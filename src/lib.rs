pub mod api;
pub mod blockchain;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod state;
pub mod validation;

#[cfg(test)]
pub mod tests;

// Re-export specific items for convenience
pub use api::error::ApiError;
pub use api::response::ApiResponse;
pub use api::route::create_router;
pub use blockchain::{ChainClient, Scanner, SuiRpcClient};
pub use config::{Config, NetworkConfig};
pub use db::connection::establish_connection;
pub use validation::{validate_digest, validate_sui_address};
