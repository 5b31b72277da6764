pub mod client;
pub mod parser;
pub mod processor;
pub mod sanitizer;
pub mod scanner;
pub mod types;
pub mod wallet_aggregator;

// Re-exports for convenience
pub use client::{ChainClient, ClientError, SuiRpcClient};
pub use scanner::{ScanState, Scanner, ScannerError};
