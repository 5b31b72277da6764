//! Read-only HTTP surface over the indexed tables, plus scanner controls.

pub mod error;
pub mod response;
pub mod route;

pub use error::ApiError;
pub use response::{with_total_count, ApiResponse};
pub use route::create_router;
