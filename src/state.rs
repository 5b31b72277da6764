use crate::blockchain::Scanner;
use crate::cache::AppCache;
use crate::config::Config;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared by every handler. The scanner is the same instance the background
/// loop drives, so control requests act on the live cursor.
pub struct AppState {
    pub config: Config,
    pub db_pool: SqlitePool,
    pub cache: AppCache,
    pub scanner: Arc<Scanner>,
}
