//! Application state shared across all request handlers.

use herald_core::config::SharedConfig;
use herald_core::framework::DatabaseProcessor;
use herald_core::queue::TaskQueue;
use sqlx::PgPool;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Runtime configuration (can be reloaded via SIGHUP).
    pub config: SharedConfig,
    /// Durable task queue shared with the in-process worker pool.
    pub queue: TaskQueue,
}

impl AppState {
    pub fn new(db: PgPool, config: SharedConfig, queue: TaskQueue) -> Self {
        Self { db, config, queue }
    }

    pub fn processor(&self) -> DatabaseProcessor {
        DatabaseProcessor {
            pool: self.db.clone(),
        }
    }
}
