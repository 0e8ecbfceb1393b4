//! Configuration types for Herald.
//!
//! These types represent the validated runtime configuration used by the server
//! and can be shared across crates. The actual config loading/parsing is handled
//! by the server crate.

mod admin;
mod api_keys;
mod server;
mod worker;

pub use admin::AdminConfig;
pub use api_keys::ApiKeysConfig;
pub use server::ServerConfig;
pub use worker::WorkerConfig;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared configuration state with separate locks for each section.
///
/// This allows independent access to different configuration sections
/// without blocking other readers/writers.
#[derive(Clone)]
pub struct SharedConfig {
    /// Server configuration (listen address).
    pub server: Arc<RwLock<ServerConfig>>,
    /// Admin configuration (authentication).
    pub admin: Arc<RwLock<AdminConfig>>,
    /// Key used to hash API tokens.
    pub api_keys: Arc<RwLock<ApiKeysConfig>>,
    /// Task queue worker settings. Read once when the pool starts.
    pub worker: Arc<RwLock<WorkerConfig>>,
}
