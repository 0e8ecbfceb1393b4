//! TOML file configuration structures.
//!
//! These structs directly map to the `herald-config.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub api_keys: ApiKeysConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// API key section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    /// HMAC key bearer tokens are hashed with. Changing it revokes every key.
    pub hash_key: String,
}

/// Task queue worker section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,
    #[serde(default = "default_max_retry")]
    pub max_retry: i32,
}

fn default_concurrency() -> usize {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_lease_secs() -> u64 {
    300
}

fn default_max_retry() -> i32 {
    3
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            lease_secs: default_lease_secs(),
            max_retry: default_max_retry(),
        }
    }
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[admin]
secret = "test-secret"

[api_keys]
hash_key = "0123456789abcdef"

[worker]
concurrency = 4
max_retry = 5
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.api_keys.hash_key, "0123456789abcdef");
        assert_eq!(config.worker.concurrency, 4);
        assert_eq!(config.worker.max_retry, 5);
        assert_eq!(config.worker.poll_interval_ms, 1000);
        assert_eq!(config.worker.lease_secs, 300);
        assert!(!config.is_admin_secret_hashed());
    }

    #[test]
    fn test_worker_section_is_optional() {
        let toml_str = r#"
[server]

[admin]
secret = "s"

[api_keys]
hash_key = "k"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.worker.concurrency, 10);
        assert_eq!(config.worker.max_retry, 3);
    }

    #[test]
    fn test_missing_hash_key_is_rejected() {
        let toml_str = r#"
[server]

[admin]
secret = "s"
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }

    #[test]
    fn test_hashed_secret_detection() {
        let config = FileConfig {
            server: ServerConfig {
                listen: default_listen_addr(),
            },
            admin: AdminConfig {
                secret: "$argon2id$v=19$m=19456,t=2,p=1$abc123".to_string(),
            },
            api_keys: ApiKeysConfig {
                hash_key: "k".to_string(),
            },
            worker: WorkerConfig::default(),
        };
        assert!(config.is_admin_secret_hashed());
    }
}
