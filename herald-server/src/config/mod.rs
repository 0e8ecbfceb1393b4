//! Configuration module for herald-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables. Also handles admin secret hashing.

pub mod file;

use crate::config::file::FileConfig;
use herald_core::config::{AdminConfig, ApiKeysConfig, ServerConfig, SharedConfig, WorkerConfig};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub api_keys: ApiKeysConfig,
    pub worker: WorkerConfig,
}

impl LoadedConfig {
    /// Convert into a SharedConfig with Arc<RwLock<T>> wrappers.
    pub fn into_shared(self) -> SharedConfig {
        SharedConfig {
            server: Arc::new(RwLock::new(self.server)),
            admin: Arc::new(RwLock::new(self.admin)),
            api_keys: Arc::new(RwLock::new(self.api_keys)),
            worker: Arc::new(RwLock::new(self.worker)),
        }
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 5. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        validate(&file_config)?;

        let secret_hash = if file_config.is_admin_secret_hashed() {
            file_config.admin.secret.clone()
        } else {
            let hash = hash_secret(&file_config.admin.secret)?;
            file_config.admin.secret = hash.clone();
            // The override is not persisted.
            self.rewrite_config(&file_config)?;
            tracing::info!("Admin secret hashed and config file updated");
            hash
        };

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        Ok(build_loaded_config(file_config, secret_hash))
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.admin.secret.is_empty() {
        return Err(ConfigError::ValidationError(
            "admin secret must not be empty".to_string(),
        ));
    }
    if config.api_keys.hash_key.len() < 16 {
        return Err(ConfigError::ValidationError(
            "api_keys.hash_key must be at least 16 bytes".to_string(),
        ));
    }
    if config.worker.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "worker.concurrency must be at least 1".to_string(),
        ));
    }
    if config.worker.poll_interval_ms == 0 || config.worker.lease_secs == 0 {
        return Err(ConfigError::ValidationError(
            "worker.poll_interval_ms and worker.lease_secs must be positive".to_string(),
        ));
    }
    if config.worker.max_retry < 0 {
        return Err(ConfigError::ValidationError(
            "worker.max_retry must not be negative".to_string(),
        ));
    }
    Ok(())
}

fn hash_secret(plaintext: &str) -> Result<String, ConfigError> {
    use argon2::{
        Argon2, PasswordHasher,
        password_hash::{SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ConfigError::HashError(e.to_string()))
}

fn build_loaded_config(file_config: FileConfig, secret_hash: String) -> LoadedConfig {
    let worker = file_config.worker;
    LoadedConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
        },
        admin: AdminConfig::new(secret_hash),
        api_keys: ApiKeysConfig::new(file_config.api_keys.hash_key.into_bytes()),
        worker: WorkerConfig {
            concurrency: worker.concurrency,
            poll_interval: Duration::from_millis(worker.poll_interval_ms),
            lease: Duration::from_secs(worker.lease_secs),
            max_retry: worker.max_retry,
        },
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[server]
listen = "127.0.0.1:3000"

[admin]
secret = "plaintext-secret"

[api_keys]
hash_key = "0123456789abcdef0123"
"#;

    fn temp_config_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("herald-{}-{name}.toml", std::process::id()))
    }

    #[test]
    fn test_load_hashes_plaintext_secret_and_rewrites_file() {
        let path = temp_config_path("hash");
        std::fs::write(&path, CONFIG).unwrap();

        let loader = ConfigLoader::new(&path, None);
        let loaded = loader.load().unwrap();
        assert!(loaded.admin.verify_secret("plaintext-secret"));
        assert_eq!(loaded.worker, WorkerConfig::default());

        let rewritten: FileConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(rewritten.is_admin_secret_hashed());

        // A second load keeps the stored hash.
        let reloaded = loader.reload().unwrap();
        assert_eq!(reloaded.admin.secret_hash, rewritten.admin.secret);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_listen_override_wins() {
        let path = temp_config_path("listen");
        std::fs::write(&path, CONFIG).unwrap();

        let listen: SocketAddr = "0.0.0.0:9999".parse().unwrap();
        let loaded = ConfigLoader::new(&path, Some(listen)).load().unwrap();
        assert_eq!(loaded.server.listen, listen);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_short_hash_key_is_rejected() {
        let config: FileConfig = toml::from_str(
            r#"
[server]
[admin]
secret = "s"
[api_keys]
hash_key = "short"
"#,
        )
        .unwrap();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
