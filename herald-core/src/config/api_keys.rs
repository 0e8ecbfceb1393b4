//! API-key hashing configuration.

use herald_sdk::api_key;

/// Holds the HMAC key under which bearer tokens are hashed.
///
/// Rotating the key invalidates every issued token.
#[derive(Clone)]
pub struct ApiKeysConfig {
    hash_key: Box<[u8]>,
}

impl ApiKeysConfig {
    pub fn new(hash_key: impl Into<Box<[u8]>>) -> Self {
        Self {
            hash_key: hash_key.into(),
        }
    }

    /// Hash a plaintext token for storage or lookup.
    pub fn hash_token(&self, token: &str) -> String {
        api_key::hash_token(token, &self.hash_key)
    }
}

impl std::fmt::Debug for ApiKeysConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeysConfig")
            .field("hash_key", &"<redacted>")
            .finish()
    }
}
