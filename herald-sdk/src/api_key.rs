//! API-key tokens.
//!
//! Tenants authenticate with a bearer token:
//!
//! ```text
//! Authorization: Bearer hrld_{base64_random}
//! ```
//!
//! The server never stores the token itself, only
//! `HMAC-SHA256(token, hash_key)`, so a leaked database cannot be replayed
//! against the API without the server's hash key.

/// Header carrying the bearer token.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Header name for admin API authentication (plaintext secret).
pub const ADMIN_AUTH_HEADER: &str = "Herald-Admin-Authorization";

/// Prefix of every generated token.
pub const TOKEN_PREFIX: &str = "hrld_";

const BEARER_PREFIX: &str = "Bearer ";

/// Generate a new random API token.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    format!(
        "{TOKEN_PREFIX}{}",
        fast32::base64::RFC4648_NOPAD.encode(&bytes)
    )
}

/// Hash a token for storage and lookup: `HMAC-SHA256(token, key)`.
pub fn hash_token(token: &str, key: &[u8]) -> String {
    let tag = ring::hmac::sign(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        token.as_bytes(),
    );
    fast32::base64::RFC4648_NOPAD.encode(tag.as_ref())
}

/// Extract the token from an `Authorization: Bearer ...` header value.
pub fn parse_bearer(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
