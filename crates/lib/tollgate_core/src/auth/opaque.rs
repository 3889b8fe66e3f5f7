//! Opaque random tokens for confirmation, reset, and refresh use.
//!
//! These carry no payload; their meaning lives in the credential store row,
//! which is keyed by the token's SHA-256 digest rather than the token itself.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::{RngCore, rng};
use sha2::{Digest, Sha256};

/// Shortest token length accepted by `AuthSettings::validate`.
pub const MIN_TOKEN_BYTES: usize = 24;

/// Generate `byte_len` cryptographically random bytes, URL-safe base64 encoded.
pub fn generate_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash a token for storage.
pub fn digest_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
