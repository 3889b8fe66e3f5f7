//! Password hashing via salted SHA-256.
//!
//! Digests are deterministic so that the credential store can match on
//! `(identifier, digest)` directly. Sign-up, sign-in, reset, and password
//! change all go through the same hasher and salt.

use std::fmt;

use sha2::{Digest, Sha256};

/// One-way transform of a plaintext secret into a comparable digest.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, secret: &str) -> String;
}

/// Hash `secret` with a server-wide `salt`, returning a lowercase hex digest.
pub fn hash_password(secret: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-256 hasher bound to the configured salt.
#[derive(Clone)]
pub struct Sha256Hasher {
    salt: String,
}

impl Sha256Hasher {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }
}

impl fmt::Debug for Sha256Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sha256Hasher").finish_non_exhaustive()
    }
}

impl PasswordHasher for Sha256Hasher {
    fn hash(&self, secret: &str) -> String {
        hash_password(secret, &self.salt)
    }
}
