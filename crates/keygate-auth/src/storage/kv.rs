//! Generic key-value storage with expiry.
//!
//! Backs short-lived artifacts such as authorization codes.

use std::time::Duration;

use async_trait::async_trait;

use crate::AuthResult;

/// A string key-value store with per-key TTL.
///
/// Implementations must make `delete` atomic per key: when two callers
/// delete the same key concurrently, exactly one of them observes `true`.
/// One-time authorization codes depend on this to reject a second redemption.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store a value that expires after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> AuthResult<()>;

    /// Get a value. Expired keys are reported as missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;

    /// Delete a key.
    ///
    /// Returns `true` if this call removed a live key.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, key: &str) -> AuthResult<bool>;
}
