//! Consent record storage.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Approval;

/// Persists per-user, per-client scope approvals.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Save approvals, replacing earlier decisions for the same scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn save_approvals(&self, approvals: &[Approval]) -> AuthResult<()>;

    /// Load all approvals a user gave to a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn load_approvals(&self, username: &str, client_id: &str) -> AuthResult<Vec<Approval>>;

    /// Delete all approvals a user gave to a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_approvals(&self, username: &str, client_id: &str) -> AuthResult<()>;
}
