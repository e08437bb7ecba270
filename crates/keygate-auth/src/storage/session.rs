//! Session storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Session;

/// The subset of session management the revoker needs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Delete a session by id. Deleting an unknown session is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_session(&self, session_id: &str) -> AuthResult<()>;

    /// Find all sessions of a principal.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_principal_name(&self, principal_name: &str) -> AuthResult<Vec<Session>>;
}
