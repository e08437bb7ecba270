//! Client storage trait.
//!
//! Defines the interface for loading OAuth client registrations.
//! Implementations are provided by storage backends (e.g., `keygate-auth-memory`).

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::OAuth2Client;

// =============================================================================
// Client Store Trait
// =============================================================================

/// Read access to registered OAuth 2.0 clients.
///
/// # Example
///
/// ```ignore
/// use keygate_auth::storage::ClientStore;
///
/// async fn example(store: &impl ClientStore) {
///     if let Some(client) = store.load_client_by_client_id("my-app").await? {
///         println!("Found client: {}", client.client_id);
///     }
/// }
/// ```
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Load a client by its OAuth client_id.
    ///
    /// Returns `None` if the client doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn load_client_by_client_id(&self, client_id: &str) -> AuthResult<Option<OAuth2Client>>;
}
