//! Account and tenant lookups.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::{Account, Tenant};

/// Read access to user accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Load an account by username.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn load_account_by_username(&self, username: &str) -> AuthResult<Option<Account>>;

    /// Load an account by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn load_account_by_id(&self, id: &str) -> AuthResult<Option<Account>>;
}

/// Read access to tenants.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn load_tenant_by_id(&self, id: &str) -> AuthResult<Option<Tenant>>;

    async fn load_tenant_by_external_id(&self, external_id: &str) -> AuthResult<Option<Tenant>>;
}
