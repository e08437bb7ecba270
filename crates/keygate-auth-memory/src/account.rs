//! Accounts and tenants.

use async_trait::async_trait;
use dashmap::DashMap;
use keygate_auth::AuthResult;
use keygate_auth::storage::{AccountStore, TenantStore};
use keygate_auth::types::{Account, Tenant};

/// Accounts keyed by username.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: DashMap<String, Account>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.username.clone(), account);
    }

    /// Applies `f` to the account, if present. Returns `false` if it is not.
    pub fn update(&self, username: &str, f: impl FnOnce(&mut Account)) -> bool {
        match self.accounts.get_mut(username) {
            Some(mut account) => {
                f(&mut account);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn load_account_by_username(&self, username: &str) -> AuthResult<Option<Account>> {
        Ok(self.accounts.get(username).map(|a| a.clone()))
    }

    async fn load_account_by_id(&self, id: &str) -> AuthResult<Option<Account>> {
        Ok(self
            .accounts
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.value().clone()))
    }
}

/// Tenants keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    tenants: DashMap<String, Tenant>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tenant: Tenant) {
        self.tenants.insert(tenant.id.clone(), tenant);
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn load_tenant_by_id(&self, id: &str) -> AuthResult<Option<Tenant>> {
        Ok(self.tenants.get(id).map(|t| t.clone()))
    }

    async fn load_tenant_by_external_id(&self, external_id: &str) -> AuthResult<Option<Tenant>> {
        Ok(self
            .tenants
            .iter()
            .find(|entry| entry.external_id.as_deref() == Some(external_id))
            .map(|entry| entry.value().clone()))
    }
}
