//! In-memory storage backend for keygate-auth.
//!
//! This crate implements every storage trait of `keygate_auth::storage` on
//! top of `dashmap`, for tests, demos and single-instance deployments.
//!
//! # Example
//!
//! ```ignore
//! use keygate_auth_memory::MemoryBackend;
//!
//! let backend = MemoryBackend::new();
//! backend.clients.insert(client);
//! let token_store = backend.token_store();
//! ```

pub mod account;
pub mod approval;
pub mod client;
pub mod kv;
pub mod registry;
pub mod session;

use std::sync::Arc;

use keygate_auth::token::RegistryTokenStore;

pub use account::{InMemoryAccountStore, InMemoryTenantStore};
pub use approval::InMemoryApprovalStore;
pub use client::InMemoryClientStore;
pub use kv::InMemoryKeyValueStore;
pub use registry::InMemoryAuthorizationRegistry;
pub use session::InMemorySessionStore;

/// One instance of every in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    pub clients: Arc<InMemoryClientStore>,
    pub accounts: Arc<InMemoryAccountStore>,
    pub tenants: Arc<InMemoryTenantStore>,
    pub sessions: Arc<InMemorySessionStore>,
    pub approvals: Arc<InMemoryApprovalStore>,
    pub key_values: Arc<InMemoryKeyValueStore>,
    pub registry: Arc<InMemoryAuthorizationRegistry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token store over this backend's registry.
    pub fn token_store(&self) -> Arc<RegistryTokenStore> {
        Arc::new(RegistryTokenStore::new(self.registry.clone()))
    }

    /// Drops expired codes and tokens.
    pub fn purge_expired(&self) -> usize {
        self.key_values.purge_expired() + self.registry.purge_expired()
    }
}
