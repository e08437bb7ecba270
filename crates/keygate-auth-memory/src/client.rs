//! Registered clients.

use async_trait::async_trait;
use dashmap::DashMap;
use keygate_auth::AuthResult;
use keygate_auth::storage::ClientStore;
use keygate_auth::types::OAuth2Client;

#[derive(Debug, Default)]
pub struct InMemoryClientStore {
    clients: DashMap<String, OAuth2Client>,
}

impl InMemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client, replacing any client with the same id.
    pub fn insert(&self, client: OAuth2Client) {
        self.clients.insert(client.client_id.clone(), client);
    }

    pub fn remove(&self, client_id: &str) -> Option<OAuth2Client> {
        self.clients.remove(client_id).map(|(_, client)| client)
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn load_client_by_client_id(&self, client_id: &str) -> AuthResult<Option<OAuth2Client>> {
        Ok(self.clients.get(client_id).map(|c| c.clone()))
    }
}
