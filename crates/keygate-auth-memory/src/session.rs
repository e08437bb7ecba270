//! Login sessions.

use async_trait::async_trait;
use dashmap::DashMap;
use keygate_auth::AuthResult;
use keygate_auth::storage::SessionStore;
use keygate_auth::types::Session;

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn delete_session(&self, session_id: &str) -> AuthResult<()> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn find_by_principal_name(&self, principal_name: &str) -> AuthResult<Vec<Session>> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| entry.principal_name == principal_name)
            .map(|entry| entry.value().clone())
            .collect())
    }
}
