//! Consent records.

use async_trait::async_trait;
use dashmap::DashMap;
use keygate_auth::AuthResult;
use keygate_auth::storage::ApprovalStore;
use keygate_auth::types::Approval;

type ApprovalKey = (String, String);

/// Approvals grouped by `(username, client_id)`.
#[derive(Debug, Default)]
pub struct InMemoryApprovalStore {
    approvals: DashMap<ApprovalKey, Vec<Approval>>,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn save_approvals(&self, approvals: &[Approval]) -> AuthResult<()> {
        for approval in approvals {
            let key = (approval.username.clone(), approval.client_id.clone());
            let mut stored = self.approvals.entry(key).or_default();
            stored.retain(|a| a.scope != approval.scope);
            stored.push(approval.clone());
        }
        Ok(())
    }

    async fn load_approvals(&self, username: &str, client_id: &str) -> AuthResult<Vec<Approval>> {
        let key = (username.to_string(), client_id.to_string());
        Ok(self
            .approvals
            .get(&key)
            .map(|a| a.clone())
            .unwrap_or_default())
    }

    async fn delete_approvals(&self, username: &str, client_id: &str) -> AuthResult<()> {
        self.approvals
            .remove(&(username.to_string(), client_id.to_string()));
        Ok(())
    }
}
