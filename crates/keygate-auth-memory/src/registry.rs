//! Issued tokens and the authentications behind them.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use keygate_auth::AuthResult;
use keygate_auth::constants::DETAILS_KEY_SESSION_ID;
use keygate_auth::storage::AuthorizationRegistry;
use keygate_auth::types::{AccessToken, Authentication, RefreshToken};
use time::OffsetDateTime;

#[derive(Debug, Clone)]
struct StoredAccess {
    token: AccessToken,
    auth: Authentication,
}

#[derive(Debug, Clone)]
struct StoredRefresh {
    token: RefreshToken,
    auth: Authentication,
}

fn session_id(auth: &Authentication) -> Option<&str> {
    auth.details
        .as_ref()
        .and_then(|d| d.session_id.as_deref())
        .or_else(|| {
            auth.user_auth
                .as_ref()
                .and_then(|u| u.details.get(DETAILS_KEY_SESSION_ID))
                .map(String::as_str)
        })
}

/// An [`AuthorizationRegistry`] held in `DashMap`s.
///
/// Access tokens are linked to the refresh token they were issued with, so
/// revoking "all access tokens of a refresh token" does not scan. Bulk
/// revocation by user, client or session scans both maps.
#[derive(Debug, Default)]
pub struct InMemoryAuthorizationRegistry {
    access: DashMap<String, StoredAccess>,
    refresh: DashMap<String, StoredRefresh>,
    /// Refresh token value to the access token values issued with it.
    refresh_links: DashMap<String, HashSet<String>>,
}

impl InMemoryAuthorizationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn access_token_count(&self) -> usize {
        self.access.len()
    }

    pub fn refresh_token_count(&self) -> usize {
        self.refresh.len()
    }

    /// Drops expired tokens and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let before = self.access.len() + self.refresh.len();
        self.access.retain(|_, stored| !stored.token.is_expired_at(now));
        self.refresh.retain(|_, stored| !stored.token.is_expired_at(now));
        self.refresh_links
            .retain(|_, links| {
                links.retain(|value| self.access.contains_key(value));
                !links.is_empty()
            });
        let removed = before.saturating_sub(self.access.len() + self.refresh.len());
        if removed > 0 {
            tracing::debug!(removed, "purged expired tokens");
        }
        removed
    }

    fn unlink(&self, token: &AccessToken) {
        let Some(refresh) = &token.refresh_token else {
            return;
        };
        if let Some(mut links) = self.refresh_links.get_mut(&refresh.value) {
            links.remove(&token.value);
        }
        self.refresh_links
            .remove_if(&refresh.value, |_, links| links.is_empty());
    }

    /// Access tokens still linked to `refresh_token`.
    pub fn linked_access_count(&self, refresh_token: &str) -> usize {
        self.refresh_links
            .get(refresh_token)
            .map_or(0, |links| links.len())
    }

    fn revoke_matching(
        &self,
        revoke_refresh_token: bool,
        matches: impl Fn(&Authentication) -> bool,
    ) -> usize {
        let mut revoked = 0;
        self.access.retain(|_, stored| {
            let keep = !matches(&stored.auth);
            if !keep {
                self.unlink(&stored.token);
                revoked += 1;
            }
            keep
        });
        if revoke_refresh_token {
            self.refresh.retain(|value, stored| {
                let keep = !matches(&stored.auth);
                if !keep {
                    self.refresh_links.remove(value);
                    revoked += 1;
                }
                keep
            });
        }
        revoked
    }
}

#[async_trait]
impl AuthorizationRegistry for InMemoryAuthorizationRegistry {
    async fn register_refresh_token(
        &self,
        token: &RefreshToken,
        auth: &Authentication,
    ) -> AuthResult<()> {
        self.refresh.insert(
            token.value.clone(),
            StoredRefresh {
                token: token.clone(),
                auth: auth.clone(),
            },
        );
        Ok(())
    }

    async fn register_access_token(
        &self,
        token: &AccessToken,
        auth: &Authentication,
    ) -> AuthResult<()> {
        if let Some(refresh) = &token.refresh_token {
            self.refresh_links
                .entry(refresh.value.clone())
                .or_default()
                .insert(token.value.clone());
        }
        self.access.insert(
            token.value.clone(),
            StoredAccess {
                token: token.clone(),
                auth: auth.clone(),
            },
        );
        Ok(())
    }

    async fn read_stored_authorization(
        &self,
        refresh_token: &str,
    ) -> AuthResult<Option<Authentication>> {
        Ok(self.refresh.get(refresh_token).map(|s| s.auth.clone()))
    }

    async fn read_access_authorization(
        &self,
        access_token: &str,
    ) -> AuthResult<Option<Authentication>> {
        Ok(self.access.get(access_token).map(|s| s.auth.clone()))
    }

    async fn find_access_token(&self, value: &str) -> AuthResult<Option<AccessToken>> {
        Ok(self.access.get(value).map(|s| s.token.clone()))
    }

    async fn find_refresh_token(&self, value: &str) -> AuthResult<Option<RefreshToken>> {
        Ok(self.refresh.get(value).map(|s| s.token.clone()))
    }

    async fn refresh_token_exists(&self, value: &str) -> AuthResult<bool> {
        Ok(self.refresh.contains_key(value))
    }

    async fn revoke_refresh_token(&self, value: &str) -> AuthResult<()> {
        self.refresh.remove(value);
        Ok(())
    }

    async fn revoke_access_token(&self, value: &str) -> AuthResult<()> {
        if let Some((_, stored)) = self.access.remove(value) {
            self.unlink(&stored.token);
        }
        Ok(())
    }

    async fn revoke_all_access_tokens(&self, refresh_token: &str) -> AuthResult<()> {
        if let Some((_, links)) = self.refresh_links.remove(refresh_token) {
            for value in links {
                self.access.remove(&value);
            }
        }
        Ok(())
    }

    async fn revoke_user_access(
        &self,
        username: &str,
        revoke_refresh_token: bool,
    ) -> AuthResult<()> {
        let revoked =
            self.revoke_matching(revoke_refresh_token, |auth| auth.username() == Some(username));
        tracing::debug!(username, revoked, "revoked user access");
        Ok(())
    }

    async fn revoke_client_access(
        &self,
        client_id: &str,
        revoke_refresh_token: bool,
    ) -> AuthResult<()> {
        let revoked =
            self.revoke_matching(revoke_refresh_token, |auth| auth.request.client_id == client_id);
        tracing::debug!(client_id, revoked, "revoked client access");
        Ok(())
    }

    async fn revoke_session_access(
        &self,
        session: &str,
        revoke_refresh_token: bool,
    ) -> AuthResult<()> {
        let revoked =
            self.revoke_matching(revoke_refresh_token, |auth| session_id(auth) == Some(session));
        tracing::debug!(session_id = session, revoked, "revoked session access");
        Ok(())
    }
}
