//! Access revocation.
//!
//! Revocation runs in phases: session records are deleted first, then the
//! tokens bound to them. A failing phase is logged and the next one still
//! runs, so a user is locked out even when the session store is unavailable.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::{AuthorizationRegistry, SessionStore};
use crate::token::store::TokenStore;

// =============================================================================
// Token Type Hint
// =============================================================================

/// Which kind of token a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTypeHint {
    AccessToken,
    RefreshToken,
}

impl TokenTypeHint {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }

    /// Parses a hint as sent by clients.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedTokenType` for anything but `access_token` and
    /// `refresh_token`.
    pub fn parse(value: &str) -> AuthResult<Self> {
        match value {
            "access_token" => Ok(Self::AccessToken),
            "refresh_token" => Ok(Self::RefreshToken),
            other => Err(AuthError::unsupported_token_type(format!(
                "unsupported token type hint: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for TokenTypeHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Access Revoker
// =============================================================================

#[async_trait]
pub trait AccessRevoker: Send + Sync {
    /// Deletes a login session and every token bound to it.
    async fn revoke_with_session_id(&self, session_id: &str, session_name: &str)
    -> AuthResult<()>;

    /// Deletes all sessions of a user and revokes their tokens.
    async fn revoke_with_username(&self, username: &str, revoke_refresh_token: bool)
    -> AuthResult<()>;

    /// Revokes every token issued to a client.
    async fn revoke_with_client_id(
        &self,
        client_id: &str,
        revoke_refresh_token: bool,
    ) -> AuthResult<()>;

    /// Revokes a single token.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedTokenType` if `hint` is not a known token type.
    async fn revoke_with_token_value(&self, value: &str, hint: &str) -> AuthResult<()>;
}

/// Revokes through the session store, the registry and the token store.
pub struct DefaultAccessRevoker {
    registry: Arc<dyn AuthorizationRegistry>,
    session_store: Arc<dyn SessionStore>,
    token_store: Arc<dyn TokenStore>,
}

impl DefaultAccessRevoker {
    #[must_use]
    pub fn new(
        registry: Arc<dyn AuthorizationRegistry>,
        session_store: Arc<dyn SessionStore>,
        token_store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            registry,
            session_store,
            token_store,
        }
    }

    async fn delete_session(&self, session_id: &str) {
        if let Err(e) = self.session_store.delete_session(session_id).await {
            tracing::warn!(session_id, error = %e, "failed to delete session during revocation");
        }
    }
}

#[async_trait]
impl AccessRevoker for DefaultAccessRevoker {
    async fn revoke_with_session_id(
        &self,
        session_id: &str,
        session_name: &str,
    ) -> AuthResult<()> {
        self.delete_session(session_id).await;
        self.registry.revoke_session_access(session_id, true).await?;
        tracing::info!(session_id, session_name, "revoked session access");
        Ok(())
    }

    async fn revoke_with_username(
        &self,
        username: &str,
        revoke_refresh_token: bool,
    ) -> AuthResult<()> {
        match self.session_store.find_by_principal_name(username).await {
            Ok(sessions) => {
                for session in sessions {
                    self.delete_session(&session.id).await;
                }
            }
            Err(e) => {
                tracing::warn!(username, error = %e, "failed to look up sessions during revocation");
            }
        }

        self.registry
            .revoke_user_access(username, revoke_refresh_token)
            .await?;
        tracing::info!(username, revoke_refresh_token, "revoked user access");
        Ok(())
    }

    async fn revoke_with_client_id(
        &self,
        client_id: &str,
        revoke_refresh_token: bool,
    ) -> AuthResult<()> {
        self.registry
            .revoke_client_access(client_id, revoke_refresh_token)
            .await?;
        tracing::info!(client_id, revoke_refresh_token, "revoked client access");
        Ok(())
    }

    async fn revoke_with_token_value(&self, value: &str, hint: &str) -> AuthResult<()> {
        match TokenTypeHint::parse(hint)? {
            TokenTypeHint::AccessToken => {
                self.token_store
                    .remove_access_token(value, TokenTypeHint::AccessToken)
                    .await?;
            }
            TokenTypeHint::RefreshToken => {
                self.token_store.remove_refresh_token(value).await?;
            }
        }
        tracing::info!(hint, "revoked token");
        Ok(())
    }
}
