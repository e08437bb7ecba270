//! Token persistence.
//!
//! A [`TokenStore`] owns issued tokens once the enhancer pipeline is done with
//! them. [`RegistryTokenStore`] keeps opaque tokens (the value is the `jti`)
//! in an [`AuthorizationRegistry`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::AuthorizationRegistry;
use crate::token::revocation::TokenTypeHint;
use crate::types::{AccessToken, Authentication, RefreshToken};

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Loads the authentication a token was issued for.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGrant` if the token is unknown.
    async fn read_authentication(
        &self,
        value: &str,
        hint: TokenTypeHint,
    ) -> AuthResult<Authentication>;

    /// Loads an access token. Expired tokens are returned as-is.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGrant` if the token is unknown.
    async fn read_access_token(&self, value: &str) -> AuthResult<AccessToken>;

    /// Loads a refresh token. Expired tokens are returned as-is.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGrant` if the token is unknown.
    async fn read_refresh_token(&self, value: &str) -> AuthResult<RefreshToken>;

    /// Returns an already issued token that can be handed out again for
    /// `auth`, if the store supports reuse.
    async fn reusable_access_token(&self, auth: &Authentication)
    -> AuthResult<Option<AccessToken>>;

    /// Persists an access token. The returned token is what the client sees.
    async fn save_access_token(
        &self,
        token: AccessToken,
        auth: &Authentication,
    ) -> AuthResult<AccessToken>;

    async fn save_refresh_token(
        &self,
        token: RefreshToken,
        auth: &Authentication,
    ) -> AuthResult<RefreshToken>;

    /// Removes access tokens.
    ///
    /// With [`TokenTypeHint::AccessToken`] the single token is removed; with
    /// [`TokenTypeHint::RefreshToken`] every access token issued from that
    /// refresh token is removed.
    async fn remove_access_token(&self, value: &str, hint: TokenTypeHint) -> AuthResult<()>;

    async fn remove_refresh_token(&self, value: &str) -> AuthResult<()>;
}

// =============================================================================
// Registry Token Store
// =============================================================================

/// A token store backed by an [`AuthorizationRegistry`].
///
/// Tokens are opaque: the value handed to clients is the token's `jti`, and
/// everything else lives in the registry. Access tokens must carry claims.
pub struct RegistryTokenStore {
    registry: Arc<dyn AuthorizationRegistry>,
}

impl RegistryTokenStore {
    #[must_use]
    pub fn new(registry: Arc<dyn AuthorizationRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl TokenStore for RegistryTokenStore {
    async fn read_authentication(
        &self,
        value: &str,
        hint: TokenTypeHint,
    ) -> AuthResult<Authentication> {
        match hint {
            TokenTypeHint::AccessToken => self
                .registry
                .read_access_authorization(value)
                .await?
                .ok_or_else(|| AuthError::invalid_grant("access token unknown")),
            TokenTypeHint::RefreshToken => self
                .registry
                .read_stored_authorization(value)
                .await?
                .ok_or_else(|| AuthError::invalid_grant("refresh token unknown")),
        }
    }

    async fn read_access_token(&self, value: &str) -> AuthResult<AccessToken> {
        self.registry
            .find_access_token(value)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("access token unknown"))
    }

    async fn read_refresh_token(&self, value: &str) -> AuthResult<RefreshToken> {
        self.registry
            .find_refresh_token(value)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("refresh token unknown"))
    }

    async fn reusable_access_token(
        &self,
        _auth: &Authentication,
    ) -> AuthResult<Option<AccessToken>> {
        Ok(None)
    }

    async fn save_access_token(
        &self,
        token: AccessToken,
        auth: &Authentication,
    ) -> AuthResult<AccessToken> {
        if token.claims.is_none() {
            return Err(AuthError::internal(
                "access token has no claims; the basic claims enhancer must run before saving",
            ));
        }

        if let Some(refresh) = &token.refresh_token {
            if !self.registry.refresh_token_exists(&refresh.value).await? {
                self.registry.register_refresh_token(refresh, auth).await?;
            }
        }
        self.registry.register_access_token(&token, auth).await?;
        Ok(token)
    }

    async fn save_refresh_token(
        &self,
        token: RefreshToken,
        auth: &Authentication,
    ) -> AuthResult<RefreshToken> {
        self.registry.register_refresh_token(&token, auth).await?;
        Ok(token)
    }

    async fn remove_access_token(&self, value: &str, hint: TokenTypeHint) -> AuthResult<()> {
        match hint {
            TokenTypeHint::AccessToken => self.registry.revoke_access_token(value).await,
            TokenTypeHint::RefreshToken => self.registry.revoke_all_access_tokens(value).await,
        }
    }

    async fn remove_refresh_token(&self, value: &str) -> AuthResult<()> {
        self.registry.revoke_refresh_token(value).await
    }
}
