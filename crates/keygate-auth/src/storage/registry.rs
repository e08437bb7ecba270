//! Authorization registry trait.
//!
//! The registry remembers which authentication every issued token belongs to
//! and indexes tokens by refresh token, user, client and session so they can
//! be revoked in bulk.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::{AccessToken, Authentication, RefreshToken};

#[async_trait]
pub trait AuthorizationRegistry: Send + Sync {
    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Register a refresh token and the authentication it was issued for.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn register_refresh_token(
        &self,
        token: &RefreshToken,
        auth: &Authentication,
    ) -> AuthResult<()>;

    /// Register an access token and the authentication it was issued for.
    ///
    /// If the token carries a refresh token, the access token is linked to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn register_access_token(
        &self,
        token: &AccessToken,
        auth: &Authentication,
    ) -> AuthResult<()>;

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Load the authentication stored for a refresh token.
    async fn read_stored_authorization(
        &self,
        refresh_token: &str,
    ) -> AuthResult<Option<Authentication>>;

    /// Load the authentication stored for an access token.
    async fn read_access_authorization(
        &self,
        access_token: &str,
    ) -> AuthResult<Option<Authentication>>;

    async fn find_access_token(&self, value: &str) -> AuthResult<Option<AccessToken>>;

    async fn find_refresh_token(&self, value: &str) -> AuthResult<Option<RefreshToken>>;

    async fn refresh_token_exists(&self, value: &str) -> AuthResult<bool>;

    // -------------------------------------------------------------------------
    // Revocation
    // -------------------------------------------------------------------------

    /// Revoke a refresh token. Access tokens issued from it stay valid.
    async fn revoke_refresh_token(&self, value: &str) -> AuthResult<()>;

    async fn revoke_access_token(&self, value: &str) -> AuthResult<()>;

    /// Revoke every access token issued from a refresh token.
    async fn revoke_all_access_tokens(&self, refresh_token: &str) -> AuthResult<()>;

    /// Revoke every access token of a user, and optionally their refresh tokens.
    async fn revoke_user_access(&self, username: &str, revoke_refresh_token: bool)
    -> AuthResult<()>;

    /// Revoke every access token of a client, and optionally its refresh tokens.
    async fn revoke_client_access(
        &self,
        client_id: &str,
        revoke_refresh_token: bool,
    ) -> AuthResult<()>;

    /// Revoke every token bound to a login session.
    async fn revoke_session_access(
        &self,
        session_id: &str,
        revoke_refresh_token: bool,
    ) -> AuthResult<()>;
}
