use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::constants::{PARAM_CLIENT_SECRET, PARAM_PASSWORD, PARAM_USERNAME};
use crate::error::AuthError;
use crate::oauth::client_auth::{AuthenticatedClient, verify_secret};
use crate::oauth::validation::validate_grant;
use crate::storage::AccountStore;
use crate::token::service::AuthorizationService;
use crate::types::{AccessToken, GrantType, OAuth2Request, TokenRequest, UserAuthentication};

use super::{GrantOutcome, TokenGranter, handles, requested_scopes};

const IGNORED_PARAMETERS: &[&str] = &[PARAM_CLIENT_SECRET, PARAM_PASSWORD];

/// Resource owner password credentials.
pub struct PasswordGranter {
    auth_service: Arc<dyn AuthorizationService>,
    account_store: Arc<dyn AccountStore>,
}

impl PasswordGranter {
    #[must_use]
    pub fn new(
        auth_service: Arc<dyn AuthorizationService>,
        account_store: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            auth_service,
            account_store,
        }
    }

    async fn authenticate_user(&self, request: &TokenRequest) -> AuthResult<UserAuthentication> {
        let (Some(username), Some(password)) = (
            request.parameter(PARAM_USERNAME),
            request.parameter(PARAM_PASSWORD),
        ) else {
            return Err(AuthError::invalid_token_request(
                "username and password are required",
            ));
        };

        let account = self
            .account_store
            .load_account_by_username(username)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("bad credentials"))?;
        let verified = match &account.password_hash {
            Some(hash) => verify_secret(password, hash)?,
            None => false,
        };
        if !verified {
            return Err(AuthError::invalid_grant("bad credentials"));
        }
        if account.is_inactive() {
            return Err(AuthError::invalid_grant("user account is locked or disabled"));
        }

        Ok(UserAuthentication::authenticated(account.username).with_permissions(account.permissions))
    }

    async fn issue(
        &self,
        client: &AuthenticatedClient,
        request: &TokenRequest,
    ) -> AuthResult<AccessToken> {
        validate_grant(request, &client.client)?;
        let scopes = requested_scopes(&client.client, request)?;
        let user_auth = self.authenticate_user(request).await?;

        let mut oauth_request = OAuth2Request::from_token_request(client.client_id(), request, IGNORED_PARAMETERS);
        oauth_request.scopes = scopes;

        let auth = self
            .auth_service
            .create_authentication(&client.client, oauth_request, Some(user_auth))
            .await?;
        self.auth_service
            .create_access_token(&client.client, &auth)
            .await
    }
}

#[async_trait]
impl TokenGranter for PasswordGranter {
    async fn grant(&self, client: &AuthenticatedClient, request: &TokenRequest) -> GrantOutcome {
        if !handles(request, GrantType::Password) {
            return GrantOutcome::NotApplicable;
        }
        self.issue(client, request).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::test_support::{Engine, PASSWORD, client, engine};
    use crate::token::revocation::TokenTypeHint;
    use crate::token::store::TokenStore;

    fn granter(engine: &Engine) -> PasswordGranter {
        PasswordGranter::new(engine.service.clone(), engine.directory.clone())
    }

    fn login(username: &str, password: &str) -> TokenRequest {
        TokenRequest::new("c1", "password")
            .with_parameter(PARAM_USERNAME, username)
            .with_parameter(PARAM_PASSWORD, password)
    }

    #[tokio::test]
    async fn test_password_login() {
        let engine = engine();
        let client = AuthenticatedClient::authenticated(client());

        let token = granter(&engine)
            .issue(&client, &login("alice", PASSWORD).with_scopes(["read"]))
            .await
            .unwrap();
        assert_eq!(token.scopes, ["read".to_string()].into());
        assert!(token.refresh_token.is_some());

        let auth = engine
            .tokens
            .read_authentication(&token.value, TokenTypeHint::AccessToken)
            .await
            .unwrap();
        assert_eq!(auth.username(), Some("alice"));
        assert!(auth.request.parameter(PARAM_PASSWORD).is_none());
        assert!(auth.request.parameter(PARAM_USERNAME).is_some());
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let engine = engine();
        let client = AuthenticatedClient::authenticated(client());
        let granter = granter(&engine);

        let result = granter.issue(&client, &login("alice", "wrong")).await;
        assert!(matches!(result, Err(AuthError::InvalidGrant { .. })));

        let result = granter.issue(&client, &login("nobody", PASSWORD)).await;
        assert!(matches!(result, Err(AuthError::InvalidGrant { .. })));
    }

    #[tokio::test]
    async fn test_locked_account() {
        let engine = engine();
        let client = AuthenticatedClient::authenticated(client());

        let result = granter(&engine).issue(&client, &login("carol", PASSWORD)).await;
        assert!(matches!(result, Err(AuthError::InvalidGrant { .. })));
    }

    #[tokio::test]
    async fn test_request_for_another_client_is_rejected() {
        let engine = engine();
        let mut registered = client();
        registered.client_id = "c2".into();
        let client = AuthenticatedClient::authenticated(registered);

        let result = granter(&engine).issue(&client, &login("alice", PASSWORD)).await;
        assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let engine = engine();
        let client = AuthenticatedClient::authenticated(client());
        let request = TokenRequest::new("c1", "password").with_parameter(PARAM_USERNAME, "alice");

        let result = granter(&engine).issue(&client, &request).await;
        assert!(matches!(result, Err(AuthError::InvalidTokenRequest { .. })));
    }
}
