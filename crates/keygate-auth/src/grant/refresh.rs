use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::constants::{PARAM_CLIENT_SECRET, PARAM_REFRESH_TOKEN};
use crate::error::AuthError;
use crate::oauth::client_auth::AuthenticatedClient;
use crate::oauth::validation::validate_grant;
use crate::token::revocation::TokenTypeHint;
use crate::token::service::AuthorizationService;
use crate::token::store::TokenStore;
use crate::types::request::filter_parameters;
use crate::types::{AccessToken, GrantType, TokenRequest};

use super::permission::reduce_scope;
use super::{GrantOutcome, TokenGranter, handles, require_secret_authentication};

const IGNORED_PARAMETERS: &[&str] = &[PARAM_CLIENT_SECRET, PARAM_REFRESH_TOKEN];

/// Exchanges a refresh token for a new access token.
pub struct RefreshGranter {
    auth_service: Arc<dyn AuthorizationService>,
    token_store: Arc<dyn TokenStore>,
}

impl RefreshGranter {
    #[must_use]
    pub fn new(auth_service: Arc<dyn AuthorizationService>, token_store: Arc<dyn TokenStore>) -> Self {
        Self {
            auth_service,
            token_store,
        }
    }

    async fn refresh(
        &self,
        client: &AuthenticatedClient,
        request: &TokenRequest,
    ) -> AuthResult<AccessToken> {
        validate_grant(request, &client.client)?;
        require_secret_authentication(client)?;

        let value = request.parameter(PARAM_REFRESH_TOKEN).ok_or_else(|| {
            AuthError::invalid_token_request(format!("missing required parameter {PARAM_REFRESH_TOKEN}"))
        })?;
        let refresh_token = self.token_store.read_refresh_token(value).await?;
        if refresh_token.is_expired() {
            return Err(AuthError::invalid_grant("refresh token expired"));
        }

        let stored = self
            .token_store
            .read_authentication(value, TokenTypeHint::RefreshToken)
            .await?;
        if stored.request.client_id != client.client_id() {
            return Err(AuthError::invalid_grant(
                "refresh token was issued to another client",
            ));
        }

        let mut oauth_request = stored.request.clone();
        oauth_request.scopes = reduce_scope(&client.client, &stored.request, &request.scopes)?;
        oauth_request.grant_type = Some(GrantType::RefreshToken);
        oauth_request
            .parameters
            .extend(filter_parameters(&request.parameters, IGNORED_PARAMETERS));

        let auth = self
            .auth_service
            .create_authentication(&client.client, oauth_request, stored.user_auth)
            .await
            .map_err(AuthError::into_invalid_grant)?;
        self.auth_service
            .refresh_access_token(&client.client, &auth, refresh_token)
            .await
    }
}

#[async_trait]
impl TokenGranter for RefreshGranter {
    async fn grant(&self, client: &AuthenticatedClient, request: &TokenRequest) -> GrantOutcome {
        if !handles(request, GrantType::RefreshToken) {
            return GrantOutcome::NotApplicable;
        }
        self.refresh(client, request).await.into()
    }
}
