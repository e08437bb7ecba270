use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::constants::PARAM_CLIENT_SECRET;
use crate::oauth::client_auth::AuthenticatedClient;
use crate::oauth::validation::validate_grant;
use crate::token::service::AuthorizationService;
use crate::types::{AccessToken, GrantType, OAuth2Request, TokenRequest};

use super::{GrantOutcome, TokenGranter, handles, requested_scopes};

/// Issues client-only tokens. No user is involved.
pub struct ClientCredentialsGranter {
    auth_service: Arc<dyn AuthorizationService>,
}

impl ClientCredentialsGranter {
    #[must_use]
    pub fn new(auth_service: Arc<dyn AuthorizationService>) -> Self {
        Self { auth_service }
    }

    async fn issue(
        &self,
        client: &AuthenticatedClient,
        request: &TokenRequest,
    ) -> AuthResult<AccessToken> {
        validate_grant(request, &client.client)?;

        let mut oauth_request = OAuth2Request::from_token_request(client.client_id(), request, &[PARAM_CLIENT_SECRET]);
        oauth_request.scopes = requested_scopes(&client.client, request)?;

        let auth = self
            .auth_service
            .create_authentication(&client.client, oauth_request, None)
            .await?;
        self.auth_service
            .create_access_token(&client.client, &auth)
            .await
    }
}

#[async_trait]
impl TokenGranter for ClientCredentialsGranter {
    async fn grant(&self, client: &AuthenticatedClient, request: &TokenRequest) -> GrantOutcome {
        if !handles(request, GrantType::ClientCredentials) {
            return GrantOutcome::NotApplicable;
        }
        self.issue(client, request).await.into()
    }
}
