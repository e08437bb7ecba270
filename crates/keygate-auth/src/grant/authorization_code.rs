use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::constants::{
    PARAM_AUTH_CODE, PARAM_CLIENT_SECRET, PARAM_CODE_CHALLENGE, PARAM_CODE_CHALLENGE_METHOD,
    PARAM_CODE_VERIFIER, PARAM_REDIRECT_URI, PARAM_SCOPE,
};
use crate::error::AuthError;
use crate::oauth::client_auth::AuthenticatedClient;
use crate::oauth::code_store::AuthorizationCodeStore;
use crate::oauth::pkce::verify_stored_request;
use crate::oauth::validation::validate_grant;
use crate::token::service::AuthorizationService;
use crate::types::request::filter_parameters;
use crate::types::{AccessToken, GrantType, OAuth2Request, TokenRequest};

use super::{GrantOutcome, TokenGranter, handles, require_secret_authentication};

/// Token request parameters that never reach the issued authentication.
const IGNORED_PARAMETERS: &[&str] = &[
    PARAM_SCOPE,
    PARAM_CLIENT_SECRET,
    PARAM_CODE_VERIFIER,
    PARAM_CODE_CHALLENGE,
    PARAM_CODE_CHALLENGE_METHOD,
];

/// Redeems authorization codes.
pub struct AuthorizationCodeGranter {
    auth_service: Arc<dyn AuthorizationService>,
    code_store: Arc<dyn AuthorizationCodeStore>,
}

impl AuthorizationCodeGranter {
    #[must_use]
    pub fn new(
        auth_service: Arc<dyn AuthorizationService>,
        code_store: Arc<dyn AuthorizationCodeStore>,
    ) -> Self {
        Self {
            auth_service,
            code_store,
        }
    }

    async fn redeem(
        &self,
        client: &AuthenticatedClient,
        request: &TokenRequest,
    ) -> AuthResult<AccessToken> {
        validate_grant(request, &client.client)?;
        require_secret_authentication(client)?;

        let code = request.parameter(PARAM_AUTH_CODE).ok_or_else(|| {
            AuthError::invalid_token_request(format!("missing required parameter {PARAM_AUTH_CODE}"))
        })?;
        let stored = self.code_store.consume_authorization_code(code, true).await?;
        let Some(user_auth) = stored.user_auth.clone() else {
            return Err(AuthError::invalid_grant("original authorize request is invalid"));
        };
        if !stored.request.approved {
            return Err(AuthError::invalid_grant("original authorize request is invalid"));
        }

        verify_stored_request(&stored.request, request.parameter(PARAM_CODE_VERIFIER))?;
        validate_redirect_uri(&stored.request, request)?;
        if stored.request.client_id != client.client_id() {
            return Err(AuthError::invalid_grant("client ID mismatch"));
        }

        let merged = merge_request(stored.request, request);
        let auth = self
            .auth_service
            .create_authentication(&client.client, merged, Some(user_auth))
            .await
            .map_err(AuthError::into_invalid_grant)?;
        self.auth_service
            .create_access_token(&client.client, &auth)
            .await
            .map_err(AuthError::into_invalid_grant)
    }
}

/// A redirect URI sent with the authorize request must be repeated verbatim.
/// One implied from the client registration needs no repetition.
fn validate_redirect_uri(stored: &OAuth2Request, request: &TokenRequest) -> AuthResult<()> {
    let Some(original) = stored.parameter(PARAM_REDIRECT_URI) else {
        return Ok(());
    };
    match request.parameters.get(PARAM_REDIRECT_URI) {
        None => Err(AuthError::invalid_token_request(
            "redirect_uri is required because one was sent when obtaining the code",
        )),
        Some(presented) if presented != original => Err(AuthError::invalid_grant(
            "redirect_uri does not match the one used when obtaining the code",
        )),
        Some(_) => Ok(()),
    }
}

fn merge_request(mut stored: OAuth2Request, request: &TokenRequest) -> OAuth2Request {
    stored.grant_type = Some(GrantType::AuthorizationCode);
    stored
        .parameters
        .extend(filter_parameters(&request.parameters, IGNORED_PARAMETERS));
    stored.extensions.extend(
        request
            .extensions
            .iter()
            .filter(|(k, _)| !IGNORED_PARAMETERS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    stored
}

#[async_trait]
impl TokenGranter for AuthorizationCodeGranter {
    async fn grant(&self, client: &AuthenticatedClient, request: &TokenRequest) -> GrantOutcome {
        if !handles(request, GrantType::AuthorizationCode) {
            return GrantOutcome::NotApplicable;
        }
        self.redeem(client, request).await.into()
    }
}
