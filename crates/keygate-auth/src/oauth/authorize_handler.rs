//! Responses to an approved authorize request.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::AuthResult;
use crate::constants::DETAILS_KEY_SESSION_ID;
use crate::error::AuthError;
use crate::oauth::authorize::{ResponseMode, build_redirect_url};
use crate::oauth::code_store::AuthorizationCodeStore;
use crate::oauth::validation::validate_approval;
use crate::storage::ApprovalStore;
use crate::token::service::AuthorizationService;
use crate::types::{Approval, AuthorizeRequest, GrantType, OAuth2Client, UserAuthentication};
use crate::types::token::fields;

/// Turns a processed and user-approved authorize request into the redirect
/// the user agent is sent to.
pub struct AuthorizeApprovalHandler {
    code_store: Arc<dyn AuthorizationCodeStore>,
    auth_service: Arc<dyn AuthorizationService>,
    approval_store: Option<Arc<dyn ApprovalStore>>,
}

impl AuthorizeApprovalHandler {
    #[must_use]
    pub fn new(
        code_store: Arc<dyn AuthorizationCodeStore>,
        auth_service: Arc<dyn AuthorizationService>,
    ) -> Self {
        Self {
            code_store,
            auth_service,
            approval_store: None,
        }
    }

    #[must_use]
    pub fn with_approval_store(mut self, approval_store: Arc<dyn ApprovalStore>) -> Self {
        self.approval_store = Some(approval_store);
        self
    }

    /// Completes an authorize request the user has answered.
    ///
    /// The request must have been through
    /// [`AuthorizeRequestProcessor::process`](super::AuthorizeRequestProcessor::process).
    /// The returned URL carries either `code` in its query or an access token
    /// in its fragment.
    ///
    /// # Errors
    ///
    /// Returns `AccessRejected` if no scope was approved,
    /// `UnauthorizedClient` if the client may not use the grant behind the
    /// response type and `InvalidResponseType` for a response type this
    /// handler cannot answer.
    pub async fn handle_approved(
        &self,
        request: &mut AuthorizeRequest,
        mut user_auth: UserAuthentication,
        session_id: Option<&str>,
    ) -> AuthResult<String> {
        let client = request
            .context
            .authenticated_client
            .clone()
            .ok_or_else(|| AuthError::invalid_authorize_request("authorize request was not processed"))?;
        let redirect_uri = request
            .context
            .resolved_redirect_uri
            .clone()
            .ok_or_else(|| AuthError::invalid_authorize_request("authorize request was not processed"))?;

        let grant = response_grant(request)?;
        if !client.is_grant_type_allowed(grant) {
            return Err(AuthError::unauthorized_client(format!(
                "client [{}] is not allowed to use grant type [{grant}]",
                client.client_id
            )));
        }

        let requested = request.scopes.clone();
        request.scopes = validate_approval(request, &client)?;
        request.approved = true;

        if let Some(session_id) = session_id {
            user_auth
                .details
                .insert(DETAILS_KEY_SESSION_ID.to_string(), session_id.to_string());
        }
        self.save_approvals(&client, &user_auth, request, &requested).await;

        let state = request.context.resolved_state.clone();
        if grant == GrantType::Implicit {
            return self
                .implicit_redirect(&client, request, user_auth, &redirect_uri, state.as_deref())
                .await;
        }

        let code = self
            .code_store
            .generate_authorization_code(request, &user_auth)
            .await?;
        let mut params = vec![("code", code.as_str())];
        if let Some(state) = &state {
            params.push(("state", state));
        }
        build_redirect_url(&redirect_uri, ResponseMode::Query, &params)
    }

    async fn implicit_redirect(
        &self,
        client: &OAuth2Client,
        request: &AuthorizeRequest,
        user_auth: UserAuthentication,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> AuthResult<String> {
        let auth = self
            .auth_service
            .create_authentication(client, request.to_oauth2_request(), Some(user_auth))
            .await?;
        let token = self.auth_service.create_access_token(client, &auth).await?;

        let expires_in = token
            .expires_in(OffsetDateTime::now_utc())
            .map(|s| s.to_string());
        let scope = token
            .scopes
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        let mut params = vec![
            (fields::ACCESS_TOKEN, token.value.as_str()),
            (fields::TOKEN_TYPE, token.token_type.as_str()),
        ];
        if let Some(expires_in) = &expires_in {
            params.push((fields::EXPIRES_IN, expires_in));
        }
        if !scope.is_empty() {
            params.push((fields::SCOPE, &scope));
        }
        if let Some(state) = state {
            params.push(("state", state));
        }
        build_redirect_url(redirect_uri, ResponseMode::Fragment, &params)
    }

    /// Consent is remembered on a best-effort basis; a storage failure does
    /// not fail the authorization.
    async fn save_approvals(
        &self,
        client: &OAuth2Client,
        user_auth: &UserAuthentication,
        request: &AuthorizeRequest,
        requested: &std::collections::BTreeSet<String>,
    ) {
        let Some(store) = &self.approval_store else {
            return;
        };
        let approvals: Vec<Approval> = requested
            .iter()
            .map(|scope| Approval {
                username: user_auth.principal.clone(),
                client_id: client.client_id.clone(),
                scope: scope.clone(),
                approved: request.scopes.contains(scope),
                expires_at: None,
            })
            .collect();
        if let Err(e) = store.save_approvals(&approvals).await {
            tracing::warn!(
                client_id = %client.client_id,
                username = %user_auth.principal,
                error = %e,
                "failed to save approvals"
            );
        }
    }
}

/// The grant a response type is answered with. `token` wins over `code`.
fn response_grant(request: &AuthorizeRequest) -> AuthResult<GrantType> {
    if request.response_types.contains("token") {
        Ok(GrantType::Implicit)
    } else if request.response_types.contains("code") {
        Ok(GrantType::AuthorizationCode)
    } else {
        Err(AuthError::invalid_response_type(format!(
            "unsupported response types: {}",
            request
                .response_types
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        )))
    }
}
