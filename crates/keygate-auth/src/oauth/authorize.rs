//! Authorization endpoint request processing.
//!
//! # Flow
//!
//! 1. The transport parses query parameters into an [`AuthorizeRequest`]
//! 2. [`AuthorizeRequestProcessor::process`] validates it against the server
//!    and the client registration
//! 3. The user approves, and the
//!    [`AuthorizeApprovalHandler`](super::AuthorizeApprovalHandler) issues a
//!    code or an implicit token
//!
//! Validation writes the resolved client, redirect URI and state into
//! [`AuthorizeRequest::context`] as it goes, so a failure at a later step can
//! still be redirected back to the client with [`AuthorizationErrorResponse`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::AuthResult;
use crate::config::AuthServerConfig;
use crate::error::AuthError;
use crate::oauth::redirect::RedirectUriMatcherCache;
use crate::oauth::validation::{
    first_not_in, load_and_validate_client_id, resolve_redirect_uri,
};
use crate::storage::ClientStore;
use crate::types::AuthorizeRequest;

/// Validates inbound authorization requests.
#[async_trait]
pub trait AuthorizeRequestProcessor: Send + Sync {
    /// Validates the request in place.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    async fn process(&self, request: &mut AuthorizeRequest) -> AuthResult<()>;
}

/// The standard authorize request validation chain.
pub struct DefaultAuthorizeRequestProcessor {
    config: Arc<AuthServerConfig>,
    client_store: Arc<dyn ClientStore>,
    matchers: Arc<RedirectUriMatcherCache>,
}

impl DefaultAuthorizeRequestProcessor {
    #[must_use]
    pub fn new(config: Arc<AuthServerConfig>, client_store: Arc<dyn ClientStore>) -> Self {
        Self {
            config,
            client_store,
            matchers: Arc::new(RedirectUriMatcherCache::new()),
        }
    }

    /// Shares a matcher cache with other components.
    #[must_use]
    pub fn with_matcher_cache(mut self, matchers: Arc<RedirectUriMatcherCache>) -> Self {
        self.matchers = matchers;
        self
    }

    fn validate_response_types(&self, request: &AuthorizeRequest) -> AuthResult<()> {
        if request.response_types.is_empty() {
            return Err(AuthError::invalid_response_type("missing response_type"));
        }
        match request
            .response_types
            .iter()
            .find(|t| !self.config.supports_response_type(t))
        {
            Some(unsupported) => Err(AuthError::invalid_response_type(format!(
                "unsupported response type: {unsupported}"
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AuthorizeRequestProcessor for DefaultAuthorizeRequestProcessor {
    async fn process(&self, request: &mut AuthorizeRequest) -> AuthResult<()> {
        // Known before anything else can fail.
        request.context.resolved_state = request.state.clone();

        self.validate_response_types(request)?;

        let client =
            load_and_validate_client_id(self.client_store.as_ref(), &request.client_id).await?;
        request.context.authenticated_client = Some(client.clone());

        if client.grant_types.is_empty() {
            return Err(AuthError::invalid_authorize_request(
                "client must have at least one authorized grant type",
            ));
        }
        if !client.uses_redirect() {
            return Err(AuthError::invalid_authorize_request(
                "a redirect_uri can only be used by implicit or authorization_code grant types",
            ));
        }

        let redirect_uri =
            resolve_redirect_uri(&self.matchers, &client, request.redirect_uri.as_deref())?;
        request.context.resolved_redirect_uri = Some(redirect_uri.clone());
        request.redirect_uri = Some(redirect_uri);

        if request.scopes.is_empty() {
            request.scopes = client.scopes.clone();
        } else if let Some(scope) = first_not_in(&client.scopes, &request.scopes) {
            return Err(AuthError::invalid_scope(format!("invalid scope: {scope}")));
        }

        tracing::debug!(
            client_id = %request.client_id,
            redirect_uri = request.redirect_uri.as_deref().unwrap_or_default(),
            "authorize request validated"
        );
        Ok(())
    }
}

// =============================================================================
// Redirect Responses
// =============================================================================

/// Where authorize response parameters are placed on the redirect URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// `?code=...` for the authorization code flow.
    Query,
    /// `#access_token=...` for the implicit flow.
    Fragment,
}

impl ResponseMode {
    /// Picks the response mode for the request's response types.
    #[must_use]
    pub fn for_request(request: &AuthorizeRequest) -> Self {
        if request.response_types.contains("token") {
            Self::Fragment
        } else {
            Self::Query
        }
    }
}

/// Appends parameters to a redirect URI in the given mode.
///
/// # Errors
///
/// Returns `InvalidRedirectUri` if `redirect_uri` is not an absolute URL.
pub fn build_redirect_url(
    redirect_uri: &str,
    mode: ResponseMode,
    params: &[(&str, &str)],
) -> AuthResult<String> {
    let mut url = url::Url::parse(redirect_uri).map_err(|e| {
        AuthError::invalid_redirect_uri(format!("invalid redirect_uri [{redirect_uri}]: {e}"))
    })?;

    match mode {
        ResponseMode::Query => {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        ResponseMode::Fragment => {
            let fragment = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params.iter())
                .finish();
            url.set_fragment(Some(&fragment));
        }
    }
    Ok(url.to_string())
}

/// An authorize error delivered to the client's redirect URI.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationErrorResponse {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl AuthorizationErrorResponse {
    #[must_use]
    pub fn from_error(err: &AuthError, state: Option<String>) -> Self {
        Self {
            error: err.oauth_error_code(),
            error_description: err
                .to_response()
                .body
                .error_description
                .filter(|d| !d.is_empty()),
            state,
        }
    }

    /// Builds the redirect for a failed request.
    ///
    /// Returns `None` when the redirect URI was never resolved: errors about
    /// the client or its redirect URI must be shown to the user instead of
    /// being sent to an unverified location.
    #[must_use]
    pub fn redirect_for(err: &AuthError, request: &AuthorizeRequest) -> Option<String> {
        if matches!(
            err,
            AuthError::ClientNotFound { .. }
                | AuthError::InvalidClient { .. }
                | AuthError::InvalidRedirectUri { .. }
        ) {
            return None;
        }
        let redirect_uri = request.context.resolved_redirect_uri.as_deref()?;
        let response = Self::from_error(err, request.context.resolved_state.clone());
        response
            .to_redirect_url(redirect_uri, ResponseMode::for_request(request))
            .ok()
    }

    /// Appends `error`, `error_description` and `state` to the redirect URI.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRedirectUri` if the URI cannot be parsed.
    pub fn to_redirect_url(&self, redirect_uri: &str, mode: ResponseMode) -> AuthResult<String> {
        let mut params: Vec<(&str, &str)> = vec![("error", self.error)];
        if let Some(desc) = &self.error_description {
            params.push(("error_description", desc));
        }
        if let Some(state) = &self.state {
            params.push(("state", state));
        }
        build_redirect_url(redirect_uri, mode, &params)
    }
}
