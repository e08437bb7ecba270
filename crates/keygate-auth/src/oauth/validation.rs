//! Validation helpers shared by the authorize processor and the granters.
//!
//! Every helper fails fast with the first problem it finds.

use std::collections::BTreeSet;

use crate::AuthResult;
use crate::constants::{PARAM_SCOPE_APPROVAL_PREFIX, PARAM_USER_APPROVAL};
use crate::error::AuthError;
use crate::oauth::redirect::RedirectUriMatcherCache;
use crate::storage::ClientStore;
use crate::types::{AuthorizeRequest, GrantType, OAuth2Client, TokenRequest};

/// Returns the first element of `candidates` that is not in `allowed`.
#[must_use]
pub fn first_not_in<'a>(
    allowed: &BTreeSet<String>,
    candidates: impl IntoIterator<Item = &'a String>,
) -> Option<&'a str> {
    candidates
        .into_iter()
        .find(|c| !allowed.contains(c.as_str()))
        .map(String::as_str)
}

// =============================================================================
// Client
// =============================================================================

/// Loads a client by id for the authorize endpoint.
///
/// # Errors
///
/// Returns `InvalidAuthorizeRequest` for an empty id and `ClientNotFound`
/// if no such client is registered.
pub async fn load_and_validate_client_id(
    store: &dyn ClientStore,
    client_id: &str,
) -> AuthResult<OAuth2Client> {
    if client_id.is_empty() {
        return Err(AuthError::invalid_authorize_request("missing client_id"));
    }
    store
        .load_client_by_client_id(client_id)
        .await?
        .ok_or_else(|| AuthError::client_not_found(format!("client [{client_id}] not found")))
}

// =============================================================================
// Grant & Scope
// =============================================================================

/// Checks that the request belongs to `client` and names a grant type the
/// client may use. An empty `client_id` on the request stands for `client`.
///
/// # Errors
///
/// Returns `InvalidClient` if the request names another client,
/// `InvalidTokenRequest` if no grant type was given and
/// `UnauthorizedClient` if the client may not use it.
pub fn validate_grant(request: &TokenRequest, client: &OAuth2Client) -> AuthResult<GrantType> {
    if !request.client_id.is_empty() && request.client_id != client.client_id {
        return Err(AuthError::invalid_client(format!(
            "request names client [{}] but client [{}] authenticated",
            request.client_id, client.client_id
        )));
    }
    if request.grant_type.is_empty() {
        return Err(AuthError::invalid_token_request("missing grant_type"));
    }
    match request.grant() {
        Some(grant) if client.is_grant_type_allowed(grant) => Ok(grant),
        _ => Err(AuthError::unauthorized_client(format!(
            "client [{}] is not allowed to use grant type [{}]",
            client.client_id, request.grant_type
        ))),
    }
}

/// Checks a single scope against the client.
///
/// # Errors
///
/// Returns `InvalidScope` if the client may not request it.
pub fn validate_scope(client: &OAuth2Client, scope: &str) -> AuthResult<()> {
    if client.is_scope_allowed(scope) {
        Ok(())
    } else {
        Err(AuthError::invalid_scope(format!("invalid scope: {scope}")))
    }
}

/// Checks every scope against the client.
///
/// # Errors
///
/// Returns `InvalidScope` naming the first disallowed scope.
pub fn validate_all_scopes<'a>(
    client: &OAuth2Client,
    scopes: impl IntoIterator<Item = &'a String>,
) -> AuthResult<()> {
    match first_not_in(&client.scopes, scopes) {
        Some(scope) => Err(AuthError::invalid_scope(format!("invalid scope: {scope}"))),
        None => Ok(()),
    }
}

/// Checks that every scope is auto-approved for the client.
///
/// # Errors
///
/// Returns `AccessRejected` naming the first scope that needs user approval.
pub fn validate_all_auto_approval_scopes<'a>(
    client: &OAuth2Client,
    scopes: impl IntoIterator<Item = &'a String>,
) -> AuthResult<()> {
    match first_not_in(&client.auto_approve_scopes, scopes) {
        Some(scope) => Err(AuthError::access_rejected(format!(
            "scope [{scope}] is not auto-approved"
        ))),
        None => Ok(()),
    }
}

/// Resolves the scopes the user approved for an authorize request.
///
/// `user_oauth_approval=true` approves everything requested. Otherwise each
/// scope needs `scope.<name>=true` unless the client auto-approves it.
///
/// # Errors
///
/// Returns `AccessRejected` if no scope ends up approved.
pub fn validate_approval(
    request: &AuthorizeRequest,
    client: &OAuth2Client,
) -> AuthResult<BTreeSet<String>> {
    let is_true = |key: &str| {
        request
            .parameters
            .get(key)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    };

    if is_true(PARAM_USER_APPROVAL) {
        return Ok(request.scopes.clone());
    }

    let approved: BTreeSet<String> = request
        .scopes
        .iter()
        .filter(|scope| {
            client.is_auto_approved(scope)
                || is_true(&format!("{PARAM_SCOPE_APPROVAL_PREFIX}{scope}"))
        })
        .cloned()
        .collect();

    if approved.is_empty() {
        return Err(AuthError::access_rejected("user denied access"));
    }
    Ok(approved)
}

// =============================================================================
// Redirect URI
// =============================================================================

/// Resolves the redirect URI to use for a client.
///
/// With no requested URI, a client with exactly one registration uses it.
/// Otherwise the requested URI must match one of the registered patterns.
///
/// # Errors
///
/// Returns `InvalidAuthorizeRequest` if the client registered no URIs and
/// `InvalidRedirectUri` if the choice is ambiguous or nothing matches.
pub fn resolve_redirect_uri(
    matchers: &RedirectUriMatcherCache,
    client: &OAuth2Client,
    requested: Option<&str>,
) -> AuthResult<String> {
    let requested = requested.filter(|uri| !uri.is_empty());

    match (requested, client.redirect_uris.as_slice()) {
        (_, []) => Err(AuthError::invalid_authorize_request(
            "client must have at least one registered redirect_uri",
        )),
        (None, [only]) => Ok(only.clone()),
        (None, _) => Err(AuthError::invalid_redirect_uri(
            "a redirect_uri is required when the client registers more than one",
        )),
        (Some(requested), registered) => {
            for pattern in registered {
                let matcher = match matchers.get_or_compile(pattern) {
                    Ok(matcher) => matcher,
                    Err(e) => {
                        tracing::warn!(
                            client_id = %client.client_id,
                            pattern = %pattern,
                            error = %e,
                            "skipping unparsable registered redirect_uri"
                        );
                        continue;
                    }
                };
                if matcher.matches(requested)? {
                    return Ok(requested.to_string());
                }
            }
            Err(AuthError::invalid_redirect_uri(
                "the redirect_uri must be registered with the client",
            ))
        }
    }
}
