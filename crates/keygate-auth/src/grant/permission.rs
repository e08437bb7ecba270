//! Helpers for granters that derive a new token from an existing one.

use std::collections::BTreeSet;

use crate::AuthResult;
use crate::constants::{PARAM_ACCESS_TOKEN, PARAM_CLIENT_SECRET};
use crate::error::AuthError;
use crate::oauth::validation::{validate_all_auto_approval_scopes, validate_all_scopes};
use crate::token::revocation::TokenTypeHint;
use crate::token::store::TokenStore;
use crate::types::request::filter_parameters;
use crate::types::{Authentication, HasRoles, OAuth2Client, OAuth2Request, TokenRequest};

const IGNORED_PARAMETERS: &[&str] = &[PARAM_CLIENT_SECRET, PARAM_ACCESS_TOKEN];

/// Loads the authentication behind the request's `access_token`.
///
/// # Errors
///
/// Returns `InvalidTokenRequest` if no token was sent and `InvalidGrant` if
/// it is unknown, expired, or not bound to an authenticated user.
pub async fn authenticate_token(
    token_store: &dyn TokenStore,
    request: &TokenRequest,
) -> AuthResult<Authentication> {
    let value = request
        .parameter(PARAM_ACCESS_TOKEN)
        .ok_or_else(|| AuthError::invalid_token_request("access_token is missing"))?;

    let token = token_store
        .read_access_token(value)
        .await
        .map_err(AuthError::into_invalid_grant)?;
    if token.is_expired() {
        return Err(AuthError::invalid_grant("access token expired"));
    }

    let auth = token_store
        .read_authentication(value, TokenTypeHint::AccessToken)
        .await
        .map_err(AuthError::into_invalid_grant)?;
    if !auth.is_user_authenticated() {
        return Err(AuthError::invalid_grant(
            "access token is not associated with a valid user",
        ));
    }
    Ok(auth)
}

/// Checks that `stored` carries at least one of `permissions`.
///
/// # Errors
///
/// Returns `InvalidGrant` naming the required permissions.
pub fn require_any_permission(stored: &Authentication, permissions: &[&str]) -> AuthResult<()> {
    if permissions.iter().any(|p| stored.has_permission(p)) {
        Ok(())
    } else {
        Err(AuthError::invalid_grant(format!(
            "user doesn't have required permission [{}]",
            permissions.join(" or ")
        )))
    }
}

/// A context switch must be requested by the client the token was issued to.
///
/// # Errors
///
/// Returns `InvalidGrant` on a client mismatch.
pub fn validate_stored_client(client: &OAuth2Client, stored: &OAuth2Request) -> AuthResult<()> {
    if stored.client_id == client.client_id {
        Ok(())
    } else {
        Err(AuthError::invalid_grant(format!(
            "original client [{}] does not match requesting client [{}]",
            stored.client_id, client.client_id
        )))
    }
}

/// Picks the scopes of a derived token.
///
/// No requested scopes keeps the original ones. For the same client every
/// new scope must be original or auto-approved. For another client every
/// scope is validated afresh and must be auto-approved.
///
/// # Errors
///
/// Returns `InvalidScope` for a scope that would widen the grant, or
/// `AccessRejected` for one that needs user approval.
pub fn reduce_scope(
    client: &OAuth2Client,
    original: &OAuth2Request,
    requested: &BTreeSet<String>,
) -> AuthResult<BTreeSet<String>> {
    let scopes = if requested.is_empty() {
        &original.scopes
    } else {
        requested
    };

    if client.client_id == original.client_id {
        if let Some(scope) = scopes
            .iter()
            .find(|s| !original.scopes.contains(*s) && !client.is_auto_approved(s))
        {
            return Err(AuthError::invalid_scope(format!(
                "scope [{scope}] is not allowed by this client"
            )));
        }
    } else {
        validate_all_scopes(client, scopes)?;
        validate_all_auto_approval_scopes(client, scopes)?;
    }
    Ok(scopes.clone())
}

/// Builds the request of a derived token from the original one.
#[must_use]
pub fn derive_request(
    client: &OAuth2Client,
    original: &OAuth2Request,
    request: &TokenRequest,
    scopes: BTreeSet<String>,
) -> OAuth2Request {
    let mut derived = original.clone();
    derived.client_id.clone_from(&client.client_id);
    derived.redirect_uri = None;
    derived.grant_type = request.grant();
    derived.scopes = scopes;
    derived
        .parameters
        .extend(filter_parameters(&request.parameters, IGNORED_PARAMETERS));
    derived.extensions.extend(
        request
            .extensions
            .iter()
            .filter(|(k, _)| !IGNORED_PARAMETERS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    derived
}
