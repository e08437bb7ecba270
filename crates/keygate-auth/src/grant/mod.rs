//! Token granters.
//!
//! A token request is offered to every granter of a [`CompositeTokenGranter`]
//! in registration order. A granter that does not handle the request's grant
//! type answers [`GrantOutcome::NotApplicable`] and the next one is asked. The
//! first granter that handles the request decides the result.
//!
//! | Granter | Grant type |
//! |---|---|
//! | [`AuthorizationCodeGranter`] | `authorization_code` |
//! | [`ClientCredentialsGranter`] | `client_credentials` |
//! | [`PasswordGranter`] | `password` |
//! | [`RefreshGranter`] | `refresh_token` |
//! | [`SwitchUserGranter`] | `switch_user` |
//! | [`SwitchTenantGranter`] | `switch_tenant` |

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::client_auth::AuthenticatedClient;
use crate::oauth::validation::validate_all_scopes;
use crate::types::{AccessToken, GrantType, OAuth2Client, TokenRequest};

pub mod authorization_code;
pub mod client_credentials;
pub mod composite;
pub mod password;
pub mod permission;
pub mod refresh;
pub mod switch_tenant;
pub mod switch_user;

pub use authorization_code::AuthorizationCodeGranter;
pub use client_credentials::ClientCredentialsGranter;
pub use composite::CompositeTokenGranter;
pub use password::PasswordGranter;
pub use refresh::RefreshGranter;
pub use switch_tenant::SwitchTenantGranter;
pub use switch_user::SwitchUserGranter;

/// The answer of a single granter.
#[derive(Debug)]
pub enum GrantOutcome {
    /// The granter issued a token.
    Handled(AccessToken),
    /// The granter does not handle this grant type.
    NotApplicable,
    /// The granter handles this grant type and rejected the request.
    Failed(AuthError),
}

impl GrantOutcome {
    #[must_use]
    pub fn is_applicable(&self) -> bool {
        !matches!(self, Self::NotApplicable)
    }

    /// Flattens the outcome. `NotApplicable` becomes `GranterNotAvailable`.
    ///
    /// # Errors
    ///
    /// Returns the granter's error, or `GranterNotAvailable`.
    pub fn into_result(self, grant_type: &str) -> AuthResult<AccessToken> {
        match self {
            Self::Handled(token) => Ok(token),
            Self::Failed(e) => Err(e),
            Self::NotApplicable => Err(AuthError::granter_not_available(format!(
                "no granter available for grant type [{grant_type}]"
            ))),
        }
    }
}

impl From<AuthResult<AccessToken>> for GrantOutcome {
    fn from(result: AuthResult<AccessToken>) -> Self {
        match result {
            Ok(token) => Self::Handled(token),
            Err(e) => Self::Failed(e),
        }
    }
}

#[async_trait]
pub trait TokenGranter: Send + Sync {
    async fn grant(&self, client: &AuthenticatedClient, request: &TokenRequest) -> GrantOutcome;
}

/// Returns `true` if `request` asks for `grant_type`.
pub(crate) fn handles(request: &TokenRequest, grant_type: GrantType) -> bool {
    request.grant() == Some(grant_type)
}

pub(crate) fn require_secret_authentication(client: &AuthenticatedClient) -> AuthResult<()> {
    if client.is_fully_authenticated() {
        Ok(())
    } else {
        Err(AuthError::invalid_client(format!(
            "client [{}] must authenticate with its secret",
            client.client_id()
        )))
    }
}

/// Requested scopes, validated against the client. No scopes means all of
/// the client's scopes.
pub(crate) fn requested_scopes(
    client: &OAuth2Client,
    request: &TokenRequest,
) -> AuthResult<BTreeSet<String>> {
    if request.scopes.is_empty() {
        return Ok(client.scopes.clone());
    }
    validate_all_scopes(client, &request.scopes)?;
    Ok(request.scopes.clone())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_result() {
        let outcome = GrantOutcome::from(Ok(AccessToken::new("t")));
        assert!(matches!(outcome, GrantOutcome::Handled(_)));

        let outcome = GrantOutcome::from(Err(AuthError::invalid_grant("bad")));
        assert!(matches!(outcome, GrantOutcome::Failed(AuthError::InvalidGrant { .. })));
    }

    #[test]
    fn test_not_applicable_flattens_to_granter_not_available() {
        assert!(!GrantOutcome::NotApplicable.is_applicable());
        let result = GrantOutcome::NotApplicable.into_result("magic");
        assert!(matches!(result, Err(AuthError::GranterNotAvailable { .. })));
    }

    #[test]
    fn test_requested_scopes() {
        let client = OAuth2Client::new("c1").with_scopes(["read", "write"]);

        let request = TokenRequest::new("c1", "client_credentials");
        assert_eq!(requested_scopes(&client, &request).unwrap(), client.scopes);

        let request = request.with_scopes(["read"]);
        assert_eq!(requested_scopes(&client, &request).unwrap().len(), 1);

        let request = TokenRequest::new("c1", "client_credentials").with_scopes(["admin"]);
        assert!(matches!(
            requested_scopes(&client, &request),
            Err(AuthError::InvalidScope { .. })
        ));
    }
}
