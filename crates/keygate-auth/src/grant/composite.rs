use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::client_auth::AuthenticatedClient;
use crate::types::{AccessToken, TokenRequest};

use super::{GrantOutcome, TokenGranter};

/// Offers a request to each delegate in registration order.
pub struct CompositeTokenGranter {
    delegates: Vec<Arc<dyn TokenGranter>>,
}

impl CompositeTokenGranter {
    #[must_use]
    pub fn new(delegates: Vec<Arc<dyn TokenGranter>>) -> Self {
        Self { delegates }
    }

    #[must_use]
    pub fn with_granter(mut self, granter: Arc<dyn TokenGranter>) -> Self {
        self.delegates.push(granter);
        self
    }

    /// Grants a token, flattening the outcome.
    ///
    /// # Errors
    ///
    /// Returns the handling granter's error, or `GranterNotAvailable` when no
    /// delegate handles the grant type.
    pub async fn grant_token(
        &self,
        client: &AuthenticatedClient,
        request: &TokenRequest,
    ) -> AuthResult<AccessToken> {
        self.grant(client, request)
            .await
            .into_result(&request.grant_type)
    }
}

#[async_trait]
impl TokenGranter for CompositeTokenGranter {
    async fn grant(&self, client: &AuthenticatedClient, request: &TokenRequest) -> GrantOutcome {
        for delegate in &self.delegates {
            let outcome = delegate.grant(client, request).await;
            if outcome.is_applicable() {
                if let GrantOutcome::Failed(e) = &outcome {
                    tracing::debug!(
                        grant_type = %request.grant_type,
                        client_id = %client.client_id(),
                        error = %e,
                        "token grant failed"
                    );
                }
                return outcome;
            }
        }

        GrantOutcome::Failed(AuthError::granter_not_available(format!(
            "no granter available for grant type [{}]",
            request.grant_type
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OAuth2Client;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        grant_type: &'static str,
        result: Result<&'static str, AuthError>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(grant_type: &'static str, result: Result<&'static str, AuthError>) -> Arc<Self> {
            Arc::new(Self {
                grant_type,
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TokenGranter for Fixed {
        async fn grant(&self, _client: &AuthenticatedClient, request: &TokenRequest) -> GrantOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.grant_type != self.grant_type {
                return GrantOutcome::NotApplicable;
            }
            self.result.clone().map(AccessToken::new).into()
        }
    }

    fn client() -> AuthenticatedClient {
        AuthenticatedClient::authenticated(OAuth2Client::new("c1"))
    }

    #[tokio::test]
    async fn test_first_applicable_granter_wins() {
        let password = Fixed::new("password", Ok("p-token"));
        let shadowed = Fixed::new("password", Ok("other"));
        let composite = CompositeTokenGranter::new(vec![
            Fixed::new("client_credentials", Ok("cc-token")),
            password.clone(),
            shadowed.clone(),
        ]);

        let token = composite
            .grant_token(&client(), &TokenRequest::new("c1", "password"))
            .await
            .unwrap();
        assert_eq!(token.value, "p-token");
        assert_eq!(password.calls.load(Ordering::SeqCst), 1);
        assert_eq!(shadowed.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_short_circuits() {
        let fallback = Fixed::new("password", Ok("never"));
        let composite = CompositeTokenGranter::new(vec![
            Fixed::new("password", Err(AuthError::invalid_grant("bad credentials"))),
        ])
        .with_granter(fallback.clone());

        let result = composite
            .grant_token(&client(), &TokenRequest::new("c1", "password"))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidGrant { .. })));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_grant_type() {
        let composite = CompositeTokenGranter::new(vec![
            Fixed::new("password", Err(AuthError::invalid_grant("unused"))),
            Fixed::new("client_credentials", Ok("cc-token")),
        ]);

        let result = composite
            .grant_token(&client(), &TokenRequest::new("c1", "urn:custom"))
            .await;
        assert!(matches!(result, Err(AuthError::GranterNotAvailable { .. })));

        let empty = CompositeTokenGranter::new(Vec::new());
        let outcome = empty.grant(&client(), &TokenRequest::new("c1", "password")).await;
        assert!(matches!(
            outcome,
            GrantOutcome::Failed(AuthError::GranterNotAvailable { .. })
        ));
    }
}
