//! Client authentication for the token endpoint.
//!
//! The transport layer extracts a client id and an optional secret (from the
//! `Authorization: Basic` header or the `client_secret` form field) and hands
//! them to [`authenticate_client`]. Granters then decide how much
//! authentication they require.
//!
//! # Outcomes
//!
//! | Registered secret | Presented secret | Result |
//! |---|---|---|
//! | none | none | `Authenticated` |
//! | some | matching | `Authenticated` |
//! | some | none | `PrincipalKnown` |
//! | some | wrong | `invalid_client` |
//! | none | some | `invalid_client` |

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::ClientStore;
use crate::types::{AuthenticationState, OAuth2Client};

/// A client loaded for a token request, with how well it proved its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedClient {
    pub client: OAuth2Client,
    pub state: AuthenticationState,
}

impl AuthenticatedClient {
    /// Creates a fully authenticated client.
    #[must_use]
    pub fn authenticated(client: OAuth2Client) -> Self {
        Self {
            client,
            state: AuthenticationState::Authenticated,
        }
    }

    /// Returns `true` if the client proved its identity (or needs no proof).
    #[must_use]
    pub fn is_fully_authenticated(&self) -> bool {
        self.state >= AuthenticationState::Authenticated
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client.client_id
    }
}

/// Loads a client and checks the presented secret.
///
/// # Errors
///
/// Returns `ClientNotFound` if the client is unknown, and `InvalidClient`
/// if the secret is wrong or a public client presents one.
pub async fn authenticate_client(
    store: &dyn ClientStore,
    client_id: &str,
    secret: Option<&str>,
) -> AuthResult<AuthenticatedClient> {
    if client_id.is_empty() {
        return Err(AuthError::invalid_client("missing client_id"));
    }

    let client = store
        .load_client_by_client_id(client_id)
        .await?
        .ok_or_else(|| AuthError::client_not_found(format!("client [{client_id}] not found")))?;

    let secret = secret.filter(|s| !s.is_empty());
    let state = match (client.secret.as_deref(), secret) {
        (None, None) => AuthenticationState::Authenticated,
        (None, Some(_)) => {
            return Err(AuthError::invalid_client(
                "public clients cannot authenticate with a secret",
            ));
        }
        (Some(_), None) => AuthenticationState::PrincipalKnown,
        (Some(hash), Some(presented)) => {
            if !verify_secret(presented, hash)? {
                tracing::debug!(client_id = %client_id, "client secret mismatch");
                return Err(AuthError::invalid_client("invalid client secret"));
            }
            AuthenticationState::Authenticated
        }
    };

    Ok(AuthenticatedClient { client, state })
}

/// Parses an HTTP Basic Authorization header value.
///
/// Returns `(client_id, client_secret)`. The secret may contain colons.
#[must_use]
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let encoded = header_value.trim().strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (client_id, client_secret) = credentials.split_once(':')?;

    Some((client_id.to_string(), client_secret.to_string()))
}

// =============================================================================
// Secret Hashing
// =============================================================================

/// Hashes a client secret or password with Argon2id into PHC format.
///
/// # Errors
///
/// Returns an internal error if hashing fails.
pub fn hash_secret(secret: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::internal(format!("failed to hash secret: {e}")))
}

/// Verifies a plaintext secret against a stored PHC hash.
///
/// # Errors
///
/// Returns an internal error only if the stored hash is malformed.
pub fn verify_secret(secret: &str, hash: &str) -> AuthResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::internal(format!("malformed secret hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GrantType;
    use std::collections::HashMap;
    use std::sync::RwLock;

    struct MockClientStore {
        clients: RwLock<HashMap<String, OAuth2Client>>,
    }

    impl MockClientStore {
        fn new(clients: impl IntoIterator<Item = OAuth2Client>) -> Self {
            Self {
                clients: RwLock::new(
                    clients
                        .into_iter()
                        .map(|c| (c.client_id.clone(), c))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait::async_trait]
    impl ClientStore for MockClientStore {
        async fn load_client_by_client_id(
            &self,
            client_id: &str,
        ) -> AuthResult<Option<OAuth2Client>> {
            Ok(self.clients.read().unwrap().get(client_id).cloned())
        }
    }

    fn store() -> MockClientStore {
        let confidential = OAuth2Client::new("confidential-client")
            .with_secret_hash(hash_secret("s3cret").unwrap())
            .with_grant_types([GrantType::ClientCredentials]);
        let public = OAuth2Client::new("public-client").with_grant_types([GrantType::Password]);
        MockClientStore::new([confidential, public])
    }

    #[tokio::test]
    async fn test_confidential_client_with_secret() {
        let store = store();
        let client = authenticate_client(&store, "confidential-client", Some("s3cret"))
            .await
            .unwrap();
        assert!(client.is_fully_authenticated());
        assert_eq!(client.client_id(), "confidential-client");
    }

    #[tokio::test]
    async fn test_confidential_client_without_secret_is_principal_known() {
        let store = store();
        let client = authenticate_client(&store, "confidential-client", None)
            .await
            .unwrap();
        assert_eq!(client.state, AuthenticationState::PrincipalKnown);
        assert!(!client.is_fully_authenticated());
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let store = store();
        let result = authenticate_client(&store, "confidential-client", Some("nope")).await;
        assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
    }

    #[tokio::test]
    async fn test_public_client() {
        let store = store();
        let client = authenticate_client(&store, "public-client", Some(""))
            .await
            .unwrap();
        assert!(client.is_fully_authenticated());

        let result = authenticate_client(&store, "public-client", Some("anything")).await;
        assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
    }

    #[tokio::test]
    async fn test_unknown_client() {
        let store = store();
        let result = authenticate_client(&store, "ghost", None).await;
        assert!(matches!(result, Err(AuthError::ClientNotFound { .. })));

        let result = authenticate_client(&store, "", None).await;
        assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
    }

    #[test]
    fn test_hash_and_verify_secret() {
        let hash = hash_secret("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_secret("correct horse", &hash).unwrap());
        assert!(!verify_secret("battery staple", &hash).unwrap());
        assert!(verify_secret("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_parse_basic_auth() {
        // "client_id:pass:word"
        let parsed = parse_basic_auth("Basic Y2xpZW50X2lkOnBhc3M6d29yZA==");
        assert_eq!(
            parsed,
            Some(("client_id".to_string(), "pass:word".to_string()))
        );
        assert_eq!(parse_basic_auth("Bearer abc"), None);
        assert_eq!(parse_basic_auth("Basic !!!"), None);
        // "nocolon"
        assert_eq!(parse_basic_auth("Basic bm9jb2xvbg=="), None);
    }
}
