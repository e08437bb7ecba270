//! One-time authorization codes.
//!
//! A code is a random key under which the approved [`Authentication`] is kept
//! in a [`KeyValueStore`] until it is redeemed or its TTL runs out.
//!
//! # Replay
//!
//! The store itself decides who wins when two requests redeem the same code:
//! the code is read, then deleted, and only the caller whose delete actually
//! removed the key receives the authentication. A backing store whose delete
//! is not atomic per key cannot give this guarantee.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::AuthResult;
use crate::config::AuthServerConfig;
use crate::error::AuthError;
use crate::storage::KeyValueStore;
use crate::types::{Authentication, AuthorizeRequest, UserAuthentication};

const CODE_KEY_PREFIX: &str = "AC:";
const CODE_LENGTH: usize = 32;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Issues and redeems authorization codes.
#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    /// Stores the approved request and user, returning a fresh code.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is not approved or storage fails.
    async fn generate_authorization_code(
        &self,
        request: &AuthorizeRequest,
        user_auth: &UserAuthentication,
    ) -> AuthResult<String>;

    /// Looks up the authentication stored under `code`.
    ///
    /// With `onetime`, the code is removed as part of the lookup.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGrant` if the code is unknown, expired, or was
    /// redeemed concurrently.
    async fn consume_authorization_code(
        &self,
        code: &str,
        onetime: bool,
    ) -> AuthResult<Authentication>;
}

/// Generates a code of 32 letters.
fn generate_code() -> String {
    let mut bytes = [0u8; CODE_LENGTH];
    rand::thread_rng().fill(&mut bytes);
    bytes
        .iter()
        .map(|b| char::from(CODE_ALPHABET[usize::from(*b) % CODE_ALPHABET.len()]))
        .collect()
}

fn code_key(code: &str) -> String {
    format!("{CODE_KEY_PREFIX}{code}")
}

/// Authorization codes kept in a key-value store.
pub struct DefaultAuthorizationCodeStore {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl DefaultAuthorizationCodeStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, config: &AuthServerConfig) -> Self {
        Self {
            store,
            ttl: config.authorization_code_lifetime,
        }
    }
}

#[async_trait]
impl AuthorizationCodeStore for DefaultAuthorizationCodeStore {
    async fn generate_authorization_code(
        &self,
        request: &AuthorizeRequest,
        user_auth: &UserAuthentication,
    ) -> AuthResult<String> {
        if !request.approved {
            return Err(AuthError::access_rejected(
                "authorization code requires an approved request",
            ));
        }

        let auth = Authentication::new(request.to_oauth2_request(), Some(user_auth.clone()));
        let value = serde_json::to_string(&auth)?;
        let code = generate_code();
        self.store.set(&code_key(&code), value, self.ttl).await?;

        tracing::debug!(
            client_id = %request.client_id,
            username = %user_auth.principal,
            "authorization code issued"
        );
        Ok(code)
    }

    async fn consume_authorization_code(
        &self,
        code: &str,
        onetime: bool,
    ) -> AuthResult<Authentication> {
        let key = code_key(code);
        let value = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| AuthError::invalid_grant(format!("invalid authorization code: {code}")))?;

        if onetime {
            match self.store.delete(&key).await {
                Ok(true) => {}
                Ok(false) => {
                    return Err(AuthError::invalid_grant(
                        "authorization code has already been used",
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to delete redeemed authorization code");
                }
            }
        }

        Ok(serde_json::from_str(&value)?)
    }
}
