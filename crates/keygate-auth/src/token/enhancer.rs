//! The token enhancer pipeline.
//!
//! Every issued access token passes through a [`CompositeTokenEnhancer`],
//! which runs its delegates in ascending [`TokenEnhancer::order`]. Delegates
//! with the same order keep their registration order.
//!
//! | Enhancer | Order | Adds |
//! |---|---|---|
//! | [`ExpiryTokenEnhancer`] | 0 | issue and expiry times |
//! | [`BasicClaimsTokenEnhancer`] | 100 | `jti`, `iss`, `sub`, `aud`, `exp`, `iat`, `scope` |
//! | [`LegacyClaimsTokenEnhancer`] | 101 | flattened user and tenant fields |
//! | [`RefreshTokenEnhancer`] | last | a refresh token, when eligible |
//!
//! Running the pipeline again over its own output changes nothing.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::config::AuthServerConfig;
use crate::error::AuthError;
use crate::token::store::TokenStore;
use crate::types::token::{expiry_after, truncate_to_seconds};
use crate::types::{
    AccessToken, Authentication, BasicClaims, GrantType, HasAuthTimes, HasTenant, HasUser,
    LegacyClaims, OAuth2Client, RefreshToken, TokenClaims,
};

pub const ORDER_EXPIRY: i32 = 0;
pub const ORDER_BASIC_CLAIMS: i32 = 100;
/// Must directly follow [`ORDER_BASIC_CLAIMS`].
pub const ORDER_LEGACY_CLAIMS: i32 = ORDER_BASIC_CLAIMS + 1;
pub const ORDER_REFRESH_TOKEN: i32 = i32::MAX;

#[async_trait]
pub trait TokenEnhancer: Send + Sync {
    /// Position in the pipeline. Lower runs first.
    fn order(&self) -> i32 {
        0
    }

    /// Returns the enhanced token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be enhanced.
    async fn enhance(
        &self,
        token: AccessToken,
        auth: &Authentication,
        client: &OAuth2Client,
    ) -> AuthResult<AccessToken>;
}

// =============================================================================
// Composite
// =============================================================================

/// Runs a fixed, ordered list of enhancers.
pub struct CompositeTokenEnhancer {
    delegates: Vec<Arc<dyn TokenEnhancer>>,
}

impl CompositeTokenEnhancer {
    #[must_use]
    pub fn new(mut delegates: Vec<Arc<dyn TokenEnhancer>>) -> Self {
        delegates.sort_by_key(|e| e.order());
        Self { delegates }
    }

    /// The standard pipeline for `config`.
    #[must_use]
    pub fn standard(config: &AuthServerConfig, token_store: Arc<dyn TokenStore>) -> Self {
        let mut delegates: Vec<Arc<dyn TokenEnhancer>> = vec![
            Arc::new(ExpiryTokenEnhancer),
            Arc::new(BasicClaimsTokenEnhancer::new(config.issuer.clone())),
            Arc::new(RefreshTokenEnhancer::new(config, token_store)),
        ];
        if config.legacy_claims {
            delegates.push(Arc::new(LegacyClaimsTokenEnhancer));
        }
        Self::new(delegates)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.delegates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }
}

#[async_trait]
impl TokenEnhancer for CompositeTokenEnhancer {
    async fn enhance(
        &self,
        mut token: AccessToken,
        auth: &Authentication,
        client: &OAuth2Client,
    ) -> AuthResult<AccessToken> {
        for delegate in &self.delegates {
            token = delegate.enhance(token, auth, client).await?;
        }
        Ok(token)
    }
}

// =============================================================================
// Expiry
// =============================================================================

/// Sets issue and expiry times.
///
/// Times recorded in the authentication win. Otherwise the token is issued
/// now and expires after the client's access token validity.
pub struct ExpiryTokenEnhancer;

#[async_trait]
impl TokenEnhancer for ExpiryTokenEnhancer {
    fn order(&self) -> i32 {
        ORDER_EXPIRY
    }

    async fn enhance(
        &self,
        mut token: AccessToken,
        auth: &Authentication,
        client: &OAuth2Client,
    ) -> AuthResult<AccessToken> {
        let issue_time = auth
            .issue_time()
            .unwrap_or_else(|| truncate_to_seconds(OffsetDateTime::now_utc()));
        let expiry_time = match auth.expiry_time() {
            Some(expiry) => Some(expiry),
            None => client
                .access_token_validity
                .filter(|v| !v.is_zero())
                .map(|v| expiry_after(issue_time, v))
                .transpose()?,
        };

        token.set_issue_time(issue_time);
        token.set_expiry_time(expiry_time);
        Ok(token)
    }
}

// =============================================================================
// Basic Claims
// =============================================================================

/// Builds the registered claims.
pub struct BasicClaimsTokenEnhancer {
    issuer: String,
}

impl BasicClaimsTokenEnhancer {
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }
}

fn extract_subject(auth: &Authentication) -> AuthResult<Option<String>> {
    let Some(user) = &auth.user_auth else {
        return Ok(None);
    };
    if !user.principal.is_empty() {
        return Ok(Some(user.principal.clone()));
    }
    match auth.user() {
        Some(details) if !details.username.is_empty() => Ok(Some(details.username.clone())),
        _ => Err(AuthError::internal(
            "unable to extract subject from user authentication",
        )),
    }
}

#[async_trait]
impl TokenEnhancer for BasicClaimsTokenEnhancer {
    fn order(&self) -> i32 {
        ORDER_BASIC_CLAIMS
    }

    async fn enhance(
        &self,
        mut token: AccessToken,
        auth: &Authentication,
        client: &OAuth2Client,
    ) -> AuthResult<AccessToken> {
        let subject = extract_subject(auth)?;
        let mut claims = token
            .claims
            .take()
            .unwrap_or_else(|| TokenClaims::Basic(BasicClaims::default()));

        let basic = claims.basic_mut();
        if basic.jti.is_none() {
            basic.jti = Some(token.value.clone());
        }
        basic.aud = BTreeSet::from([client.client_id.clone()]);
        basic.iss = Some(self.issuer.clone());
        basic.sub = subject;
        basic.exp = token.expiry_time;
        basic.iat = Some(token.issue_time);
        basic.scope = auth.request.scopes.clone();
        basic.client_id = Some(client.client_id.clone());

        token.scopes = auth.request.scopes.clone();
        token.claims = Some(claims);
        Ok(token)
    }
}

// =============================================================================
// Legacy Claims
// =============================================================================

/// Adds flattened user and tenant fields for older resource servers.
pub struct LegacyClaimsTokenEnhancer;

#[async_trait]
impl TokenEnhancer for LegacyClaimsTokenEnhancer {
    fn order(&self) -> i32 {
        ORDER_LEGACY_CLAIMS
    }

    async fn enhance(
        &self,
        mut token: AccessToken,
        auth: &Authentication,
        _client: &OAuth2Client,
    ) -> AuthResult<AccessToken> {
        let mut legacy = match token.claims.take() {
            Some(TokenClaims::Basic(basic)) => LegacyClaims::new(basic),
            Some(TokenClaims::Legacy(legacy)) => legacy,
            None => {
                return Err(AuthError::internal(
                    "legacy claims require basic claims to be present",
                ));
            }
        };

        if let Some(user) = auth.user() {
            legacy.first_name.clone_from(&user.first_name);
            legacy.last_name.clone_from(&user.last_name);
            legacy.email.clone_from(&user.email);
        }
        legacy.username = auth
            .username()
            .map(str::to_string)
            .or_else(|| auth.user().map(|u| u.username.clone()));
        legacy.tenant_id = auth.tenant().map(|t| t.id.clone());

        token.claims = Some(TokenClaims::Legacy(legacy));
        Ok(token)
    }
}

// =============================================================================
// Refresh Token
// =============================================================================

/// Attaches a refresh token when the grant is eligible for one.
pub struct RefreshTokenEnhancer {
    issuer: String,
    refresh_grant_types: BTreeSet<GrantType>,
    token_store: Arc<dyn TokenStore>,
}

impl RefreshTokenEnhancer {
    #[must_use]
    pub fn new(config: &AuthServerConfig, token_store: Arc<dyn TokenStore>) -> Self {
        Self {
            issuer: config.issuer.clone(),
            refresh_grant_types: config.refresh_grant_types.iter().copied().collect(),
            token_store,
        }
    }

    fn is_eligible(&self, token: &AccessToken, auth: &Authentication, client: &OAuth2Client) -> bool {
        client.is_grant_type_allowed(GrantType::RefreshToken)
            && auth
                .request
                .grant_type
                .is_some_and(|g| self.refresh_grant_types.contains(&g))
            && !token.has_live_refresh_token()
    }
}

#[async_trait]
impl TokenEnhancer for RefreshTokenEnhancer {
    fn order(&self) -> i32 {
        ORDER_REFRESH_TOKEN
    }

    async fn enhance(
        &self,
        token: AccessToken,
        auth: &Authentication,
        client: &OAuth2Client,
    ) -> AuthResult<AccessToken> {
        if !self.is_eligible(&token, auth, client) {
            return Ok(token);
        }

        let mut refresh = RefreshToken::generate();
        let expiry = match (auth.authentication_time(), client.refresh_token_validity) {
            (Some(auth_time), Some(validity)) if !validity.is_zero() => {
                Some(expiry_after(auth_time, validity)?)
            }
            _ => None,
        };
        refresh.set_expiry_time(expiry);
        refresh.claims = Some(TokenClaims::Basic(BasicClaims {
            jti: Some(refresh.value.clone()),
            iss: Some(self.issuer.clone()),
            aud: BTreeSet::from([client.client_id.clone()]),
            exp: refresh.expiry_time,
            iat: Some(refresh.issue_time),
            scope: auth.request.scopes.clone(),
            client_id: Some(client.client_id.clone()),
            ..Default::default()
        }));

        let refresh = self.token_store.save_refresh_token(refresh, auth).await?;
        tracing::debug!(client_id = %client.client_id, "refresh token issued");
        Ok(token.with_refresh_token(refresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::revocation::TokenTypeHint;
    use crate::types::{
        AuthTimes, ContextDetails, OAuth2Request, TenantDetails, UserAuthentication, UserDetails,
    };
    use std::sync::Mutex;
    use std::time::Duration;
    use time::macros::datetime;

    #[derive(Default)]
    struct RecordingTokenStore {
        refresh_tokens: Mutex<Vec<RefreshToken>>,
    }

    #[async_trait]
    impl TokenStore for RecordingTokenStore {
        async fn read_authentication(
            &self,
            _value: &str,
            _hint: TokenTypeHint,
        ) -> AuthResult<Authentication> {
            Err(AuthError::invalid_grant("unknown"))
        }

        async fn read_access_token(&self, _value: &str) -> AuthResult<AccessToken> {
            Err(AuthError::invalid_grant("unknown"))
        }

        async fn read_refresh_token(&self, _value: &str) -> AuthResult<RefreshToken> {
            Err(AuthError::invalid_grant("unknown"))
        }

        async fn reusable_access_token(
            &self,
            _auth: &Authentication,
        ) -> AuthResult<Option<AccessToken>> {
            Ok(None)
        }

        async fn save_access_token(
            &self,
            token: AccessToken,
            _auth: &Authentication,
        ) -> AuthResult<AccessToken> {
            Ok(token)
        }

        async fn save_refresh_token(
            &self,
            token: RefreshToken,
            _auth: &Authentication,
        ) -> AuthResult<RefreshToken> {
            self.refresh_tokens.lock().unwrap().push(token.clone());
            Ok(token)
        }

        async fn remove_access_token(&self, _value: &str, _hint: TokenTypeHint) -> AuthResult<()> {
            Ok(())
        }

        async fn remove_refresh_token(&self, _value: &str) -> AuthResult<()> {
            Ok(())
        }
    }

    fn client() -> OAuth2Client {
        OAuth2Client::new("c1")
            .with_grant_types([GrantType::Password, GrantType::RefreshToken])
            .with_scopes(["read", "write"])
            .with_access_token_validity(Duration::from_secs(3600))
            .with_refresh_token_validity(Duration::from_secs(86400))
    }

    fn password_auth() -> Authentication {
        let request = OAuth2Request {
            client_id: "c1".into(),
            scopes: ["read".to_string()].into(),
            grant_type: Some(GrantType::Password),
            approved: true,
            ..Default::default()
        };
        let details = ContextDetails {
            user: Some(UserDetails {
                id: "u1".into(),
                username: "alice".into(),
                first_name: Some("Alice".into()),
                email: Some("alice@example.com".into()),
                ..Default::default()
            }),
            tenant: Some(TenantDetails {
                id: "t1".into(),
                ..Default::default()
            }),
            times: Some(AuthTimes {
                issue_time: datetime!(2030-01-01 00:00 UTC),
                expiry_time: Some(datetime!(2030-01-01 01:00 UTC)),
                authentication_time: Some(datetime!(2030-01-01 00:00 UTC)),
            }),
            ..Default::default()
        };
        Authentication::new(request, Some(UserAuthentication::authenticated("alice")))
            .with_details(details)
    }

    fn pipeline(store: Arc<RecordingTokenStore>) -> CompositeTokenEnhancer {
        let config = AuthServerConfig {
            issuer: "https://auth.example.com".into(),
            ..Default::default()
        };
        CompositeTokenEnhancer::standard(&config, store)
    }

    #[test]
    fn test_standard_pipeline_respects_legacy_flag() {
        let store: Arc<dyn TokenStore> = Arc::new(RecordingTokenStore::default());
        let config = AuthServerConfig {
            legacy_claims: false,
            ..Default::default()
        };
        assert_eq!(CompositeTokenEnhancer::standard(&config, store.clone()).len(), 3);
        assert_eq!(
            CompositeTokenEnhancer::standard(&AuthServerConfig::default(), store).len(),
            4
        );
    }

    #[tokio::test]
    async fn test_full_pipeline() {
        let store = Arc::new(RecordingTokenStore::default());
        let auth = password_auth();
        let token = pipeline(store.clone())
            .enhance(AccessToken::new("tok-1"), &auth, &client())
            .await
            .unwrap();

        assert_eq!(token.issue_time, datetime!(2030-01-01 00:00 UTC));
        assert_eq!(token.expiry_time, Some(datetime!(2030-01-01 01:00 UTC)));
        assert_eq!(token.scopes, auth.request.scopes);

        let claims = token.claims.as_ref().unwrap();
        let basic = claims.basic();
        assert_eq!(basic.jti.as_deref(), Some("tok-1"));
        assert_eq!(basic.iss.as_deref(), Some("https://auth.example.com"));
        assert_eq!(basic.sub.as_deref(), Some("alice"));
        assert!(basic.aud.contains("c1"));
        assert_eq!(basic.exp, token.expiry_time);

        let TokenClaims::Legacy(legacy) = claims else {
            panic!("expected legacy claims");
        };
        assert_eq!(legacy.first_name.as_deref(), Some("Alice"));
        assert_eq!(legacy.tenant_id.as_deref(), Some("t1"));
        assert_eq!(legacy.username.as_deref(), Some("alice"));

        let refresh = token.refresh_token.as_ref().unwrap();
        assert_eq!(refresh.expiry_time, Some(datetime!(2030-01-02 00:00 UTC)));
        assert_eq!(store.refresh_tokens.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pipeline_is_idempotent() {
        let store = Arc::new(RecordingTokenStore::default());
        let auth = password_auth();
        let client = client();
        let enhancer = pipeline(store.clone());

        let once = enhancer
            .enhance(AccessToken::new("tok-1"), &auth, &client)
            .await
            .unwrap();
        let twice = enhancer.enhance(once.clone(), &auth, &client).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(store.refresh_tokens.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_legacy_requires_basic_claims() {
        let result = LegacyClaimsTokenEnhancer
            .enhance(AccessToken::new("t"), &password_auth(), &client())
            .await;
        assert!(matches!(result, Err(AuthError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_expiry_from_client_validity() {
        let request = OAuth2Request {
            client_id: "c1".into(),
            approved: true,
            ..Default::default()
        };
        let auth = Authentication::new(request, None);
        let token = ExpiryTokenEnhancer
            .enhance(AccessToken::new("t"), &auth, &client())
            .await
            .unwrap();
        let lifetime = token.expiry_time.unwrap() - token.issue_time;
        assert_eq!(lifetime.whole_seconds(), 3600);

        let token = ExpiryTokenEnhancer
            .enhance(AccessToken::new("t"), &auth, &OAuth2Client::new("c1"))
            .await
            .unwrap();
        assert!(token.expiry_time.is_none());
    }

    #[tokio::test]
    async fn test_client_only_token_has_no_subject_and_no_refresh() {
        let store = Arc::new(RecordingTokenStore::default());
        let request = OAuth2Request {
            client_id: "c1".into(),
            grant_type: Some(GrantType::ClientCredentials),
            approved: true,
            ..Default::default()
        };
        let auth = Authentication::new(request, None);
        let token = pipeline(store.clone())
            .enhance(AccessToken::new("t"), &auth, &client())
            .await
            .unwrap();

        assert!(token.claims.unwrap().basic().sub.is_none());
        assert!(token.refresh_token.is_none());
        assert!(store.refresh_tokens.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_without_auth_time_never_expires() {
        let store = Arc::new(RecordingTokenStore::default());
        let mut auth = password_auth();
        auth.details = None;
        let token = RefreshTokenEnhancer::new(&AuthServerConfig::default(), store)
            .enhance(AccessToken::new("t"), &auth, &client())
            .await
            .unwrap();
        let refresh = token.refresh_token.unwrap();
        assert!(!refresh.will_expire());
    }

    #[tokio::test]
    async fn test_validity_out_of_range() {
        let request = OAuth2Request {
            client_id: "c1".into(),
            approved: true,
            ..Default::default()
        };
        let client = client()
            .with_access_token_validity(Duration::MAX)
            .with_refresh_token_validity(Duration::MAX);

        let result = ExpiryTokenEnhancer
            .enhance(AccessToken::new("t"), &Authentication::new(request, None), &client)
            .await;
        assert!(matches!(result, Err(AuthError::Internal { .. })));

        let store = Arc::new(RecordingTokenStore::default());
        let result = RefreshTokenEnhancer::new(&AuthServerConfig::default(), store)
            .enhance(AccessToken::new("t"), &password_auth(), &client)
            .await;
        assert!(matches!(result, Err(AuthError::Internal { .. })));
    }

    #[test]
    fn test_composite_sorts_stably() {
        struct Named(i32);

        #[async_trait]
        impl TokenEnhancer for Named {
            fn order(&self) -> i32 {
                self.0
            }

            async fn enhance(
                &self,
                token: AccessToken,
                _auth: &Authentication,
                _client: &OAuth2Client,
            ) -> AuthResult<AccessToken> {
                Ok(token)
            }
        }

        let composite = CompositeTokenEnhancer::new(vec![
            Arc::new(Named(5)),
            Arc::new(Named(1)),
            Arc::new(Named(5)),
            Arc::new(Named(0)),
        ]);
        let orders: Vec<i32> = composite.delegates.iter().map(|d| d.order()).collect();
        assert_eq!(orders, vec![0, 1, 5, 5]);
    }
}
