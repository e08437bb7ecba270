//! Authentication construction and token issuance.
//!
//! Granters never mint tokens themselves. They hand the approved request to an
//! [`AuthorizationService`], which records the security context facts
//! (times, user, tenant, proxy) and drives the enhancer pipeline and the
//! token store.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::constants::{
    DETAILS_KEY_SESSION_ID, PARAM_TENANT_EXTERNAL_ID, PARAM_TENANT_ID,
    PERMISSION_ACCESS_ALL_TENANT, TENANT_ID_WILDCARD,
};
use crate::error::AuthError;
use crate::storage::{AccountStore, TenantStore};
use crate::token::enhancer::TokenEnhancer;
use crate::token::revocation::TokenTypeHint;
use crate::token::store::TokenStore;
use crate::types::token::{expiry_after, truncate_to_seconds};
use crate::types::{
    AccessToken, Account, AuthTimes, Authentication, ContextDetails, HasAuthTimes, HasProxy,
    HasUser, OAuth2Client, OAuth2Request, ProxyDetails, RefreshToken, Tenant, TenantDetails,
    UserAuthentication, UserDetails,
};

#[async_trait]
pub trait AuthorizationService: Send + Sync {
    /// Builds the authentication for a freshly approved request.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGrant` if the account or tenant facts cannot be
    /// established.
    async fn create_authentication(
        &self,
        client: &OAuth2Client,
        request: OAuth2Request,
        user_auth: Option<UserAuthentication>,
    ) -> AuthResult<Authentication>;

    /// Builds an authentication derived from `source`, for switching the user
    /// or the tenant of an existing context.
    ///
    /// The new expiry never exceeds the source's, and the authentication time
    /// is inherited.
    async fn switch_authentication(
        &self,
        client: &OAuth2Client,
        request: OAuth2Request,
        user_auth: Option<UserAuthentication>,
        source: &Authentication,
    ) -> AuthResult<Authentication>;

    /// Issues an access token for `auth`.
    async fn create_access_token(
        &self,
        client: &OAuth2Client,
        auth: &Authentication,
    ) -> AuthResult<AccessToken>;

    /// Issues a new access token bound to an existing refresh token.
    ///
    /// Access tokens previously issued from `refresh_token` are removed first.
    async fn refresh_access_token(
        &self,
        client: &OAuth2Client,
        auth: &Authentication,
        refresh_token: RefreshToken,
    ) -> AuthResult<AccessToken>;
}

// =============================================================================
// Default Authorization Service
// =============================================================================

/// The standard authorization service.
///
/// Without an [`AccountStore`] the user authentication is taken as given. Without
/// a [`TenantStore`] no tenant is resolved.
pub struct DefaultAuthorizationService {
    token_store: Arc<dyn TokenStore>,
    enhancer: Arc<dyn TokenEnhancer>,
    account_store: Option<Arc<dyn AccountStore>>,
    tenant_store: Option<Arc<dyn TenantStore>>,
}

impl DefaultAuthorizationService {
    #[must_use]
    pub fn new(token_store: Arc<dyn TokenStore>, enhancer: Arc<dyn TokenEnhancer>) -> Self {
        Self {
            token_store,
            enhancer,
            account_store: None,
            tenant_store: None,
        }
    }

    #[must_use]
    pub fn with_account_store(mut self, store: Arc<dyn AccountStore>) -> Self {
        self.account_store = Some(store);
        self
    }

    #[must_use]
    pub fn with_tenant_store(mut self, store: Arc<dyn TenantStore>) -> Self {
        self.tenant_store = Some(store);
        self
    }

    async fn build_authentication(
        &self,
        client: &OAuth2Client,
        request: OAuth2Request,
        mut user_auth: Option<UserAuthentication>,
        source: Option<&Authentication>,
    ) -> AuthResult<Authentication> {
        let mut details = ContextDetails {
            times: Some(record_times(client, source)?),
            session_id: user_auth
                .as_ref()
                .and_then(|u| u.details.get(DETAILS_KEY_SESSION_ID).cloned())
                .or_else(|| source.and_then(|s| s.details.as_ref()?.session_id.clone())),
            ..Default::default()
        };

        let mut default_tenant_id = None;
        match (&self.account_store, user_auth.as_mut()) {
            (Some(store), Some(user)) => {
                let account = load_active_account(store.as_ref(), &user.principal).await?;
                user.permissions.clone_from(&account.permissions);
                details.user = Some(user_details(&account));
                details.assigned_tenant_ids = account.assigned_tenant_ids;
                default_tenant_id = account.default_tenant_id;
            }
            (_, None) => {
                details
                    .assigned_tenant_ids
                    .clone_from(&client.assigned_tenant_ids);
            }
            (None, Some(_)) => {}
        }
        if let Some(user) = &user_auth {
            details.permissions.clone_from(&user.permissions);
        }

        if let Some(store) = &self.tenant_store {
            let tenant =
                resolve_tenant(store.as_ref(), &request, default_tenant_id.as_deref(), client)
                    .await?;
            if let Some(tenant) = tenant {
                let all_tenants = details.permissions.contains(PERMISSION_ACCESS_ALL_TENANT);
                if !all_tenants
                    && !details.assigned_tenant_ids.contains(&tenant.id)
                    && !details.assigned_tenant_ids.contains(TENANT_ID_WILDCARD)
                {
                    return Err(AuthError::invalid_grant(
                        "user does not have access to specified tenant",
                    ));
                }
                details.tenant = Some(TenantDetails {
                    id: tenant.id,
                    external_id: tenant.external_id,
                    name: tenant.name,
                    provider_id: tenant.provider_id,
                });
            }
        }

        if let Some(source) = source {
            details.proxy = switch_proxy(source, user_auth.as_ref());
        }

        Ok(Authentication::new(request, user_auth).with_details(details))
    }

    async fn next_access_token(&self, auth: &Authentication) -> AuthResult<AccessToken> {
        Ok(match self.token_store.reusable_access_token(auth).await? {
            Some(token) => token,
            None => AccessToken::new(Uuid::new_v4().to_string()),
        })
    }
}

/// Issue time is now. Expiry follows the client's validity and is capped by
/// the source expiry on a switch.
fn record_times(client: &OAuth2Client, source: Option<&Authentication>) -> AuthResult<AuthTimes> {
    let now = truncate_to_seconds(OffsetDateTime::now_utc());
    let mut expiry_time = client
        .access_token_validity
        .filter(|v| !v.is_zero())
        .map(|v| expiry_after(now, v))
        .transpose()?;
    if let Some(cap) = source.and_then(HasAuthTimes::expiry_time) {
        expiry_time = Some(expiry_time.map_or(cap, |e| e.min(cap)));
    }

    Ok(AuthTimes {
        issue_time: now,
        expiry_time,
        authentication_time: Some(
            source
                .and_then(HasAuthTimes::authentication_time)
                .unwrap_or(now),
        ),
    })
}

async fn load_active_account(store: &dyn AccountStore, username: &str) -> AuthResult<Account> {
    let account = store
        .load_account_by_username(username)
        .await?
        .ok_or_else(|| AuthError::invalid_grant(format!("unknown user: {username}")))?;
    if account.is_inactive() {
        return Err(AuthError::invalid_grant("user account is locked or disabled"));
    }
    Ok(account)
}

fn user_details(account: &Account) -> UserDetails {
    UserDetails {
        id: account.id.clone(),
        username: account.username.clone(),
        first_name: account.first_name.clone(),
        last_name: account.last_name.clone(),
        email: account.email.clone(),
    }
}

/// Explicit parameters win over the account default, which wins over a
/// client bound to exactly one tenant.
async fn resolve_tenant(
    store: &dyn TenantStore,
    request: &OAuth2Request,
    default_tenant_id: Option<&str>,
    client: &OAuth2Client,
) -> AuthResult<Option<Tenant>> {
    let tenant = if let Some(id) = request.parameter(PARAM_TENANT_ID) {
        store.load_tenant_by_id(id).await?
    } else if let Some(external_id) = request.parameter(PARAM_TENANT_EXTERNAL_ID) {
        store.load_tenant_by_external_id(external_id).await?
    } else if let Some(id) = default_tenant_id {
        store.load_tenant_by_id(id).await?
    } else if client.assigned_tenant_ids.len() == 1 {
        match client.assigned_tenant_ids.first() {
            Some(id) => store.load_tenant_by_id(id).await?,
            None => None,
        }
    } else {
        return Ok(None);
    };

    tenant
        .map(Some)
        .ok_or_else(|| AuthError::invalid_grant("specified tenant does not exist"))
}

/// A switch to another user records who is really acting. An existing proxy
/// is kept so the original user survives chained switches.
fn switch_proxy(source: &Authentication, user_auth: Option<&UserAuthentication>) -> Option<ProxyDetails> {
    let source_proxy = source.proxy().cloned();
    let same_user = user_auth.map(|u| u.principal.as_str()) == source.username();
    if same_user {
        return source_proxy;
    }

    source_proxy.or_else(|| {
        source.username().map(|username| ProxyDetails {
            original_username: username.to_string(),
            original_user_id: source.user().map(|u| u.id.clone()),
        })
    })
}

#[async_trait]
impl AuthorizationService for DefaultAuthorizationService {
    async fn create_authentication(
        &self,
        client: &OAuth2Client,
        request: OAuth2Request,
        user_auth: Option<UserAuthentication>,
    ) -> AuthResult<Authentication> {
        self.build_authentication(client, request, user_auth, None)
            .await
    }

    async fn switch_authentication(
        &self,
        client: &OAuth2Client,
        request: OAuth2Request,
        user_auth: Option<UserAuthentication>,
        source: &Authentication,
    ) -> AuthResult<Authentication> {
        self.build_authentication(client, request, user_auth, Some(source))
            .await
    }

    async fn create_access_token(
        &self,
        client: &OAuth2Client,
        auth: &Authentication,
    ) -> AuthResult<AccessToken> {
        let token = self.next_access_token(auth).await?;
        let token = self.enhancer.enhance(token, auth, client).await?;
        let token = self.token_store.save_access_token(token, auth).await?;

        tracing::debug!(
            client_id = %client.client_id,
            username = auth.username().unwrap_or_default(),
            grant_type = auth.request.grant_type.map(|g| g.as_str()).unwrap_or_default(),
            "access token issued"
        );
        Ok(token)
    }

    async fn refresh_access_token(
        &self,
        client: &OAuth2Client,
        auth: &Authentication,
        refresh_token: RefreshToken,
    ) -> AuthResult<AccessToken> {
        if let Err(e) = self
            .token_store
            .remove_access_token(&refresh_token.value, TokenTypeHint::RefreshToken)
            .await
        {
            tracing::warn!(
                client_id = %client.client_id,
                error = %e,
                "failed to remove access tokens of refresh token"
            );
        }

        let token = self
            .next_access_token(auth)
            .await?
            .with_refresh_token(refresh_token);
        let token = self.enhancer.enhance(token, auth, client).await?;
        let token = self.token_store.save_access_token(token, auth).await?;

        tracing::debug!(client_id = %client.client_id, "access token refreshed");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::enhancer::{BasicClaimsTokenEnhancer, CompositeTokenEnhancer, ExpiryTokenEnhancer};
    use crate::types::{GrantType, HasRoles, HasTenant};
    use std::collections::HashMap;
    use std::sync::{Mutex, RwLock};
    use std::time::Duration;
    use time::macros::datetime;

    #[derive(Default)]
    struct MockTokenStore {
        saved: Mutex<Vec<AccessToken>>,
        removed: Mutex<Vec<String>>,
        reusable: Option<AccessToken>,
    }

    #[async_trait]
    impl TokenStore for MockTokenStore {
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
            Ok(self.reusable.clone())
        }

        async fn save_access_token(
            &self,
            token: AccessToken,
            _auth: &Authentication,
        ) -> AuthResult<AccessToken> {
            self.saved.lock().unwrap().push(token.clone());
            Ok(token)
        }

        async fn save_refresh_token(
            &self,
            token: RefreshToken,
            _auth: &Authentication,
        ) -> AuthResult<RefreshToken> {
            Ok(token)
        }

        async fn remove_access_token(&self, value: &str, _hint: TokenTypeHint) -> AuthResult<()> {
            self.removed.lock().unwrap().push(value.to_string());
            Err(AuthError::internal("registry unavailable"))
        }

        async fn remove_refresh_token(&self, _value: &str) -> AuthResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockDirectory {
        accounts: RwLock<HashMap<String, Account>>,
        tenants: RwLock<HashMap<String, Tenant>>,
    }

    impl MockDirectory {
        fn with_account(self, account: Account) -> Self {
            self.accounts
                .write()
                .unwrap()
                .insert(account.username.clone(), account);
            self
        }

        fn with_tenant(self, tenant: Tenant) -> Self {
            self.tenants.write().unwrap().insert(tenant.id.clone(), tenant);
            self
        }
    }

    #[async_trait]
    impl AccountStore for MockDirectory {
        async fn load_account_by_username(&self, username: &str) -> AuthResult<Option<Account>> {
            Ok(self.accounts.read().unwrap().get(username).cloned())
        }

        async fn load_account_by_id(&self, id: &str) -> AuthResult<Option<Account>> {
            Ok(self
                .accounts
                .read()
                .unwrap()
                .values()
                .find(|a| a.id == id)
                .cloned())
        }
    }

    #[async_trait]
    impl TenantStore for MockDirectory {
        async fn load_tenant_by_id(&self, id: &str) -> AuthResult<Option<Tenant>> {
            Ok(self.tenants.read().unwrap().get(id).cloned())
        }

        async fn load_tenant_by_external_id(
            &self,
            external_id: &str,
        ) -> AuthResult<Option<Tenant>> {
            Ok(self
                .tenants
                .read()
                .unwrap()
                .values()
                .find(|t| t.external_id.as_deref() == Some(external_id))
                .cloned())
        }
    }

    fn client() -> OAuth2Client {
        OAuth2Client::new("c1")
            .with_grant_types([GrantType::Password, GrantType::SwitchUser])
            .with_scopes(["read"])
            .with_access_token_validity(Duration::from_secs(3600))
    }

    fn request() -> OAuth2Request {
        OAuth2Request {
            client_id: "c1".into(),
            scopes: ["read".to_string()].into(),
            grant_type: Some(GrantType::Password),
            approved: true,
            ..Default::default()
        }
    }

    fn enhancer() -> Arc<dyn TokenEnhancer> {
        Arc::new(CompositeTokenEnhancer::new(vec![
            Arc::new(ExpiryTokenEnhancer),
            Arc::new(BasicClaimsTokenEnhancer::new("https://auth.example.com")),
        ]))
    }

    fn directory() -> Arc<MockDirectory> {
        Arc::new(
            MockDirectory::default()
                .with_account(
                    Account::new("u1", "alice")
                        .with_permissions(["SWITCH_USER"])
                        .with_tenants(["t1"]),
                )
                .with_account(Account::new("u2", "bob").with_tenants(["t2"]))
                .with_tenant(Tenant::new("t1").with_external_id("acme"))
                .with_tenant(Tenant::new("t2")),
        )
    }

    fn service_with_directory(directory: Arc<MockDirectory>) -> DefaultAuthorizationService {
        DefaultAuthorizationService::new(Arc::new(MockTokenStore::default()), enhancer())
            .with_account_store(directory.clone())
            .with_tenant_store(directory)
    }

    #[tokio::test]
    async fn test_create_authentication_without_stores() {
        let service =
            DefaultAuthorizationService::new(Arc::new(MockTokenStore::default()), enhancer());
        let user = UserAuthentication::authenticated("alice")
            .with_permissions(["READ"])
            .with_detail(DETAILS_KEY_SESSION_ID, "s-1");

        let auth = service
            .create_authentication(&client(), request(), Some(user))
            .await
            .unwrap();

        let details = auth.details.as_ref().unwrap();
        assert_eq!(details.session_id.as_deref(), Some("s-1"));
        assert!(auth.has_permission("READ"));
        assert!(auth.tenant().is_none());
        let lifetime = auth.expiry_time().unwrap() - auth.issue_time().unwrap();
        assert_eq!(lifetime.whole_seconds(), 3600);
        assert_eq!(auth.authentication_time(), auth.issue_time());
    }

    #[tokio::test]
    async fn test_create_authentication_with_unbounded_validity() {
        let service =
            DefaultAuthorizationService::new(Arc::new(MockTokenStore::default()), enhancer());
        let client = client().with_access_token_validity(Duration::MAX);

        let result = service.create_authentication(&client, request(), None).await;
        assert!(matches!(result, Err(AuthError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_create_authentication_loads_account_and_tenant() {
        let service = service_with_directory(directory());
        let user = UserAuthentication::authenticated("alice");

        let auth = service
            .create_authentication(&client(), request(), Some(user))
            .await
            .unwrap();

        assert_eq!(auth.user().unwrap().id, "u1");
        assert_eq!(auth.tenant().unwrap().id, "t1");
        assert_eq!(auth.tenant().unwrap().external_id.as_deref(), Some("acme"));
        assert!(auth.has_permission("SWITCH_USER"));
    }

    #[tokio::test]
    async fn test_create_authentication_rejects_unassigned_tenant() {
        let service = service_with_directory(directory());
        let mut request = request();
        request.parameters.insert(PARAM_TENANT_ID.into(), "t2".into());

        let result = service
            .create_authentication(
                &client(),
                request,
                Some(UserAuthentication::authenticated("alice")),
            )
            .await;
        assert!(matches!(result, Err(AuthError::InvalidGrant { .. })));
    }

    #[tokio::test]
    async fn test_create_authentication_unknown_tenant() {
        let service = service_with_directory(directory());
        let mut request = request();
        request
            .parameters
            .insert(PARAM_TENANT_EXTERNAL_ID.into(), "nope".into());

        let result = service
            .create_authentication(
                &client(),
                request,
                Some(UserAuthentication::authenticated("alice")),
            )
            .await;
        assert!(matches!(result, Err(AuthError::InvalidGrant { .. })));
    }

    #[tokio::test]
    async fn test_create_authentication_rejects_locked_account() {
        let mut locked = Account::new("u3", "carol");
        locked.locked = true;
        let service =
            service_with_directory(Arc::new(MockDirectory::default().with_account(locked)));

        let result = service
            .create_authentication(
                &client(),
                request(),
                Some(UserAuthentication::authenticated("carol")),
            )
            .await;
        assert!(matches!(result, Err(AuthError::InvalidGrant { .. })));
    }

    #[tokio::test]
    async fn test_client_only_uses_single_client_tenant() {
        let service = service_with_directory(directory());
        let client = client().with_assigned_tenants(["t2"]);

        let auth = service
            .create_authentication(&client, request(), None)
            .await
            .unwrap();
        assert_eq!(auth.tenant().unwrap().id, "t2");
        assert!(auth.user().is_none());
    }

    #[tokio::test]
    async fn test_switch_authentication_caps_expiry_and_records_proxy() {
        let service = service_with_directory(directory());
        let source = service
            .create_authentication(
                &client(),
                request(),
                Some(UserAuthentication::authenticated("alice")),
            )
            .await
            .unwrap();
        let mut source = source;
        if let Some(times) = source.details.as_mut().and_then(|d| d.times.as_mut()) {
            times.expiry_time = Some(datetime!(2000-01-01 00:10 UTC));
            times.authentication_time = Some(datetime!(2000-01-01 00:00 UTC));
        }

        let switched = service
            .switch_authentication(
                &client(),
                request(),
                Some(UserAuthentication::authenticated("bob")),
                &source,
            )
            .await
            .unwrap();

        assert_eq!(switched.expiry_time(), Some(datetime!(2000-01-01 00:10 UTC)));
        assert_eq!(
            switched.authentication_time(),
            Some(datetime!(2000-01-01 00:00 UTC))
        );
        let proxy = switched.proxy().unwrap();
        assert_eq!(proxy.original_username, "alice");
        assert_eq!(proxy.original_user_id.as_deref(), Some("u1"));
        assert_eq!(switched.tenant().unwrap().id, "t2");
    }

    #[tokio::test]
    async fn test_switch_to_same_user_is_not_proxied() {
        let service = service_with_directory(directory());
        let source = service
            .create_authentication(
                &client(),
                request(),
                Some(UserAuthentication::authenticated("alice")),
            )
            .await
            .unwrap();

        let switched = service
            .switch_authentication(
                &client(),
                request(),
                Some(UserAuthentication::authenticated("alice")),
                &source,
            )
            .await
            .unwrap();
        assert!(!switched.is_proxied());
    }

    #[tokio::test]
    async fn test_create_access_token_prefers_reusable() {
        let store = Arc::new(MockTokenStore {
            reusable: Some(AccessToken::new("existing")),
            ..Default::default()
        });
        let service = DefaultAuthorizationService::new(store.clone(), enhancer());
        let auth = Authentication::new(request(), None);

        let token = service.create_access_token(&client(), &auth).await.unwrap();
        assert_eq!(token.value, "existing");
        assert!(token.claims.is_some());
        assert_eq!(store.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_access_token_survives_removal_failure() {
        let store = Arc::new(MockTokenStore::default());
        let service = DefaultAuthorizationService::new(store.clone(), enhancer());
        let auth = Authentication::new(request(), Some(UserAuthentication::authenticated("alice")));

        let token = service
            .refresh_access_token(&client(), &auth, RefreshToken::new("r1"))
            .await
            .unwrap();

        assert_eq!(token.refresh_token.as_ref().unwrap().value, "r1");
        assert_eq!(store.removed.lock().unwrap().as_slice(), ["r1".to_string()]);
        assert_ne!(token.value, "r1");
    }
}
