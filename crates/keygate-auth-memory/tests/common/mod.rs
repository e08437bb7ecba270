//! A complete authorization server wired over the in-memory backend.

#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use keygate_auth::AuthResult;
use keygate_auth::config::AuthServerConfig;
use keygate_auth::constants::PERMISSION_SWITCH_TENANT;
use keygate_auth::grant::{
    AuthorizationCodeGranter, ClientCredentialsGranter, CompositeTokenGranter, PasswordGranter,
    RefreshGranter, SwitchTenantGranter, SwitchUserGranter,
};
use keygate_auth::oauth::{
    AuthorizeApprovalHandler, AuthorizeRequestProcessor, DefaultAuthorizationCodeStore,
    DefaultAuthorizeRequestProcessor, authenticate_client, hash_secret,
};
use keygate_auth::token::{
    CompositeTokenEnhancer, DefaultAccessRevoker, DefaultAuthorizationService, RegistryTokenStore,
};
use keygate_auth::types::{
    AccessToken, Account, AuthorizeRequest, GrantType, OAuth2Client, Tenant, TokenRequest,
    UserAuthentication,
};
use keygate_auth_memory::MemoryBackend;

pub const CLIENT_SECRET: &str = "s3cret";
pub const PASSWORD: &str = "correct horse";
pub const REDIRECT_URI: &str = "https://app.example.com/cb";

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct Server {
    pub backend: MemoryBackend,
    pub tokens: Arc<RegistryTokenStore>,
    pub processor: DefaultAuthorizeRequestProcessor,
    pub approval: AuthorizeApprovalHandler,
    pub granter: CompositeTokenGranter,
    pub revoker: DefaultAccessRevoker,
}

impl Server {
    pub fn new() -> Self {
        init_tracing();

        let config = Arc::new(AuthServerConfig::default());
        let backend = MemoryBackend::new();
        seed(&backend);

        let tokens = backend.token_store();
        let enhancer = Arc::new(CompositeTokenEnhancer::standard(&config, tokens.clone()));
        let service = Arc::new(
            DefaultAuthorizationService::new(tokens.clone(), enhancer)
                .with_account_store(backend.accounts.clone())
                .with_tenant_store(backend.tenants.clone()),
        );
        let codes = Arc::new(DefaultAuthorizationCodeStore::new(
            backend.key_values.clone(),
            &config,
        ));

        let granter = CompositeTokenGranter::new(vec![
            Arc::new(AuthorizationCodeGranter::new(service.clone(), codes.clone())),
            Arc::new(ClientCredentialsGranter::new(service.clone())),
            Arc::new(PasswordGranter::new(service.clone(), backend.accounts.clone())),
            Arc::new(RefreshGranter::new(service.clone(), tokens.clone())),
            Arc::new(SwitchUserGranter::new(
                service.clone(),
                tokens.clone(),
                backend.accounts.clone(),
            )),
            Arc::new(SwitchTenantGranter::new(service.clone(), tokens.clone())),
        ]);

        Self {
            processor: DefaultAuthorizeRequestProcessor::new(config, backend.clients.clone()),
            approval: AuthorizeApprovalHandler::new(codes, service)
                .with_approval_store(backend.approvals.clone()),
            revoker: DefaultAccessRevoker::new(
                backend.registry.clone(),
                backend.sessions.clone(),
                tokens.clone(),
            ),
            granter,
            tokens,
            backend,
        }
    }

    /// Authenticates `client_id` with the shared secret and runs the granter chain.
    pub async fn token(&self, request: TokenRequest) -> AuthResult<AccessToken> {
        let client = authenticate_client(
            self.backend.clients.as_ref(),
            &request.client_id,
            Some(CLIENT_SECRET),
        )
        .await?;
        self.granter.grant_token(&client, &request).await
    }

    /// Authenticates as `client_id` but sends `request` unchanged.
    pub async fn token_as(&self, client_id: &str, request: TokenRequest) -> AuthResult<AccessToken> {
        let client =
            authenticate_client(self.backend.clients.as_ref(), client_id, Some(CLIENT_SECRET))
                .await?;
        self.granter.grant_token(&client, &request).await
    }

    /// Runs an authorize request through validation and approval.
    pub async fn authorize(
        &self,
        params: &[(&str, &str)],
        username: &str,
        session_id: &str,
    ) -> AuthResult<String> {
        let mut request = AuthorizeRequest::from_parameters(params.iter().copied());
        self.processor.process(&mut request).await?;
        self.approval
            .handle_approved(
                &mut request,
                UserAuthentication::authenticated(username),
                Some(session_id),
            )
            .await
    }

    pub async fn login(&self, username: &str, scopes: &[&str]) -> AccessToken {
        let request = TokenRequest::new("c1", "password")
            .with_parameter("username", username)
            .with_parameter("password", PASSWORD)
            .with_scopes(scopes.iter().copied());
        self.token(request).await.unwrap()
    }
}

pub fn query_param(url: &str, key: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Clients `c1` (every grant, scopes read and write, read auto-approved),
/// `svc` (client credentials only) and the public `codeonly` (authorization
/// code only). Accounts `alice` (may switch users and
/// tenants, tenants t1 and t2) and `bob` (tenant t1).
fn seed(backend: &MemoryBackend) {
    let secret = hash_secret(CLIENT_SECRET).unwrap();
    backend.clients.insert(
        OAuth2Client::new("c1")
            .with_secret_hash(secret.clone())
            .with_grant_types([
                GrantType::AuthorizationCode,
                GrantType::Implicit,
                GrantType::Password,
                GrantType::RefreshToken,
                GrantType::SwitchUser,
                GrantType::SwitchTenant,
            ])
            .with_redirect_uris([REDIRECT_URI])
            .with_scopes(["read", "write"])
            .with_auto_approve_scopes(["read"])
            .with_access_token_validity(Duration::from_secs(3600))
            .with_refresh_token_validity(Duration::from_secs(86400)),
    );
    backend.clients.insert(
        OAuth2Client::new("svc")
            .with_secret_hash(secret)
            .with_grant_types([GrantType::ClientCredentials])
            .with_scopes(["read"])
            .with_assigned_tenants(["t1"])
            .with_access_token_validity(Duration::from_secs(600)),
    );

    backend.clients.insert(
        OAuth2Client::new("codeonly")
            .with_grant_types([GrantType::AuthorizationCode])
            .with_redirect_uris(["https://code.example.com/cb"])
            .with_scopes(["read"]),
    );

    let password = hash_secret(PASSWORD).unwrap();
    backend.accounts.insert(
        Account::new("u1", "alice")
            .with_password_hash(password.clone())
            .with_permissions(["SWITCH_USER", PERMISSION_SWITCH_TENANT])
            .with_tenants(["t1", "t2"]),
    );
    backend.accounts.insert(
        Account::new("u2", "bob")
            .with_password_hash(password)
            .with_tenants(["t1"]),
    );
    backend.tenants.insert(Tenant::new("t1").with_external_id("acme"));
    backend.tenants.insert(Tenant::new("t2").with_external_id("globex"));
}
