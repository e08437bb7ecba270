use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::constants::{PARAM_TENANT_EXTERNAL_ID, PARAM_TENANT_ID, PERMISSION_SWITCH_TENANT};
use crate::error::AuthError;
use crate::oauth::client_auth::AuthenticatedClient;
use crate::oauth::validation::validate_grant;
use crate::token::service::AuthorizationService;
use crate::token::store::TokenStore;
use crate::types::{AccessToken, Authentication, GrantType, HasProxy, HasTenant, TokenRequest};

use super::permission::{
    authenticate_token, derive_request, reduce_scope, require_any_permission,
    validate_stored_client,
};
use super::{GrantOutcome, TokenGranter, handles};

/// Which tenant to switch to. An id wins over an external id.
enum TenantTarget<'a> {
    Id(&'a str),
    ExternalId(&'a str),
}

impl<'a> TenantTarget<'a> {
    fn from_request(request: &'a TokenRequest) -> AuthResult<Self> {
        if let Some(id) = request.parameter(PARAM_TENANT_ID) {
            Ok(Self::Id(id))
        } else if let Some(external_id) = request.parameter(PARAM_TENANT_EXTERNAL_ID) {
            Ok(Self::ExternalId(external_id))
        } else {
            Err(AuthError::invalid_token_request(format!(
                "either [{PARAM_TENANT_ID}] or [{PARAM_TENANT_EXTERNAL_ID}] is required"
            )))
        }
    }

    fn is_current_tenant(&self, stored: &Authentication) -> bool {
        let Some(current) = stored.tenant() else {
            return false;
        };
        match self {
            Self::Id(id) => current.id == *id,
            Self::ExternalId(external_id) => current.external_id.as_deref() == Some(*external_id),
        }
    }

    /// The parameter that must not survive from the original request.
    fn stale_parameter(&self) -> &'static str {
        match self {
            Self::Id(_) => PARAM_TENANT_EXTERNAL_ID,
            Self::ExternalId(_) => PARAM_TENANT_ID,
        }
    }
}

/// Moves the current user's context to another tenant.
pub struct SwitchTenantGranter {
    auth_service: Arc<dyn AuthorizationService>,
    token_store: Arc<dyn TokenStore>,
}

impl SwitchTenantGranter {
    #[must_use]
    pub fn new(auth_service: Arc<dyn AuthorizationService>, token_store: Arc<dyn TokenStore>) -> Self {
        Self {
            auth_service,
            token_store,
        }
    }

    async fn switch(
        &self,
        client: &AuthenticatedClient,
        request: &TokenRequest,
    ) -> AuthResult<AccessToken> {
        validate_grant(request, &client.client)?;
        let target = TenantTarget::from_request(request)?;

        let stored = authenticate_token(self.token_store.as_ref(), request).await?;
        require_any_permission(&stored, &[PERMISSION_SWITCH_TENANT])?;
        if stored.is_proxied() {
            return Err(AuthError::invalid_grant(
                "the access token represents a masqueraded context. Nested masquerading is not supported",
            ));
        }
        if target.is_current_tenant(&stored) {
            return Err(AuthError::invalid_grant("cannot switch to current tenant"));
        }
        validate_stored_client(&client.client, &stored.request)?;

        let scopes = reduce_scope(&client.client, &stored.request, &request.scopes)?;
        let mut derived = derive_request(&client.client, &stored.request, request, scopes);
        derived.parameters.remove(target.stale_parameter());

        let auth = self
            .auth_service
            .switch_authentication(&client.client, derived, stored.user_auth.clone(), &stored)
            .await
            .map_err(AuthError::into_invalid_grant)?;
        let token = self
            .auth_service
            .create_access_token(&client.client, &auth)
            .await
            .map_err(AuthError::into_invalid_grant)?;

        tracing::info!(
            client_id = %client.client_id(),
            username = stored.username().unwrap_or_default(),
            from_tenant = stored.tenant().map(|t| t.id.as_str()).unwrap_or_default(),
            to_tenant = auth.tenant().map(|t| t.id.as_str()).unwrap_or_default(),
            "switched tenant"
        );
        Ok(token)
    }
}

#[async_trait]
impl TokenGranter for SwitchTenantGranter {
    async fn grant(&self, client: &AuthenticatedClient, request: &TokenRequest) -> GrantOutcome {
        if !handles(request, GrantType::SwitchTenant) {
            return GrantOutcome::NotApplicable;
        }
        self.switch(client, request).await.into()
    }
}
