use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::constants::{
    PARAM_SWITCH_USER_ID, PARAM_SWITCH_USERNAME, PERMISSION_ACCESS_ALL_TENANT,
    PERMISSION_SWITCH_USER,
};
use crate::error::AuthError;
use crate::oauth::client_auth::AuthenticatedClient;
use crate::oauth::validation::validate_grant;
use crate::storage::AccountStore;
use crate::token::service::AuthorizationService;
use crate::token::store::TokenStore;
use crate::types::{
    AccessToken, Authentication, GrantType, HasProxy, HasUser, TokenRequest, UserAuthentication,
};

use super::permission::{
    authenticate_token, derive_request, reduce_scope, require_any_permission,
    validate_stored_client,
};
use super::{GrantOutcome, TokenGranter, handles};

/// Who to switch to. A username wins over an id.
enum SwitchTarget<'a> {
    Username(&'a str),
    UserId(&'a str),
}

impl<'a> SwitchTarget<'a> {
    fn from_request(request: &'a TokenRequest) -> AuthResult<Self> {
        let username = request.parameter(PARAM_SWITCH_USERNAME).map(str::trim);
        let user_id = request.parameter(PARAM_SWITCH_USER_ID).map(str::trim);
        match (username, user_id) {
            (Some(username), _) if !username.is_empty() => Ok(Self::Username(username)),
            (_, Some(user_id)) if !user_id.is_empty() => Ok(Self::UserId(user_id)),
            _ => Err(AuthError::invalid_token_request(format!(
                "either [{PARAM_SWITCH_USERNAME}] or [{PARAM_SWITCH_USER_ID}] is required"
            ))),
        }
    }

    fn is_current_user(&self, stored: &Authentication) -> bool {
        match self {
            Self::Username(username) => stored.username() == Some(*username),
            Self::UserId(id) => stored.user().is_some_and(|u| u.id == *id),
        }
    }
}

/// Masquerades as another user.
pub struct SwitchUserGranter {
    auth_service: Arc<dyn AuthorizationService>,
    token_store: Arc<dyn TokenStore>,
    account_store: Arc<dyn AccountStore>,
}

impl SwitchUserGranter {
    #[must_use]
    pub fn new(
        auth_service: Arc<dyn AuthorizationService>,
        token_store: Arc<dyn TokenStore>,
        account_store: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            auth_service,
            token_store,
            account_store,
        }
    }

    async fn load_user_authentication(
        &self,
        target: &SwitchTarget<'_>,
    ) -> AuthResult<UserAuthentication> {
        let (account, what) = match target {
            SwitchTarget::Username(username) => (
                self.account_store.load_account_by_username(username).await,
                format!("invalid {PARAM_SWITCH_USERNAME} [{username}]"),
            ),
            SwitchTarget::UserId(id) => (
                self.account_store.load_account_by_id(id).await,
                format!("invalid {PARAM_SWITCH_USER_ID} [{id}]"),
            ),
        };
        let account = account
            .ok()
            .flatten()
            .ok_or_else(|| AuthError::invalid_grant(what))?;

        Ok(UserAuthentication::authenticated(account.username).with_permissions(account.permissions))
    }

    async fn switch(
        &self,
        client: &AuthenticatedClient,
        request: &TokenRequest,
    ) -> AuthResult<AccessToken> {
        validate_grant(request, &client.client)?;
        let target = SwitchTarget::from_request(request)?;

        let stored = authenticate_token(self.token_store.as_ref(), request).await?;
        require_any_permission(
            &stored,
            &[PERMISSION_SWITCH_USER, PERMISSION_ACCESS_ALL_TENANT],
        )?;
        if stored.is_proxied() {
            return Err(AuthError::invalid_grant(
                "the access token represents a masqueraded context. Nested masquerading is not supported",
            ));
        }
        if target.is_current_user(&stored) {
            return Err(AuthError::invalid_grant("cannot switch to same user"));
        }
        validate_stored_client(&client.client, &stored.request)?;

        let scopes = reduce_scope(&client.client, &stored.request, &request.scopes)?;
        let derived = derive_request(&client.client, &stored.request, request, scopes);
        let user_auth = self.load_user_authentication(&target).await?;
        let username = user_auth.principal.clone();

        let auth = self
            .auth_service
            .switch_authentication(&client.client, derived, Some(user_auth), &stored)
            .await
            .map_err(AuthError::into_invalid_grant)?;
        let token = self
            .auth_service
            .create_access_token(&client.client, &auth)
            .await
            .map_err(AuthError::into_invalid_grant)?;

        tracing::info!(
            client_id = %client.client_id(),
            original_username = stored.username().unwrap_or_default(),
            username = %username,
            "switched user"
        );
        Ok(token)
    }
}

#[async_trait]
impl TokenGranter for SwitchUserGranter {
    async fn grant(&self, client: &AuthenticatedClient, request: &TokenRequest) -> GrantOutcome {
        if !handles(request, GrantType::SwitchUser) {
            return GrantOutcome::NotApplicable;
        }
        self.switch(client, request).await.into()
    }
}
