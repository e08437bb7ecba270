//! The authorization ticket passed between granters, enhancers and stores.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::details::{
    ContextDetails, HasAuthTimes, HasProvider, HasProxy, HasRoles, HasTenant, HasUser,
    ProxyDetails, TenantDetails, UserDetails, no_permissions,
};
use super::request::OAuth2Request;

/// How far an authentication has progressed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationState {
    #[default]
    Anonymous,
    /// The principal is identified but not verified.
    PrincipalKnown,
    Authenticated,
}

/// Who authenticated, if anyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAuthentication {
    /// The username.
    pub principal: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    pub state: AuthenticationState,
    /// Free-form facts recorded at login, e.g. the session id.
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl UserAuthentication {
    /// Creates a fully authenticated user.
    #[must_use]
    pub fn authenticated(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            permissions: BTreeSet::new(),
            state: AuthenticationState::Authenticated,
            details: BTreeMap::new(),
        }
    }

    /// Adds permissions.
    #[must_use]
    pub fn with_permissions<S: Into<String>>(
        mut self,
        permissions: impl IntoIterator<Item = S>,
    ) -> Self {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    /// Adds a detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// A request plus the (optional) user who authorized it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authentication {
    pub request: OAuth2Request,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_auth: Option<UserAuthentication>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ContextDetails>,
}

impl Authentication {
    /// Creates an authentication without context details.
    #[must_use]
    pub fn new(request: OAuth2Request, user_auth: Option<UserAuthentication>) -> Self {
        Self {
            request,
            user_auth,
            details: None,
        }
    }

    /// Attaches context details.
    #[must_use]
    pub fn with_details(mut self, details: ContextDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// Derives the overall state from the request and the user.
    ///
    /// A client-only authentication of an approved request counts as
    /// authenticated; without a user and approval it is anonymous.
    #[must_use]
    pub fn state(&self) -> AuthenticationState {
        match &self.user_auth {
            Some(user) => user.state,
            None if self.request.approved => AuthenticationState::Authenticated,
            None => AuthenticationState::Anonymous,
        }
    }

    /// Returns `true` if a user authenticated (not just a client).
    #[must_use]
    pub fn is_user_authenticated(&self) -> bool {
        self.user_auth
            .as_ref()
            .is_some_and(|u| u.state >= AuthenticationState::Authenticated)
    }

    /// Returns the username of the user principal.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.user_auth.as_ref().map(|u| u.principal.as_str())
    }
}

impl HasUser for Authentication {
    fn user(&self) -> Option<&UserDetails> {
        self.details.as_ref()?.user()
    }
}

impl HasTenant for Authentication {
    fn tenant(&self) -> Option<&TenantDetails> {
        self.details.as_ref()?.tenant()
    }

    fn assigned_tenant_ids(&self) -> Option<&BTreeSet<String>> {
        self.details.as_ref()?.assigned_tenant_ids()
    }
}

impl HasProvider for Authentication {
    fn provider_id(&self) -> Option<&str> {
        self.details.as_ref()?.provider_id()
    }
}

impl HasRoles for Authentication {
    /// User permissions win; client-only contexts use the detail permissions.
    fn permissions(&self) -> &BTreeSet<String> {
        match (&self.user_auth, &self.details) {
            (Some(user), _) => &user.permissions,
            (None, Some(details)) => &details.permissions,
            (None, None) => no_permissions(),
        }
    }
}

impl HasAuthTimes for Authentication {
    fn issue_time(&self) -> Option<OffsetDateTime> {
        self.details.as_ref()?.issue_time()
    }

    fn expiry_time(&self) -> Option<OffsetDateTime> {
        self.details.as_ref()?.expiry_time()
    }

    fn authentication_time(&self) -> Option<OffsetDateTime> {
        self.details.as_ref()?.authentication_time()
    }
}

impl HasProxy for Authentication {
    fn proxy(&self) -> Option<&ProxyDetails> {
        self.details.as_ref()?.proxy()
    }
}
