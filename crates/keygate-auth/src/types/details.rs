//! Security context details and the capabilities used to query them.
//!
//! Enhancers and granters never inspect a concrete detail type. They ask for
//! a capability (`HasTenant`, `HasUser`, ...) and get `None` when the
//! context does not carry that kind of fact.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

static NO_PERMISSIONS: BTreeSet<String> = BTreeSet::new();

// =============================================================================
// Capabilities
// =============================================================================

/// Access to the authenticated user's identity facts.
pub trait HasUser {
    fn user(&self) -> Option<&UserDetails>;
}

/// Access to the tenant the context is bound to.
pub trait HasTenant {
    fn tenant(&self) -> Option<&TenantDetails>;

    /// Tenants the principal may act on.
    fn assigned_tenant_ids(&self) -> Option<&BTreeSet<String>> {
        None
    }
}

/// Access to the identity provider owning the tenant.
pub trait HasProvider {
    fn provider_id(&self) -> Option<&str>;
}

/// Access to granted permissions.
pub trait HasRoles {
    fn permissions(&self) -> &BTreeSet<String>;

    fn has_permission(&self, permission: &str) -> bool {
        self.permissions().contains(permission)
    }
}

/// Access to issue, expiry and authentication instants.
pub trait HasAuthTimes {
    fn issue_time(&self) -> Option<OffsetDateTime>;
    fn expiry_time(&self) -> Option<OffsetDateTime>;
    fn authentication_time(&self) -> Option<OffsetDateTime>;
}

/// Access to masquerade information.
pub trait HasProxy {
    fn proxy(&self) -> Option<&ProxyDetails>;

    /// Returns `true` if the context acts on behalf of another user.
    fn is_proxied(&self) -> bool {
        self.proxy().is_some()
    }
}

// =============================================================================
// Detail Sections
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDetails {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

/// Instants recorded when an authentication is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTimes {
    #[serde(with = "time::serde::rfc3339")]
    pub issue_time: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expiry_time: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub authentication_time: Option<OffsetDateTime>,
}

/// The real user behind a masqueraded context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyDetails {
    pub original_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_user_id: Option<String>,
}

// =============================================================================
// Context Details
// =============================================================================

/// Facts gathered about the principal, tenant and timing of an authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<AuthTimes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyDetails>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub assigned_tenant_ids: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl HasUser for ContextDetails {
    fn user(&self) -> Option<&UserDetails> {
        self.user.as_ref()
    }
}

impl HasTenant for ContextDetails {
    fn tenant(&self) -> Option<&TenantDetails> {
        self.tenant.as_ref()
    }

    fn assigned_tenant_ids(&self) -> Option<&BTreeSet<String>> {
        Some(&self.assigned_tenant_ids)
    }
}

impl HasProvider for ContextDetails {
    fn provider_id(&self) -> Option<&str> {
        self.tenant.as_ref()?.provider_id.as_deref()
    }
}

impl HasRoles for ContextDetails {
    fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }
}

impl HasAuthTimes for ContextDetails {
    fn issue_time(&self) -> Option<OffsetDateTime> {
        self.times.map(|t| t.issue_time)
    }

    fn expiry_time(&self) -> Option<OffsetDateTime> {
        self.times.and_then(|t| t.expiry_time)
    }

    fn authentication_time(&self) -> Option<OffsetDateTime> {
        self.times.and_then(|t| t.authentication_time)
    }
}

impl HasProxy for ContextDetails {
    fn proxy(&self) -> Option<&ProxyDetails> {
        self.proxy.as_ref()
    }
}

pub(crate) fn no_permissions() -> &'static BTreeSet<String> {
    &NO_PERMISSIONS
}
