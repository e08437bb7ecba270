//! OAuth 2.0 client domain types.
//!
//! Clients are loaded from a [`ClientStore`](crate::storage::ClientStore) and
//! treated as immutable for the lifetime of a request.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 grant types, including the context-switching extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code flow.
    AuthorizationCode,
    /// Implicit flow (token issued directly from the authorize endpoint).
    Implicit,
    /// Resource Owner Password Credentials flow.
    Password,
    /// Client Credentials flow (no user principal).
    ClientCredentials,
    /// Refresh Token flow.
    RefreshToken,
    /// Masquerade as another user.
    SwitchUser,
    /// Re-issue the current context against another tenant.
    SwitchTenant,
}

impl GrantType {
    /// Returns the OAuth 2.0 grant_type parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Implicit => "implicit",
            Self::Password => "password",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
            Self::SwitchUser => "switch_user",
            Self::SwitchTenant => "switch_tenant",
        }
    }

    /// Parses a grant_type parameter value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authorization_code" => Some(Self::AuthorizationCode),
            "implicit" => Some(Self::Implicit),
            "password" => Some(Self::Password),
            "client_credentials" => Some(Self::ClientCredentials),
            "refresh_token" => Some(Self::RefreshToken),
            "switch_user" => Some(Self::SwitchUser),
            "switch_tenant" => Some(Self::SwitchTenant),
            _ => None,
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Client
// =============================================================================

/// A registered OAuth 2.0 client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Client {
    /// Unique client identifier.
    pub client_id: String,

    /// Argon2 PHC hash of the client secret. `None` for public clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Grant types this client may use.
    #[serde(default)]
    pub grant_types: BTreeSet<GrantType>,

    /// Registered redirect URI patterns (wildcards allowed).
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Scopes this client may request.
    #[serde(default)]
    pub scopes: BTreeSet<String>,

    /// Scopes granted without explicit user approval.
    #[serde(default)]
    pub auto_approve_scopes: BTreeSet<String>,

    /// Access token validity. `None` means tokens never expire.
    #[serde(default, with = "humantime_serde")]
    pub access_token_validity: Option<Duration>,

    /// Refresh token validity. `None` means refresh tokens never expire.
    #[serde(default, with = "humantime_serde")]
    pub refresh_token_validity: Option<Duration>,

    /// Tenants this client may act on.
    #[serde(default)]
    pub assigned_tenant_ids: BTreeSet<String>,

    /// Resource servers this client's tokens are meant for.
    #[serde(default)]
    pub resource_ids: BTreeSet<String>,
}

impl OAuth2Client {
    /// Creates a public client with no grants, scopes or redirect URIs.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            secret: None,
            grant_types: BTreeSet::new(),
            redirect_uris: Vec::new(),
            scopes: BTreeSet::new(),
            auto_approve_scopes: BTreeSet::new(),
            access_token_validity: None,
            refresh_token_validity: None,
            assigned_tenant_ids: BTreeSet::new(),
            resource_ids: BTreeSet::new(),
        }
    }

    /// Sets the hashed client secret.
    #[must_use]
    pub fn with_secret_hash(mut self, hash: impl Into<String>) -> Self {
        self.secret = Some(hash.into());
        self
    }

    /// Adds allowed grant types.
    #[must_use]
    pub fn with_grant_types(mut self, grants: impl IntoIterator<Item = GrantType>) -> Self {
        self.grant_types.extend(grants);
        self
    }

    /// Adds registered redirect URI patterns.
    #[must_use]
    pub fn with_redirect_uris<S: Into<String>>(mut self, uris: impl IntoIterator<Item = S>) -> Self {
        self.redirect_uris.extend(uris.into_iter().map(Into::into));
        self
    }

    /// Adds allowed scopes.
    #[must_use]
    pub fn with_scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    /// Adds auto-approved scopes.
    #[must_use]
    pub fn with_auto_approve_scopes<S: Into<String>>(
        mut self,
        scopes: impl IntoIterator<Item = S>,
    ) -> Self {
        self.auto_approve_scopes
            .extend(scopes.into_iter().map(Into::into));
        self
    }

    /// Sets the access token validity.
    #[must_use]
    pub fn with_access_token_validity(mut self, validity: Duration) -> Self {
        self.access_token_validity = Some(validity);
        self
    }

    /// Sets the refresh token validity.
    #[must_use]
    pub fn with_refresh_token_validity(mut self, validity: Duration) -> Self {
        self.refresh_token_validity = Some(validity);
        self
    }

    /// Adds assigned tenant ids.
    #[must_use]
    pub fn with_assigned_tenants<S: Into<String>>(
        mut self,
        tenants: impl IntoIterator<Item = S>,
    ) -> Self {
        self.assigned_tenant_ids
            .extend(tenants.into_iter().map(Into::into));
        self
    }

    /// Validates the client registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client configuration is invalid.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        if self.grant_types.is_empty() {
            return Err(ClientValidationError::NoGrantTypes);
        }

        // Public clients cannot use client_credentials
        if self.secret.is_none() && self.grant_types.contains(&GrantType::ClientCredentials) {
            return Err(ClientValidationError::PublicClientCredentials);
        }

        if self.uses_redirect() && self.redirect_uris.is_empty() {
            return Err(ClientValidationError::NoRedirectUris);
        }

        Ok(())
    }

    /// Returns `true` if the client has a registered secret.
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.secret.is_some()
    }

    /// Returns `true` if any of the client's grants goes through a redirect.
    #[must_use]
    pub fn uses_redirect(&self) -> bool {
        self.grant_types.contains(&GrantType::AuthorizationCode)
            || self.grant_types.contains(&GrantType::Implicit)
    }

    /// Checks if the given grant type is allowed for this client.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// Checks if the given scope is allowed for this client.
    #[must_use]
    pub fn is_scope_allowed(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Checks if the given scope is granted without user approval.
    #[must_use]
    pub fn is_auto_approved(&self, scope: &str) -> bool {
        self.auto_approve_scopes.contains(scope)
    }
}

/// Errors that can occur during client validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientValidationError {
    /// Client ID is empty.
    #[error("Client ID cannot be empty")]
    EmptyClientId,

    /// No grant types specified.
    #[error("At least one grant type must be specified")]
    NoGrantTypes,

    /// Public client trying to use client_credentials grant.
    #[error("Public clients cannot use client_credentials grant")]
    PublicClientCredentials,

    /// Redirecting grant types require at least one redirect URI.
    #[error("At least one redirect URI is required for authorization_code or implicit grant")]
    NoRedirectUris,
}
