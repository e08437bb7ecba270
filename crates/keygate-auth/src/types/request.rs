//! Authorize, token, and stored OAuth 2.0 request types.
//!
//! The transport layer parses inbound parameters into [`AuthorizeRequest`]
//! and [`TokenRequest`]. Once a request is approved it is frozen into an
//! [`OAuth2Request`], which travels inside an
//! [`Authentication`](super::Authentication) from then on.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    PARAM_CLIENT_ID, PARAM_GRANT_TYPE, PARAM_REDIRECT_URI, PARAM_RESPONSE_TYPE, PARAM_SCOPE,
    PARAM_STATE,
};
use crate::types::{GrantType, OAuth2Client};

/// Splits a space-delimited parameter (scope, response_type) into a set.
#[must_use]
pub fn split_delimited(value: &str) -> BTreeSet<String> {
    value.split_whitespace().map(str::to_string).collect()
}

// =============================================================================
// Authorize Request
// =============================================================================

/// Values resolved while validating an authorize request.
///
/// Error redirection reads these even after the request was rejected, so
/// they live outside the request fields that validation may rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizeContext {
    /// The client that owns the request, once loaded.
    pub authenticated_client: Option<OAuth2Client>,
    /// The redirect URI responses must be sent to.
    pub resolved_redirect_uri: Option<String>,
    /// The state value to echo back.
    pub resolved_state: Option<String>,
}

/// An inbound authorization request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub client_id: String,
    pub response_types: BTreeSet<String>,
    pub scopes: BTreeSet<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    /// All raw request parameters.
    pub parameters: BTreeMap<String, String>,
    /// Values added by server-side processing (never by the client).
    pub extensions: BTreeMap<String, Value>,
    /// Set once the resource owner approved the request.
    pub approved: bool,
    #[serde(skip)]
    pub context: AuthorizeContext,
}

impl AuthorizeRequest {
    /// Builds a request from raw query or form parameters.
    #[must_use]
    pub fn from_parameters<K, V>(params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let parameters: BTreeMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let non_empty = |key: &str| {
            parameters
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
        };

        Self {
            client_id: non_empty(PARAM_CLIENT_ID).unwrap_or_default(),
            response_types: non_empty(PARAM_RESPONSE_TYPE)
                .map(|v| split_delimited(&v))
                .unwrap_or_default(),
            scopes: non_empty(PARAM_SCOPE)
                .map(|v| split_delimited(&v))
                .unwrap_or_default(),
            redirect_uri: non_empty(PARAM_REDIRECT_URI),
            state: non_empty(PARAM_STATE),
            parameters,
            extensions: BTreeMap::new(),
            approved: false,
            context: AuthorizeContext::default(),
        }
    }

    /// Freezes this request into its stored form.
    ///
    /// The grant type follows the response type: `token` yields an implicit
    /// grant, anything else an authorization code grant.
    #[must_use]
    pub fn to_oauth2_request(&self) -> OAuth2Request {
        let grant_type = if self.response_types.contains("token") {
            GrantType::Implicit
        } else {
            GrantType::AuthorizationCode
        };
        OAuth2Request {
            client_id: self.client_id.clone(),
            scopes: self.scopes.clone(),
            redirect_uri: self.redirect_uri.clone(),
            response_types: self.response_types.clone(),
            grant_type: Some(grant_type),
            approved: self.approved,
            parameters: self.parameters.clone(),
            extensions: self.extensions.clone(),
        }
    }
}

// =============================================================================
// Token Request
// =============================================================================

/// An inbound token endpoint request.
///
/// The grant type is kept verbatim so that unknown values reach the granter
/// chain and fail there with `unsupported_grant_type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub client_id: String,
    pub grant_type: String,
    pub scopes: BTreeSet<String>,
    pub parameters: BTreeMap<String, String>,
    pub extensions: BTreeMap<String, Value>,
}

impl TokenRequest {
    /// Creates a request for the given client and grant type.
    #[must_use]
    pub fn new(client_id: impl Into<String>, grant_type: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            grant_type: grant_type.into(),
            ..Default::default()
        }
    }

    /// Builds a request from raw form parameters.
    #[must_use]
    pub fn from_parameters<K, V>(params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let parameters: BTreeMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            client_id: parameters.get(PARAM_CLIENT_ID).cloned().unwrap_or_default(),
            grant_type: parameters.get(PARAM_GRANT_TYPE).cloned().unwrap_or_default(),
            scopes: parameters
                .get(PARAM_SCOPE)
                .map(|v| split_delimited(v))
                .unwrap_or_default(),
            parameters,
            extensions: BTreeMap::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Sets the requested scopes.
    #[must_use]
    pub fn with_scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the parsed grant type, if known.
    #[must_use]
    pub fn grant(&self) -> Option<GrantType> {
        GrantType::parse(&self.grant_type)
    }

    /// Returns a parameter value, treating empty strings as absent.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

// =============================================================================
// Stored Request
// =============================================================================

/// The approved request stored in an authentication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OAuth2Request {
    pub client_id: String,
    pub scopes: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub response_types: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_type: Option<GrantType>,
    pub approved: bool,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub extensions: BTreeMap<String, Value>,
}

impl OAuth2Request {
    /// Builds an approved request for `client_id` from a token request.
    ///
    /// The client id is taken from the authenticated client, never from the
    /// request. Parameters named in `ignored` are not copied.
    #[must_use]
    pub fn from_token_request(client_id: &str, request: &TokenRequest, ignored: &[&str]) -> Self {
        Self {
            client_id: client_id.to_string(),
            scopes: request.scopes.clone(),
            redirect_uri: None,
            response_types: BTreeSet::new(),
            grant_type: request.grant(),
            approved: true,
            parameters: filter_parameters(&request.parameters, ignored),
            extensions: request.extensions.clone(),
        }
    }

    /// Returns a parameter value, treating empty strings as absent.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Copies parameters, skipping the named keys.
#[must_use]
pub fn filter_parameters(
    parameters: &BTreeMap<String, String>,
    ignored: &[&str],
) -> BTreeMap<String, String> {
    parameters
        .iter()
        .filter(|(k, _)| !ignored.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
