//! Authorization server error types.
//!
//! Every error carries three identities: a stable internal code used in logs,
//! the OAuth 2.0 wire-level error code, and the HTTP status the transport
//! layer should answer with.

use std::fmt;

use http::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};

/// Errors that can occur while authorizing requests and granting tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    // -------------------------------------------------------------------------
    // Client errors
    // -------------------------------------------------------------------------
    /// No client is registered under the requested client id.
    #[error("Client not found: {message}")]
    ClientNotFound {
        /// Description of the lookup failure.
        message: String,
    },

    /// The client exists but could not be authenticated.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client is invalid.
        message: String,
    },

    // -------------------------------------------------------------------------
    // Authorize errors
    // -------------------------------------------------------------------------
    /// The authorization request is malformed or missing parameters.
    #[error("Invalid authorize request: {message}")]
    InvalidAuthorizeRequest {
        /// Description of what is wrong with the request.
        message: String,
    },

    /// A requested response type is not supported by this server.
    #[error("Unsupported response type: {message}")]
    InvalidResponseType {
        /// Description of the offending response type.
        message: String,
    },

    /// The redirect URI is missing, ambiguous, or not registered.
    #[error("Invalid redirect URI: {message}")]
    InvalidRedirectUri {
        /// Description of the redirect URI problem.
        message: String,
    },

    /// The resource owner or policy rejected the request.
    #[error("Access rejected: {message}")]
    AccessRejected {
        /// Description of why access was rejected.
        message: String,
    },

    // -------------------------------------------------------------------------
    // Grant errors
    // -------------------------------------------------------------------------
    /// No granter recognized the requested grant type.
    #[error("Granter not available: {message}")]
    GranterNotAvailable {
        /// Description of the unhandled grant.
        message: String,
    },

    /// The client is not allowed to use the requested grant type.
    #[error("Unauthorized client: {message}")]
    UnauthorizedClient {
        /// Description of the grant type violation.
        message: String,
    },

    /// The token request is malformed or missing parameters.
    #[error("Invalid token request: {message}")]
    InvalidTokenRequest {
        /// Description of what is wrong with the request.
        message: String,
    },

    /// The authorization grant, refresh token, or source token is invalid.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The requested scope is invalid, unknown, or exceeds what was granted.
    #[error("Invalid scope: {message}")]
    InvalidScope {
        /// Description of why the scope is invalid.
        message: String,
    },

    /// The token type hint is not supported.
    #[error("Unsupported token type: {message}")]
    UnsupportedTokenType {
        /// Description of the unsupported hint.
        message: String,
    },

    // -------------------------------------------------------------------------
    // Internal errors
    // -------------------------------------------------------------------------
    /// An unexpected failure: storage, serialization, or misconfiguration.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

// Internal code blocks. The low byte distinguishes errors within a block.
const CODE_CLIENT: u32 = 0x0100;
const CODE_AUTHORIZE: u32 = 0x0200;
const CODE_GRANT: u32 = 0x0300;
const CODE_INTERNAL: u32 = 0x0F00;

impl AuthError {
    /// Creates a new `ClientNotFound` error.
    #[must_use]
    pub fn client_not_found(message: impl Into<String>) -> Self {
        Self::ClientNotFound {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidAuthorizeRequest` error.
    #[must_use]
    pub fn invalid_authorize_request(message: impl Into<String>) -> Self {
        Self::InvalidAuthorizeRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidResponseType` error.
    #[must_use]
    pub fn invalid_response_type(message: impl Into<String>) -> Self {
        Self::InvalidResponseType {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRedirectUri` error.
    #[must_use]
    pub fn invalid_redirect_uri(message: impl Into<String>) -> Self {
        Self::InvalidRedirectUri {
            message: message.into(),
        }
    }

    /// Creates a new `AccessRejected` error.
    #[must_use]
    pub fn access_rejected(message: impl Into<String>) -> Self {
        Self::AccessRejected {
            message: message.into(),
        }
    }

    /// Creates a new `GranterNotAvailable` error.
    #[must_use]
    pub fn granter_not_available(message: impl Into<String>) -> Self {
        Self::GranterNotAvailable {
            message: message.into(),
        }
    }

    /// Creates a new `UnauthorizedClient` error.
    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidTokenRequest` error.
    #[must_use]
    pub fn invalid_token_request(message: impl Into<String>) -> Self {
        Self::InvalidTokenRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidScope` error.
    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedTokenType` error.
    #[must_use]
    pub fn unsupported_token_type(message: impl Into<String>) -> Self {
        Self::UnsupportedTokenType {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Re-labels any error as `InvalidGrant`, keeping its message.
    ///
    /// Granters use this when a downstream failure means the presented grant
    /// cannot be honored. `InvalidGrant` errors pass through unchanged.
    #[must_use]
    pub fn into_invalid_grant(self) -> Self {
        match self {
            Self::InvalidGrant { .. } => self,
            other => Self::invalid_grant(other.message().to_string()),
        }
    }

    /// Returns the human readable message without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::ClientNotFound { message }
            | Self::InvalidClient { message }
            | Self::InvalidAuthorizeRequest { message }
            | Self::InvalidResponseType { message }
            | Self::InvalidRedirectUri { message }
            | Self::AccessRejected { message }
            | Self::GranterNotAvailable { message }
            | Self::UnauthorizedClient { message }
            | Self::InvalidTokenRequest { message }
            | Self::InvalidGrant { message }
            | Self::InvalidScope { message }
            | Self::UnsupportedTokenType { message }
            | Self::Internal { message } => message,
        }
    }

    /// Returns `true` if this error is the client's fault.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this error indicates a server-side failure.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns `true` if this error belongs to the authorize endpoint family.
    #[must_use]
    pub fn is_authorize_error(&self) -> bool {
        self.category() == ErrorCategory::Authorize
    }

    /// Returns `true` if this error belongs to the token endpoint family.
    #[must_use]
    pub fn is_grant_error(&self) -> bool {
        self.category() == ErrorCategory::Grant
    }

    /// Returns the error category for logging and monitoring.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ClientNotFound { .. } | Self::InvalidClient { .. } => ErrorCategory::Client,
            Self::InvalidAuthorizeRequest { .. }
            | Self::InvalidResponseType { .. }
            | Self::InvalidRedirectUri { .. }
            | Self::AccessRejected { .. } => ErrorCategory::Authorize,
            Self::GranterNotAvailable { .. }
            | Self::UnauthorizedClient { .. }
            | Self::InvalidTokenRequest { .. }
            | Self::InvalidGrant { .. }
            | Self::InvalidScope { .. }
            | Self::UnsupportedTokenType { .. } => ErrorCategory::Grant,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the stable internal error code.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            Self::ClientNotFound { .. } => CODE_CLIENT + 1,
            Self::InvalidClient { .. } => CODE_CLIENT + 2,
            Self::InvalidAuthorizeRequest { .. } => CODE_AUTHORIZE + 1,
            Self::InvalidResponseType { .. } => CODE_AUTHORIZE + 2,
            Self::InvalidRedirectUri { .. } => CODE_AUTHORIZE + 3,
            Self::AccessRejected { .. } => CODE_AUTHORIZE + 4,
            Self::GranterNotAvailable { .. } => CODE_GRANT + 1,
            Self::UnauthorizedClient { .. } => CODE_GRANT + 2,
            Self::InvalidTokenRequest { .. } => CODE_GRANT + 3,
            Self::InvalidGrant { .. } => CODE_GRANT + 4,
            Self::InvalidScope { .. } => CODE_GRANT + 5,
            Self::UnsupportedTokenType { .. } => CODE_GRANT + 6,
            Self::Internal { .. } => CODE_INTERNAL + 1,
        }
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::ClientNotFound { .. } | Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidAuthorizeRequest { .. } | Self::InvalidTokenRequest { .. } => {
                "invalid_request"
            }
            Self::InvalidResponseType { .. } => "unsupported_response_type",
            Self::InvalidRedirectUri { .. } => "redirect_uri_mismatch",
            Self::AccessRejected { .. } => "access_denied",
            Self::GranterNotAvailable { .. } => "unsupported_grant_type",
            Self::UnauthorizedClient { .. } => "unauthorized_client",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::UnsupportedTokenType { .. } => "unsupported_token_type",
            Self::Internal { .. } => "server_error",
        }
    }

    /// Returns the HTTP status code the transport layer should use.
    ///
    /// Internal errors answer 400 as well; they are not distinguished on the wire.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ClientNotFound { .. } | Self::InvalidClient { .. } => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Builds the wire-level error response.
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        let description = match self {
            Self::Internal { .. } => "internal server error".to_string(),
            other => other.message().to_string(),
        };
        ErrorResponse {
            status: self.status_code(),
            body: ErrorBody {
                error: self.oauth_error_code().to_string(),
                error_description: Some(description),
            },
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("serialization failed: {err}"))
    }
}

// =============================================================================
// Wire Response
// =============================================================================

/// JSON body of an OAuth 2.0 error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// The OAuth 2.0 error code.
    pub error: String,
    /// Human readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// A transport-agnostic OAuth 2.0 error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// JSON body.
    pub body: ErrorBody,
}

impl ErrorResponse {
    /// Headers every OAuth 2.0 error response must carry.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }
}

/// Categories of errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Client lookup and authentication.
    Client,
    /// Authorize endpoint validation.
    Authorize,
    /// Token endpoint validation and granting.
    Grant,
    /// Unexpected internal failures.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Authorize => write!(f, "authorize"),
            Self::Grant => write!(f, "grant"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::invalid_client("bad secret");
        assert_eq!(err.to_string(), "Invalid client: bad secret");

        let err = AuthError::invalid_grant("authorization code unknown");
        assert_eq!(err.to_string(), "Invalid grant: authorization code unknown");
        assert_eq!(err.message(), "authorization code unknown");
    }

    #[test]
    fn test_error_predicates() {
        let err = AuthError::invalid_scope("write");
        assert!(err.is_client_error());
        assert!(err.is_grant_error());
        assert!(!err.is_authorize_error());

        let err = AuthError::invalid_redirect_uri("not registered");
        assert!(err.is_authorize_error());

        let err = AuthError::internal("store down");
        assert!(err.is_server_error());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_oauth_error_code_and_status() {
        let cases = [
            (AuthError::client_not_found("x"), "invalid_client", 401),
            (AuthError::invalid_client("x"), "invalid_client", 401),
            (AuthError::invalid_authorize_request("x"), "invalid_request", 400),
            (AuthError::invalid_response_type("x"), "unsupported_response_type", 400),
            (AuthError::invalid_redirect_uri("x"), "redirect_uri_mismatch", 400),
            (AuthError::access_rejected("x"), "access_denied", 400),
            (AuthError::granter_not_available("x"), "unsupported_grant_type", 400),
            (AuthError::unauthorized_client("x"), "unauthorized_client", 400),
            (AuthError::invalid_token_request("x"), "invalid_request", 400),
            (AuthError::invalid_grant("x"), "invalid_grant", 400),
            (AuthError::invalid_scope("x"), "invalid_scope", 400),
            (AuthError::unsupported_token_type("x"), "unsupported_token_type", 400),
            (AuthError::internal("x"), "server_error", 400),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.oauth_error_code(), code, "{err}");
            assert_eq!(err.status_code().as_u16(), status, "{err}");
        }
    }

    #[test]
    fn test_internal_codes_are_unique() {
        let errors = [
            AuthError::client_not_found("x"),
            AuthError::invalid_client("x"),
            AuthError::invalid_authorize_request("x"),
            AuthError::invalid_response_type("x"),
            AuthError::invalid_redirect_uri("x"),
            AuthError::access_rejected("x"),
            AuthError::granter_not_available("x"),
            AuthError::unauthorized_client("x"),
            AuthError::invalid_token_request("x"),
            AuthError::invalid_grant("x"),
            AuthError::invalid_scope("x"),
            AuthError::unsupported_token_type("x"),
            AuthError::internal("x"),
        ];
        let codes: std::collections::HashSet<u32> = errors.iter().map(AuthError::code).collect();
        assert_eq!(codes.len(), errors.len());
        assert_eq!(AuthError::invalid_grant("x").code() & 0xFF00, CODE_GRANT);
    }

    #[test]
    fn test_error_response_headers_and_body() {
        let response = AuthError::invalid_grant("code expired").to_response();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body.error, "invalid_grant");
        assert_eq!(response.body.error_description.as_deref(), Some("code expired"));

        let headers = response.headers();
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "no-store");
        assert_eq!(headers.get(PRAGMA).unwrap(), "no-cache");
    }

    #[test]
    fn test_internal_error_hides_details() {
        let response = AuthError::internal("redis connection refused").to_response();
        assert_eq!(response.body.error, "server_error");
        assert_eq!(
            response.body.error_description.as_deref(),
            Some("internal server error")
        );
    }

    #[test]
    fn test_into_invalid_grant() {
        let err = AuthError::internal("account locked").into_invalid_grant();
        assert!(matches!(err, AuthError::InvalidGrant { ref message } if message == "account locked"));

        let err = AuthError::invalid_grant("same").into_invalid_grant();
        assert_eq!(err, AuthError::invalid_grant("same"));
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Client.to_string(), "client");
        assert_eq!(ErrorCategory::Grant.to_string(), "grant");
        assert_eq!(
            AuthError::access_rejected("x").category(),
            ErrorCategory::Authorize
        );
    }
}
