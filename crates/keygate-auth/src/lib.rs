//! # keygate-auth
//!
//! An OAuth 2.0 authorization server engine.
//!
//! This crate provides:
//! - Authorize request validation with wildcard redirect URI matching
//! - One-time authorization codes with PKCE
//! - A chain of token granters, including user and tenant switching
//! - An ordered token enhancer pipeline
//! - Revocation by session, user, client or token value
//!
//! ## Overview
//!
//! The engine is transport agnostic. A caller parses query or form
//! parameters into [`types::AuthorizeRequest`] or [`types::TokenRequest`],
//! hands them to the engine and renders the outcome. Errors carry their
//! OAuth 2.0 error code and HTTP status through
//! [`AuthError::to_response`].
//!
//! All long-lived state sits behind the traits in [`storage`].
//!
//! ## Modules
//!
//! - [`config`] - server configuration
//! - [`oauth`] - authorize endpoint, codes, PKCE and client authentication
//! - [`grant`] - token granters
//! - [`token`] - token issuance, enhancement, persistence and revocation
//! - [`storage`] - storage traits
//! - [`types`] - the data model

pub mod config;
pub mod constants;
pub mod error;
pub mod grant;
pub mod oauth;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthServerConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use grant::{CompositeTokenGranter, GrantOutcome, TokenGranter};
pub use oauth::{
    AuthorizationCodeStore, AuthorizeApprovalHandler, AuthorizeRequestProcessor,
    DefaultAuthorizationCodeStore, DefaultAuthorizeRequestProcessor,
};
pub use token::{
    AccessRevoker, AuthorizationService, CompositeTokenEnhancer, DefaultAccessRevoker,
    DefaultAuthorizationService, RegistryTokenStore, TokenEnhancer, TokenStore, TokenTypeHint,
};
pub use types::{AccessToken, Authentication, GrantType, OAuth2Client, RefreshToken};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use keygate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthServerConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::grant::{
        AuthorizationCodeGranter, ClientCredentialsGranter, CompositeTokenGranter, GrantOutcome,
        PasswordGranter, RefreshGranter, SwitchTenantGranter, SwitchUserGranter, TokenGranter,
    };
    pub use crate::oauth::{
        AuthenticatedClient, AuthorizationCodeStore, AuthorizeApprovalHandler,
        AuthorizeRequestProcessor, DefaultAuthorizationCodeStore,
        DefaultAuthorizeRequestProcessor, authenticate_client,
    };
    pub use crate::storage::{
        AccountStore, ApprovalStore, AuthorizationRegistry, ClientStore, KeyValueStore,
        SessionStore, TenantStore,
    };
    pub use crate::token::{
        AccessRevoker, AuthorizationService, CompositeTokenEnhancer, DefaultAccessRevoker,
        DefaultAuthorizationService, RegistryTokenStore, TokenEnhancer, TokenStore, TokenTypeHint,
    };
    pub use crate::types::{
        AccessToken, Authentication, AuthorizeRequest, GrantType, HasAuthTimes, HasProvider,
        HasProxy, HasRoles, HasTenant, HasUser, OAuth2Client, OAuth2Request, RefreshToken,
        TokenRequest, UserAuthentication,
    };
}
