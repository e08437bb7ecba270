//! Authorization endpoint processing and the validation shared with the
//! token endpoint.
//!
//! # Authorization Code Flow
//!
//! - [`authorize`] - validates inbound authorize requests
//! - [`authorize_handler`] - answers an approved request with a code or an
//!   implicit token
//! - [`code_store`] - one-time authorization codes
//! - [`pkce`] - proof key for code exchange
//!
//! [`redirect`] matches redirect URIs against registered wildcard patterns,
//! [`client_auth`] authenticates clients at the token endpoint and
//! [`validation`] holds the checks every granter reuses.
//!
//! # Example
//!
//! ```ignore
//! use keygate_auth::oauth::{AuthorizeApprovalHandler, AuthorizeRequestProcessor};
//!
//! let mut request = AuthorizeRequest::from_parameters(query);
//! processor.process(&mut request).await?;
//! // ... the user approves ...
//! let redirect = handler.handle_approved(&mut request, user_auth, Some(&session_id)).await?;
//! ```

pub mod authorize;
pub mod authorize_handler;
pub mod client_auth;
pub mod code_store;
pub mod pkce;
pub mod redirect;
pub mod validation;

pub use authorize::{
    AuthorizationErrorResponse, AuthorizeRequestProcessor, DefaultAuthorizeRequestProcessor,
    ResponseMode, build_redirect_url,
};
pub use authorize_handler::AuthorizeApprovalHandler;
pub use client_auth::{
    AuthenticatedClient, authenticate_client, hash_secret, parse_basic_auth, verify_secret,
};
pub use code_store::{AuthorizationCodeStore, DefaultAuthorizationCodeStore};
pub use pkce::{PkceChallengeMethod, PkceError, compute_challenge, verify_challenge};
pub use redirect::{RedirectUriMatcherCache, WildcardUrlMatcher};
