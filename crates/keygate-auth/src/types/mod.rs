//! Domain types shared across the engine.
//!
//! ## Domain Types
//!
//! - [`OAuth2Client`] - registered client
//! - [`AuthorizeRequest`], [`TokenRequest`], [`OAuth2Request`] - request lifecycle
//! - [`Authentication`] - the authorization ticket
//! - [`AccessToken`], [`RefreshToken`] - issued tokens
//! - [`TokenClaims`] - claim sets attached to tokens
//! - [`ContextDetails`] and its capability traits

pub mod account;
pub mod authentication;
pub mod claims;
pub mod client;
pub mod details;
pub mod request;
pub mod session;
pub mod token;

pub use account::{Account, Tenant};
pub use authentication::{Authentication, AuthenticationState, UserAuthentication};
pub use claims::{BasicClaims, ClaimError, LegacyClaims, TokenClaims};
pub use client::{ClientValidationError, GrantType, OAuth2Client};
pub use details::{
    AuthTimes, ContextDetails, HasAuthTimes, HasProvider, HasProxy, HasRoles, HasTenant, HasUser,
    ProxyDetails, TenantDetails, UserDetails,
};
pub use request::{AuthorizeContext, AuthorizeRequest, OAuth2Request, TokenRequest};
pub use session::{Approval, Session};
pub use token::{AccessToken, RefreshToken, TokenType};
