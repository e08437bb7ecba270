//! Token issuance, persistence and revocation.
//!
//! - [`service`] - builds authentications and issues tokens
//! - [`enhancer`] - the ordered pipeline that stamps times and claims
//! - [`store`] - token persistence
//! - [`revocation`] - revoking by session, user, client or token value

pub mod enhancer;
pub mod revocation;
pub mod service;
pub mod store;

pub use enhancer::{
    BasicClaimsTokenEnhancer, CompositeTokenEnhancer, ExpiryTokenEnhancer,
    LegacyClaimsTokenEnhancer, RefreshTokenEnhancer, TokenEnhancer,
};
pub use revocation::{AccessRevoker, DefaultAccessRevoker, TokenTypeHint};
pub use service::{AuthorizationService, DefaultAuthorizationService};
pub use store::{RegistryTokenStore, TokenStore};
