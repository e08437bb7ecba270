//! Storage traits consumed by the engine.
//!
//! The engine holds no state of its own; everything long-lived sits behind
//! these traits and is passed into services by constructor.
//!
//! # Implementations
//!
//! - `keygate-auth-memory` - in-memory backend built on `dashmap`

pub mod account;
pub mod approval;
pub mod client;
pub mod kv;
pub mod registry;
pub mod session;

pub use account::{AccountStore, TenantStore};
pub use approval::ApprovalStore;
pub use client::ClientStore;
pub use kv::KeyValueStore;
pub use registry::AuthorizationRegistry;
pub use session::SessionStore;
