//! Web sessions and stored consent.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A login session tokens may be bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Session cookie or store name.
    pub name: String,
    pub principal_name: String,
}

impl Session {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        principal_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            principal_name: principal_name.into(),
        }
    }
}

/// A user's decision about one scope for one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub username: String,
    pub client_id: String,
    pub scope: String,
    pub approved: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}
