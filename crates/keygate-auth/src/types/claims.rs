//! Token claim sets.
//!
//! Each claim type owns an explicit table mapping stable claim keys to its
//! fields. Keys outside the table are kept in an `extra` map so unknown
//! claims survive a round trip unchanged.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use time::OffsetDateTime;

/// Claim key constants.
pub mod keys {
    pub const ISSUER: &str = "iss";
    pub const SUBJECT: &str = "sub";
    pub const AUDIENCE: &str = "aud";
    pub const EXPIRES_AT: &str = "exp";
    pub const ISSUED_AT: &str = "iat";
    pub const NOT_BEFORE: &str = "nbf";
    pub const JWT_ID: &str = "jti";
    pub const SCOPE: &str = "scope";
    pub const CLIENT_ID: &str = "client_id";

    pub const FIRST_NAME: &str = "firstName";
    pub const LAST_NAME: &str = "lastName";
    pub const EMAIL: &str = "email";
    pub const TENANT_ID: &str = "tenantId";
    pub const USERNAME: &str = "user_name";
}

const BASIC_KEYS: &[&str] = &[
    keys::ISSUER,
    keys::SUBJECT,
    keys::AUDIENCE,
    keys::EXPIRES_AT,
    keys::ISSUED_AT,
    keys::NOT_BEFORE,
    keys::JWT_ID,
    keys::SCOPE,
    keys::CLIENT_ID,
];

const LEGACY_KEYS: &[&str] = &[
    keys::FIRST_NAME,
    keys::LAST_NAME,
    keys::EMAIL,
    keys::TENANT_ID,
    keys::USERNAME,
];

/// A claim value had the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("claim '{claim}' must be {expected}")]
pub struct ClaimError {
    pub claim: String,
    pub expected: &'static str,
}

impl ClaimError {
    fn new(claim: &str, expected: &'static str) -> Self {
        Self {
            claim: claim.to_string(),
            expected,
        }
    }
}

// -----------------------------------------------------------------------------
// Value conversions
// -----------------------------------------------------------------------------

fn string_value(key: &str, value: Value) -> Result<String, ClaimError> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(ClaimError::new(key, "a string")),
    }
}

fn time_value(key: &str, value: Value) -> Result<OffsetDateTime, ClaimError> {
    value
        .as_i64()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .ok_or_else(|| ClaimError::new(key, "a unix timestamp"))
}

/// Accepts a single string, a space-delimited string, or an array of strings.
fn set_value(key: &str, value: Value) -> Result<BTreeSet<String>, ClaimError> {
    match value {
        Value::String(s) => Ok(s.split_whitespace().map(str::to_string).collect()),
        Value::Array(items) => items
            .into_iter()
            .map(|v| string_value(key, v))
            .collect(),
        _ => Err(ClaimError::new(key, "a string or an array of strings")),
    }
}

fn set_to_value(set: &BTreeSet<String>) -> Option<Value> {
    (!set.is_empty()).then(|| Value::Array(set.iter().cloned().map(Value::String).collect()))
}

fn time_to_value(time: Option<OffsetDateTime>) -> Option<Value> {
    time.map(|t| Value::from(t.unix_timestamp()))
}

// =============================================================================
// Basic Claims
// =============================================================================

/// Registered JWT claims plus scope and client id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicClaims {
    pub jti: Option<String>,
    pub iss: Option<String>,
    pub sub: Option<String>,
    pub aud: BTreeSet<String>,
    pub exp: Option<OffsetDateTime>,
    pub iat: Option<OffsetDateTime>,
    pub nbf: Option<OffsetDateTime>,
    pub scope: BTreeSet<String>,
    pub client_id: Option<String>,
    /// Claims outside the table above.
    pub extra: BTreeMap<String, Value>,
}

impl BasicClaims {
    /// Returns a claim by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            keys::JWT_ID => self.jti.clone().map(Value::String),
            keys::ISSUER => self.iss.clone().map(Value::String),
            keys::SUBJECT => self.sub.clone().map(Value::String),
            keys::AUDIENCE => set_to_value(&self.aud),
            keys::EXPIRES_AT => time_to_value(self.exp),
            keys::ISSUED_AT => time_to_value(self.iat),
            keys::NOT_BEFORE => time_to_value(self.nbf),
            keys::SCOPE => set_to_value(&self.scope),
            keys::CLIENT_ID => self.client_id.clone().map(Value::String),
            other => self.extra.get(other).cloned(),
        }
    }

    /// Sets a claim by key. `Value::Null` clears it.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError` if the value does not fit the claim's type.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), ClaimError> {
        if value.is_null() {
            self.clear(key);
            return Ok(());
        }
        match key {
            keys::JWT_ID => self.jti = Some(string_value(key, value)?),
            keys::ISSUER => self.iss = Some(string_value(key, value)?),
            keys::SUBJECT => self.sub = Some(string_value(key, value)?),
            keys::AUDIENCE => self.aud = set_value(key, value)?,
            keys::EXPIRES_AT => self.exp = Some(time_value(key, value)?),
            keys::ISSUED_AT => self.iat = Some(time_value(key, value)?),
            keys::NOT_BEFORE => self.nbf = Some(time_value(key, value)?),
            keys::SCOPE => self.scope = set_value(key, value)?,
            keys::CLIENT_ID => self.client_id = Some(string_value(key, value)?),
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
        Ok(())
    }

    fn clear(&mut self, key: &str) {
        match key {
            keys::JWT_ID => self.jti = None,
            keys::ISSUER => self.iss = None,
            keys::SUBJECT => self.sub = None,
            keys::AUDIENCE => self.aud.clear(),
            keys::EXPIRES_AT => self.exp = None,
            keys::ISSUED_AT => self.iat = None,
            keys::NOT_BEFORE => self.nbf = None,
            keys::SCOPE => self.scope.clear(),
            keys::CLIENT_ID => self.client_id = None,
            other => {
                self.extra.remove(other);
            }
        }
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns the keys of all claims that are present.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.to_map().into_keys().collect()
    }

    /// Flattens the claims into a key/value map.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        let mut map = self.extra.clone();
        for key in BASIC_KEYS {
            if let Some(value) = self.get(key) {
                map.insert((*key).to_string(), value);
            }
        }
        map
    }

    /// Builds claims from a key/value map.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError` if a known claim has the wrong type.
    pub fn from_map(map: BTreeMap<String, Value>) -> Result<Self, ClaimError> {
        let mut claims = Self::default();
        for (key, value) in map {
            claims.set(&key, value)?;
        }
        Ok(claims)
    }
}

// =============================================================================
// Legacy Claims
// =============================================================================

/// Basic claims plus flattened user fields expected by older resource servers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyClaims {
    pub basic: BasicClaims,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub tenant_id: Option<String>,
    pub username: Option<String>,
}

impl LegacyClaims {
    #[must_use]
    pub fn new(basic: BasicClaims) -> Self {
        Self {
            basic,
            ..Default::default()
        }
    }

    fn field(&self, key: &str) -> Option<&Option<String>> {
        match key {
            keys::FIRST_NAME => Some(&self.first_name),
            keys::LAST_NAME => Some(&self.last_name),
            keys::EMAIL => Some(&self.email),
            keys::TENANT_ID => Some(&self.tenant_id),
            keys::USERNAME => Some(&self.username),
            _ => None,
        }
    }

    fn field_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            keys::FIRST_NAME => Some(&mut self.first_name),
            keys::LAST_NAME => Some(&mut self.last_name),
            keys::EMAIL => Some(&mut self.email),
            keys::TENANT_ID => Some(&mut self.tenant_id),
            keys::USERNAME => Some(&mut self.username),
            _ => None,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.field(key) {
            Some(field) => field.clone().map(Value::String),
            None => self.basic.get(key),
        }
    }

    /// Sets a claim by key. `Value::Null` clears it.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError` if the value does not fit the claim's type.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), ClaimError> {
        match self.field_mut(key) {
            Some(field) if value.is_null() => {
                *field = None;
                Ok(())
            }
            Some(field) => {
                *field = Some(string_value(key, value)?);
                Ok(())
            }
            None => self.basic.set(key, value),
        }
    }

    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        let mut map = self.basic.to_map();
        for key in LEGACY_KEYS {
            if let Some(value) = self.get(key) {
                map.insert((*key).to_string(), value);
            }
        }
        map
    }

    /// Builds claims from a key/value map.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError` if a known claim has the wrong type.
    pub fn from_map(map: BTreeMap<String, Value>) -> Result<Self, ClaimError> {
        let mut claims = Self::default();
        for (key, value) in map {
            claims.set(&key, value)?;
        }
        Ok(claims)
    }
}

// =============================================================================
// Token Claims
// =============================================================================

/// The claim set attached to a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenClaims {
    Basic(BasicClaims),
    Legacy(LegacyClaims),
}

impl TokenClaims {
    /// Returns the registered claims regardless of the variant.
    #[must_use]
    pub fn basic(&self) -> &BasicClaims {
        match self {
            Self::Basic(claims) => claims,
            Self::Legacy(claims) => &claims.basic,
        }
    }

    pub fn basic_mut(&mut self) -> &mut BasicClaims {
        match self {
            Self::Basic(claims) => claims,
            Self::Legacy(claims) => &mut claims.basic,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Self::Basic(claims) => claims.get(key),
            Self::Legacy(claims) => claims.get(key),
        }
    }

    /// Sets a claim by key.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError` if the value does not fit the claim's type.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), ClaimError> {
        match self {
            Self::Basic(claims) => claims.set(key, value),
            Self::Legacy(claims) => claims.set(key, value),
        }
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        match self {
            Self::Basic(claims) => claims.to_map(),
            Self::Legacy(claims) => claims.to_map(),
        }
    }
}

impl Serialize for BasicClaims {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BasicClaims {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, Value>::deserialize(deserializer)?;
        Self::from_map(map).map_err(D::Error::custom)
    }
}

impl Serialize for LegacyClaims {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LegacyClaims {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, Value>::deserialize(deserializer)?;
        Self::from_map(map).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn test_basic_claims_table() {
        let mut claims = BasicClaims::default();
        claims.set("jti", json!("abc")).unwrap();
        claims.set("aud", json!("c1")).unwrap();
        claims.set("exp", json!(1_700_000_000)).unwrap();
        claims.set("scope", json!(["read", "write"])).unwrap();

        assert_eq!(claims.jti.as_deref(), Some("abc"));
        assert!(claims.aud.contains("c1"));
        assert_eq!(claims.exp.unwrap().unix_timestamp(), 1_700_000_000);
        assert_eq!(claims.get("scope"), Some(json!(["read", "write"])));
        assert!(!claims.has("sub"));
    }

    #[test]
    fn test_wrong_claim_type_is_rejected() {
        let mut claims = BasicClaims::default();
        let err = claims.set("exp", json!("tomorrow")).unwrap_err();
        assert_eq!(err.claim, "exp");
        assert!(claims.set("iss", json!(42)).is_err());
    }

    #[test]
    fn test_unknown_claims_roundtrip() {
        let json = json!({
            "jti": "id-1",
            "iat": 1_700_000_000,
            "custom": {"nested": [1, 2]},
            "aud": ["c1", "c2"]
        });
        let claims: BasicClaims = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(claims.extra.get("custom"), Some(&json!({"nested": [1, 2]})));
        assert_eq!(serde_json::to_value(&claims).unwrap(), json);
    }

    #[test]
    fn test_null_clears_claim() {
        let mut claims = BasicClaims {
            sub: Some("alice".into()),
            ..Default::default()
        };
        claims.set("sub", Value::Null).unwrap();
        assert!(claims.sub.is_none());
    }

    #[test]
    fn test_legacy_claims_delegate_to_basic() {
        let basic = BasicClaims {
            iss: Some("https://auth".into()),
            iat: Some(datetime!(2024-01-01 00:00 UTC)),
            ..Default::default()
        };
        let mut claims = LegacyClaims::new(basic);
        claims.set("email", json!("a@example.com")).unwrap();
        claims.set("sub", json!("alice")).unwrap();

        assert_eq!(claims.get("iss"), Some(json!("https://auth")));
        assert_eq!(claims.basic.sub.as_deref(), Some("alice"));

        let map = claims.to_map();
        assert_eq!(map.get("email"), Some(&json!("a@example.com")));
        assert!(!map.contains_key("firstName"));

        let parsed = LegacyClaims::from_map(map).unwrap();
        assert_eq!(parsed, claims);
    }

    #[test]
    fn test_token_claims_keys_are_unique() {
        let mut claims = TokenClaims::Legacy(LegacyClaims::default());
        claims.set("jti", json!("x")).unwrap();
        claims.set("jti", json!("y")).unwrap();
        claims.set("user_name", json!("alice")).unwrap();

        assert_eq!(claims.basic().jti.as_deref(), Some("y"));
        let map = claims.to_map();
        assert_eq!(map.len(), 2);
        assert!(claims.has("user_name"));
    }
}
