//! Access and refresh token types.
//!
//! Expiry is computed lazily: nothing sweeps expired tokens, callers check
//! [`AccessToken::is_expired`] when they read one.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime, UtcOffset};

use super::claims::TokenClaims;
use crate::AuthResult;
use crate::error::AuthError;

/// Wire field names of the token response.
pub mod fields {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const TOKEN_TYPE: &str = "token_type";
    pub const ISSUE_TIME: &str = "iat";
    pub const EXPIRY_TIME: &str = "expiry";
    pub const EXPIRES_IN: &str = "expires_in";
    pub const SCOPE: &str = "scope";
    pub const REFRESH_TOKEN: &str = "refresh_token";
}

const RESERVED_FIELDS: &[&str] = &[
    fields::ACCESS_TOKEN,
    fields::TOKEN_TYPE,
    fields::ISSUE_TIME,
    fields::EXPIRY_TIME,
    fields::EXPIRES_IN,
    fields::SCOPE,
    fields::REFRESH_TOKEN,
];

/// Normalizes an instant to UTC with whole-second precision.
///
/// Token times travel as whole seconds on the wire and in claims, so they are
/// truncated on the way in to keep round trips exact.
#[must_use]
pub fn truncate_to_seconds(time: OffsetDateTime) -> OffsetDateTime {
    let utc = time.to_offset(UtcOffset::UTC);
    utc.replace_nanosecond(0).unwrap_or(utc)
}

/// The instant `validity` after `start`.
///
/// # Errors
///
/// Returns `Internal` if the result does not fit a timestamp.
pub fn expiry_after(
    start: OffsetDateTime,
    validity: std::time::Duration,
) -> AuthResult<OffsetDateTime> {
    Duration::try_from(validity)
        .ok()
        .and_then(|v| start.checked_add(v))
        .ok_or_else(|| {
            AuthError::internal(format!(
                "validity of {}s is out of range",
                validity.as_secs()
            ))
        })
}

/// Generates a 256-bit random token value encoded as base64url.
#[must_use]
pub fn generate_token_value() -> String {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

// =============================================================================
// Token Type
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TokenType {
    #[default]
    Bearer,
}

impl TokenType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bearer => "bearer",
        }
    }

    /// Parses a token type (case-insensitive).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        value.eq_ignore_ascii_case("bearer").then_some(Self::Bearer)
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Refresh Token
// =============================================================================

/// A refresh token. It never references the access tokens issued from it.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshToken {
    pub value: String,
    pub issue_time: OffsetDateTime,
    pub expiry_time: Option<OffsetDateTime>,
    pub claims: Option<TokenClaims>,
    pub details: BTreeMap<String, Value>,
}

impl RefreshToken {
    /// Creates a refresh token issued now, without expiry.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            issue_time: truncate_to_seconds(OffsetDateTime::now_utc()),
            expiry_time: None,
            claims: None,
            details: BTreeMap::new(),
        }
    }

    /// Creates a refresh token with a freshly generated value.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(generate_token_value())
    }

    pub fn set_expiry_time(&mut self, expiry: Option<OffsetDateTime>) {
        self.expiry_time = expiry.map(truncate_to_seconds);
    }

    /// Returns `true` if this token carries an expiry at all.
    #[must_use]
    pub fn will_expire(&self) -> bool {
        self.expiry_time.is_some()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expiry_time.is_some_and(|exp| exp < now)
    }
}

// =============================================================================
// Access Token
// =============================================================================

/// An access token, optionally owning one refresh token.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub value: String,
    pub token_type: TokenType,
    pub issue_time: OffsetDateTime,
    pub expiry_time: Option<OffsetDateTime>,
    pub scopes: BTreeSet<String>,
    /// Structured claims. Never written to the token response.
    pub claims: Option<TokenClaims>,
    pub details: BTreeMap<String, Value>,
    pub refresh_token: Option<RefreshToken>,
}

impl AccessToken {
    /// Creates a bearer token issued now, without expiry.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            token_type: TokenType::Bearer,
            issue_time: truncate_to_seconds(OffsetDateTime::now_utc()),
            expiry_time: None,
            scopes: BTreeSet::new(),
            claims: None,
            details: BTreeMap::new(),
            refresh_token: None,
        }
    }

    pub fn set_issue_time(&mut self, issue_time: OffsetDateTime) {
        self.issue_time = truncate_to_seconds(issue_time);
    }

    pub fn set_expiry_time(&mut self, expiry: Option<OffsetDateTime>) {
        self.expiry_time = expiry.map(truncate_to_seconds);
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: RefreshToken) -> Self {
        self.refresh_token = Some(refresh_token);
        self
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expiry_time.is_some_and(|exp| exp < now)
    }

    /// Seconds until expiry, clamped at zero.
    #[must_use]
    pub fn expires_in(&self, now: OffsetDateTime) -> Option<i64> {
        self.expiry_time
            .map(|exp| (exp - now).whole_seconds().max(0))
    }

    /// Returns `true` if a refresh token is attached and still usable.
    #[must_use]
    pub fn has_live_refresh_token(&self) -> bool {
        self.refresh_token.as_ref().is_some_and(|r| !r.is_expired())
    }
}

// -----------------------------------------------------------------------------
// Wire format
// -----------------------------------------------------------------------------

fn format_time(time: OffsetDateTime) -> Result<String, time::error::Format> {
    time.format(&Rfc3339)
}

fn parse_time(field: &str, value: &Value) -> Result<OffsetDateTime, String> {
    let text = value
        .as_str()
        .ok_or_else(|| format!("field [{field}] must be an RFC 3339 string"))?;
    OffsetDateTime::parse(text, &Rfc3339)
        .map(truncate_to_seconds)
        .map_err(|e| format!("cannot parse field [{field}]: {e}"))
}

impl Serialize for AccessToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as _;

        let mut data: Map<String, Value> = self
            .details
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        data.insert(fields::ACCESS_TOKEN.into(), Value::String(self.value.clone()));
        data.insert(
            fields::TOKEN_TYPE.into(),
            Value::String(self.token_type.as_str().into()),
        );
        let scope = self.scopes.iter().cloned().collect::<Vec<_>>().join(" ");
        data.insert(fields::SCOPE.into(), Value::String(scope));
        data.insert(
            fields::ISSUE_TIME.into(),
            Value::String(format_time(self.issue_time).map_err(S::Error::custom)?),
        );
        if let Some(expiry) = self.expiry_time {
            data.insert(
                fields::EXPIRY_TIME.into(),
                Value::String(format_time(expiry).map_err(S::Error::custom)?),
            );
            let expires_in = self.expires_in(OffsetDateTime::now_utc()).unwrap_or(0);
            data.insert(fields::EXPIRES_IN.into(), Value::from(expires_in));
        }
        if let Some(refresh) = &self.refresh_token {
            data.insert(
                fields::REFRESH_TOKEN.into(),
                Value::String(refresh.value.clone()),
            );
        }

        data.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AccessToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut data = Map::<String, Value>::deserialize(deserializer)?;

        let required_string = |data: &Map<String, Value>, field: &str| {
            data.get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| D::Error::custom(format!("cannot find required field [{field}]")))
        };

        let value = required_string(&data, fields::ACCESS_TOKEN)?;
        let token_type = required_string(&data, fields::TOKEN_TYPE)?;
        let token_type = TokenType::parse(&token_type)
            .ok_or_else(|| D::Error::custom(format!("unsupported token type [{token_type}]")))?;
        let scopes = required_string(&data, fields::SCOPE)?
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let issue_time = match data.get(fields::ISSUE_TIME) {
            Some(v) => parse_time(fields::ISSUE_TIME, v).map_err(D::Error::custom)?,
            None => truncate_to_seconds(OffsetDateTime::now_utc()),
        };

        let expiry_time = match (data.get(fields::EXPIRY_TIME), data.get(fields::EXPIRES_IN)) {
            (Some(v), _) => Some(parse_time(fields::EXPIRY_TIME, v).map_err(D::Error::custom)?),
            (None, Some(v)) => {
                let secs = v.as_i64().ok_or_else(|| {
                    D::Error::custom(format!("field [{}] must be an integer", fields::EXPIRES_IN))
                })?;
                let expiry = issue_time.checked_add(Duration::seconds(secs)).ok_or_else(|| {
                    D::Error::custom(format!("field [{}] is out of range", fields::EXPIRES_IN))
                })?;
                Some(expiry)
            }
            (None, None) => None,
        };

        let refresh_token = match data.get(fields::REFRESH_TOKEN) {
            Some(Value::String(v)) => Some(RefreshToken::new(v.clone())),
            Some(_) => {
                return Err(D::Error::custom(format!(
                    "field [{}] must be a string",
                    fields::REFRESH_TOKEN
                )));
            }
            None => None,
        };

        data.retain(|k, _| !RESERVED_FIELDS.contains(&k.as_str()));

        Ok(Self {
            value,
            token_type,
            issue_time,
            expiry_time,
            scopes,
            claims: None,
            details: data.into_iter().collect(),
            refresh_token,
        })
    }
}
