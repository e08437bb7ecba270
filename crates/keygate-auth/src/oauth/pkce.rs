//! PKCE (Proof Key for Code Exchange), RFC 7636.
//!
//! A challenge recorded with the authorize request binds the authorization
//! code to whoever holds the matching verifier. Both `plain` and `S256` are
//! accepted; a challenge without a method is `plain`.
//!
//! # Example
//!
//! ```
//! use keygate_auth::oauth::{PkceChallengeMethod, compute_challenge, verify_challenge};
//!
//! let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
//! let challenge = compute_challenge(verifier, PkceChallengeMethod::S256);
//! assert!(verify_challenge(&challenge, PkceChallengeMethod::S256, verifier).is_ok());
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::constants::{PARAM_CODE_CHALLENGE, PARAM_CODE_CHALLENGE_METHOD};
use crate::error::AuthError;
use crate::types::OAuth2Request;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PkceError {
    /// Verifier length is outside 43-128 characters.
    #[error("invalid code_verifier length: must be 43-128 characters, got {0}")]
    InvalidVerifierLength(usize),

    #[error("invalid code_verifier characters: must be [A-Za-z0-9-._~]")]
    InvalidVerifierCharacters,

    #[error("unsupported code_challenge_method: {0}")]
    UnsupportedMethod(String),

    #[error("code_verifier is required")]
    MissingVerifier,

    #[error("code_verifier does not match code_challenge")]
    VerificationFailed,
}

impl From<PkceError> for AuthError {
    fn from(err: PkceError) -> Self {
        match err {
            PkceError::VerificationFailed => AuthError::invalid_grant(err.to_string()),
            _ => AuthError::invalid_token_request(err.to_string()),
        }
    }
}

// =============================================================================
// Challenge Method
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PkceChallengeMethod {
    /// The challenge is the verifier itself.
    #[default]
    Plain,
    /// `BASE64URL(SHA256(verifier))`.
    S256,
}

impl PkceChallengeMethod {
    /// Parses a `code_challenge_method` value. An absent or empty method is `plain`.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::UnsupportedMethod` for anything else.
    pub fn parse(method: Option<&str>) -> Result<Self, PkceError> {
        match method.unwrap_or_default() {
            "" | "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            other => Err(PkceError::UnsupportedMethod(other.to_string())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

impl std::fmt::Display for PkceChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Verification
// =============================================================================

/// Checks the verifier syntax from RFC 7636 section 4.1.
fn validate_verifier(verifier: &str) -> Result<(), PkceError> {
    if !(43..=128).contains(&verifier.len()) {
        return Err(PkceError::InvalidVerifierLength(verifier.len()));
    }
    if !verifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
    {
        return Err(PkceError::InvalidVerifierCharacters);
    }
    Ok(())
}

/// Derives the challenge a client would send for `verifier`.
#[must_use]
pub fn compute_challenge(verifier: &str, method: PkceChallengeMethod) -> String {
    match method {
        PkceChallengeMethod::Plain => verifier.to_string(),
        PkceChallengeMethod::S256 => URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes())),
    }
}

/// Verifies a verifier against a stored challenge.
///
/// # Errors
///
/// Returns a syntax error for malformed verifiers and
/// `PkceError::VerificationFailed` on mismatch.
pub fn verify_challenge(
    challenge: &str,
    method: PkceChallengeMethod,
    verifier: &str,
) -> Result<(), PkceError> {
    validate_verifier(verifier)?;
    if compute_challenge(verifier, method) == challenge {
        Ok(())
    } else {
        Err(PkceError::VerificationFailed)
    }
}

/// Enforces PKCE for a code redemption.
///
/// Requests stored without a `code_challenge` pass regardless of the verifier.
///
/// # Errors
///
/// Returns `PkceError` if the stored request demands a verifier and the
/// presented one is missing, malformed, or wrong.
pub fn verify_stored_request(
    stored: &OAuth2Request,
    verifier: Option<&str>,
) -> Result<(), PkceError> {
    let Some(challenge) = stored.parameter(PARAM_CODE_CHALLENGE) else {
        return Ok(());
    };
    let method = PkceChallengeMethod::parse(stored.parameter(PARAM_CODE_CHALLENGE_METHOD))?;
    let verifier = verifier
        .filter(|v| !v.is_empty())
        .ok_or(PkceError::MissingVerifier)?;
    verify_challenge(challenge, method, verifier)
}
