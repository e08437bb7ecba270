//! Well-known parameter names, permissions, and special values.

// =============================================================================
// Request Parameters
// =============================================================================

pub const PARAM_CLIENT_ID: &str = "client_id";
pub const PARAM_CLIENT_SECRET: &str = "client_secret";
pub const PARAM_RESPONSE_TYPE: &str = "response_type";
pub const PARAM_REDIRECT_URI: &str = "redirect_uri";
pub const PARAM_SCOPE: &str = "scope";
pub const PARAM_STATE: &str = "state";
pub const PARAM_GRANT_TYPE: &str = "grant_type";
pub const PARAM_USERNAME: &str = "username";
pub const PARAM_PASSWORD: &str = "password";
pub const PARAM_TENANT_ID: &str = "tenant_id";
pub const PARAM_TENANT_EXTERNAL_ID: &str = "tenant_external_id";
pub const PARAM_AUTH_CODE: &str = "code";
pub const PARAM_CODE_CHALLENGE: &str = "code_challenge";
pub const PARAM_CODE_CHALLENGE_METHOD: &str = "code_challenge_method";
pub const PARAM_CODE_VERIFIER: &str = "code_verifier";
pub const PARAM_REFRESH_TOKEN: &str = "refresh_token";
pub const PARAM_ACCESS_TOKEN: &str = "access_token";
pub const PARAM_SWITCH_USERNAME: &str = "switch_username";
pub const PARAM_SWITCH_USER_ID: &str = "switch_user_id";
pub const PARAM_USER_APPROVAL: &str = "user_oauth_approval";

/// Prefix of per-scope approval parameters, e.g. `scope.read=true`.
pub const PARAM_SCOPE_APPROVAL_PREFIX: &str = "scope.";

// =============================================================================
// Permissions
// =============================================================================

pub const PERMISSION_SWITCH_USER: &str = "SWITCH_USER";
pub const PERMISSION_SWITCH_TENANT: &str = "SWITCH_TENANT";
pub const PERMISSION_ACCESS_ALL_TENANT: &str = "ACCESS_ALL_TENANT";

/// Assigned tenant id that grants access to every tenant.
pub const TENANT_ID_WILDCARD: &str = "*";

// =============================================================================
// Detail Keys
// =============================================================================

/// User authentication detail key holding the web session id.
pub const DETAILS_KEY_SESSION_ID: &str = "session_id";
