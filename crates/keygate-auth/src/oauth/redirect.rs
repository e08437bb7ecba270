//! Wildcard redirect URI matching.
//!
//! A registered redirect URI is a pattern. Host, port and path may contain
//! glob wildcards; scheme, userinfo and query parameters must match exactly.
//! A permissive match here is an open redirect, so every component that is
//! not explicitly a glob is compared strictly.
//!
//! # Glob syntax
//!
//! - `*` - any characters except `/`
//! - `**` - any characters including `/` (`/**/` also matches a single `/`)
//! - `?` - a single character except `/`
//! - `[abc]`, `[a-z]`, `[!a]` - character classes
//! - `{a,b}` - alternatives
//! - `\x` - literal `x`
//!
//! # Example
//!
//! ```
//! use keygate_auth::oauth::WildcardUrlMatcher;
//!
//! let matcher = WildcardUrlMatcher::new("https://*.example.com/**/callback").unwrap();
//! assert!(matcher.matches("https://app.example.com/a/b/callback").unwrap());
//! assert!(!matcher.matches("http://app.example.com/a/b/callback").unwrap());
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, LazyLock, RwLock};

use regex::Regex;
use url::Url;

use crate::AuthResult;
use crate::error::AuthError;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:(?P<scheme>[a-z][a-z0-9+\-.]*):/{1,2})?",
        r"(?:(?P<userinfo>[^@/]*)@)?",
        r"(?:(?P<domain>(?:[a-zA-Z0-9_\-*?\[\]{},]+\.)*[a-zA-Z0-9_\-*?\[\]{},]+)(?::(?P<port>[0-9*?\[\]]{1,5}))?)?",
        r"(?P<path>/?[^?#:]*)",
        r"(?:\?(?P<params>[^#]*))?",
        r"(?:#(?P<fragment>.*))?$",
    ))
    .expect("Invalid URL pattern regex")
});

fn scheme_to_port(scheme: &str) -> Option<&'static str> {
    match scheme {
        "http" => Some("80"),
        "https" => Some("443"),
        _ => None,
    }
}

fn has_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '\\', '[', ']', '{', '}'])
}

// =============================================================================
// Glob
// =============================================================================

/// A compiled glob expression.
#[derive(Debug, Clone)]
struct Glob {
    regex: Regex,
}

impl Glob {
    /// Compiles a glob into an anchored regex.
    fn compile(pattern: &str) -> Option<Self> {
        let mut out = String::with_capacity(pattern.len() * 2 + 2);
        out.push('^');

        let mut chars = pattern.chars().peekable();
        let mut in_alternatives = false;
        while let Some(c) = chars.next() {
            match c {
                '*' if chars.peek() == Some(&'*') => {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                }
                '*' => out.push_str("[^/]*"),
                '?' => out.push_str("[^/]"),
                '[' => {
                    out.push('[');
                    if matches!(chars.peek(), Some('!') | Some('^')) {
                        chars.next();
                        out.push('^');
                    }
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            ']' => {
                                closed = true;
                                break;
                            }
                            '\\' | '[' | '&' | '~' => {
                                out.push('\\');
                                out.push(c);
                            }
                            other => out.push(other),
                        }
                    }
                    if !closed {
                        return None;
                    }
                    out.push(']');
                }
                '{' if !in_alternatives => {
                    in_alternatives = true;
                    out.push_str("(?:");
                }
                ',' if in_alternatives => out.push('|'),
                '}' if in_alternatives => {
                    in_alternatives = false;
                    out.push(')');
                }
                '\\' => {
                    let escaped = chars.next()?;
                    out.push_str(&regex::escape(&escaped.to_string()));
                }
                other => out.push_str(&regex::escape(&other.to_string())),
            }
        }
        if in_alternatives {
            return None;
        }

        out.push('$');
        Regex::new(&out).ok().map(|regex| Self { regex })
    }

    fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// A pattern component: absent, literal, or glob.
#[derive(Debug, Clone)]
enum Component {
    Empty,
    Glob(Glob),
}

impl Component {
    fn compile(pattern: &str) -> AuthResult<Self> {
        if pattern.is_empty() {
            return Ok(Self::Empty);
        }
        Glob::compile(pattern)
            .map(Self::Glob)
            .ok_or_else(|| {
                AuthError::invalid_redirect_uri(format!("invalid wildcard expression [{pattern}]"))
            })
    }

    /// Matches `value`. An empty pattern only matches an empty value.
    fn matches(&self, value: &str) -> bool {
        match self {
            Self::Empty => value.is_empty(),
            Self::Glob(glob) => glob.is_match(value),
        }
    }
}

// =============================================================================
// Wildcard URL Matcher
// =============================================================================

/// A compiled redirect URI pattern.
#[derive(Debug, Clone)]
pub struct WildcardUrlMatcher {
    raw: String,
    scheme: String,
    userinfo: String,
    domain: String,
    port: String,
    path: Component,
    params: HashMap<String, BTreeSet<String>>,
    domain_glob: Option<Glob>,
    port_glob: Option<Glob>,
}

impl WildcardUrlMatcher {
    /// Compiles a redirect URI pattern.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRedirectUri` if the pattern cannot be parsed.
    pub fn new(pattern: &str) -> AuthResult<Self> {
        let captures = URL_PATTERN
            .captures(pattern.trim())
            .ok_or_else(|| AuthError::invalid_redirect_uri(format!("invalid pattern {pattern}")))?;
        let group = |name: &str| {
            captures
                .name(name)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default()
        };

        let domain = group("domain").to_ascii_lowercase();
        let port = group("port");
        let path = group("path");
        let path = if path.is_empty() { "/".to_string() } else { path };

        let mut params: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (key, value) in url::form_urlencoded::parse(group("params").as_bytes()) {
            params
                .entry(key.into_owned())
                .or_default()
                .insert(value.into_owned());
        }

        let domain_glob = if has_wildcard(&domain) {
            Some(Glob::compile(&domain).ok_or_else(|| {
                AuthError::invalid_redirect_uri(format!("invalid host wildcard [{domain}]"))
            })?)
        } else {
            None
        };
        let port_glob = if port.is_empty() {
            None
        } else {
            Some(Glob::compile(&port).ok_or_else(|| {
                AuthError::invalid_redirect_uri(format!("invalid port wildcard [{port}]"))
            })?)
        };

        Ok(Self {
            raw: pattern.to_string(),
            scheme: group("scheme"),
            userinfo: group("userinfo"),
            domain,
            port,
            path: Component::compile(&path)?,
            params,
            domain_glob,
            port_glob,
        })
    }

    /// Returns the raw pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.raw
    }

    /// Checks a candidate URL against this pattern.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRedirectUri` if the candidate is not an absolute URL.
    pub fn matches(&self, candidate: &str) -> AuthResult<bool> {
        let url = Url::parse(candidate).map_err(|e| {
            AuthError::invalid_redirect_uri(format!("invalid redirect_uri [{candidate}]: {e}"))
        })?;

        // Custom schemes get no wildcard treatment at all.
        if scheme_to_port(url.scheme()).is_none() {
            return Ok(candidate == self.raw);
        }

        Ok(self.scheme_matches(url.scheme())
            && self.userinfo_matches(&url)
            && self.query_matches(&url)
            && self.host_matches(url.host_str().unwrap_or_default())
            && self.port_matches(&url)
            && self.path.matches(url.path()))
    }

    fn scheme_matches(&self, scheme: &str) -> bool {
        self.scheme.is_empty() || self.scheme == scheme
    }

    fn userinfo_matches(&self, url: &Url) -> bool {
        let actual = match url.password() {
            Some(password) => format!("{}:{}", url.username(), password),
            None => url.username().to_string(),
        };
        actual == self.userinfo
    }

    fn host_matches(&self, host: &str) -> bool {
        match &self.domain_glob {
            Some(glob) => glob.is_match(host),
            None => {
                self.domain.is_empty()
                    || self.domain == host
                    || host
                        .strip_suffix(self.domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
        }
    }

    fn port_matches(&self, url: &Url) -> bool {
        let expected = if self.port.is_empty() {
            if self.scheme.is_empty() && self.domain.is_empty() {
                return true;
            }
            let scheme = if self.scheme.is_empty() {
                url.scheme()
            } else {
                self.scheme.as_str()
            };
            match scheme_to_port(scheme) {
                Some(port) => port,
                None => return false,
            }
        } else {
            self.port.as_str()
        };

        let actual = match url.port() {
            Some(port) => port.to_string(),
            None => scheme_to_port(url.scheme()).unwrap_or_default().to_string(),
        };

        match &self.port_glob {
            Some(glob) => glob.is_match(&actual),
            None => actual == expected,
        }
    }

    /// Every pattern key must be present with exactly the same value set.
    fn query_matches(&self, url: &Url) -> bool {
        if self.params.is_empty() {
            return true;
        }
        let mut actual: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in url.query_pairs() {
            actual
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        self.params.iter().all(|(key, expected)| {
            actual.get(key).is_some_and(|values| {
                values.len() == expected.len() && values.iter().all(|v| expected.contains(v))
            })
        })
    }
}

impl std::fmt::Display for WildcardUrlMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "matches pattern {}", self.raw)
    }
}

// =============================================================================
// Matcher Cache
// =============================================================================

/// Caches compiled redirect URI patterns by their raw text.
#[derive(Debug, Default)]
pub struct RedirectUriMatcherCache {
    cache: RwLock<HashMap<String, Arc<WildcardUrlMatcher>>>,
}

impl RedirectUriMatcherCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a compiled matcher from cache or compile and cache it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRedirectUri` if the pattern cannot be compiled.
    pub fn get_or_compile(&self, pattern: &str) -> AuthResult<Arc<WildcardUrlMatcher>> {
        if let Some(matcher) = self
            .cache
            .read()
            .ok()
            .and_then(|cache| cache.get(pattern).cloned())
        {
            return Ok(matcher);
        }

        let matcher = Arc::new(WildcardUrlMatcher::new(pattern)?);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(pattern.to_string(), Arc::clone(&matcher));
        }
        Ok(matcher)
    }
}
