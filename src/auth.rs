//! Inbound authentication for `tools/call`.

use std::fmt;
use std::sync::Arc;

use axum::http::{header, HeaderMap};

use crate::config::AuthMode;

/// Outcome of authenticating one inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    pub authenticated: bool,
    /// Credential to use upstream instead of the configured API key.
    pub access_token: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn granted() -> Self {
        Self { authenticated: true, access_token: None }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self { authenticated: true, access_token: Some(token.into()) }
    }
}

/// Derives an [`AuthContext`] from request headers before dispatch.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, headers: &HeaderMap) -> AuthContext;
}

/// Build the authorizer for a configured mode.
pub fn from_mode(mode: &AuthMode) -> Arc<dyn Authorizer> {
    match mode {
        AuthMode::Open => Arc::new(OpenAccess),
        AuthMode::Bearer(tokens) => Arc::new(StaticBearerAuth::new(tokens.clone())),
        AuthMode::Passthrough => Arc::new(PassthroughBearerAuth),
    }
}

/// Every request is authenticated; upstream uses the configured key.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAccess;

impl Authorizer for OpenAccess {
    fn authorize(&self, _headers: &HeaderMap) -> AuthContext {
        AuthContext::granted()
    }
}

/// Accepts a fixed set of bearer tokens.
#[derive(Clone)]
pub struct StaticBearerAuth {
    tokens: Vec<String>,
}

impl StaticBearerAuth {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }
}

impl fmt::Debug for StaticBearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticBearerAuth")
            .field("tokens", &format_args!("<{} redacted>", self.tokens.len()))
            .finish()
    }
}

impl Authorizer for StaticBearerAuth {
    fn authorize(&self, headers: &HeaderMap) -> AuthContext {
        match bearer_token(headers) {
            Some(token) if self.tokens.iter().any(|t| t == token) => AuthContext::granted(),
            _ => AuthContext::anonymous(),
        }
    }
}

/// Accepts any bearer token and forwards it upstream. Token validation
/// happens in front of the bridge (an OAuth proxy) or at the upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughBearerAuth;

impl Authorizer for PassthroughBearerAuth {
    fn authorize(&self, headers: &HeaderMap) -> AuthContext {
        match bearer_token(headers) {
            Some(token) => AuthContext::with_token(token),
            None => AuthContext::anonymous(),
        }
    }
}

/// Extract a non-empty token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
