use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Protocol version reported by `initialize` when none is configured.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

/// Default timeout for upstream calls (30 seconds).
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8787";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// How inbound `tools/call` requests are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// No credentials required.
    Open,
    /// Inbound bearer token must match one of these.
    Bearer(Vec<String>),
    /// Any inbound bearer token is accepted and forwarded upstream.
    Passthrough,
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("Open"),
            Self::Bearer(tokens) => write!(f, "Bearer(<{} tokens>)", tokens.len()),
            Self::Passthrough => f.write_str("Passthrough"),
        }
    }
}

/// Upstream chat-completion endpoint settings.
#[derive(Clone)]
pub struct UpstreamConfig {
    pub api_key: String,
    pub base_path: String,
    pub model: String,
    pub timeout: Duration,
}

impl UpstreamConfig {
    /// Full URL of the chat-completions endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_path.trim_end_matches('/'))
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &"<redacted>")
            .field("base_path", &self.base_path)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Server configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub protocol_version: String,
    pub upstream: UpstreamConfig,
    pub auth: AuthMode,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// - `LLM_SECRET`, `LLM_BASEPATH`, `LLM_MODEL` (required): upstream endpoint
    /// - `LLM_MCP_PROTOCOL_VERSION` (optional, default 2025-03-26)
    /// - `LLM_TIMEOUT_SECS` (optional, default 30): upstream timeout
    /// - `MCP_BRIDGE_ADDR` (optional, default 127.0.0.1:8787): listen address
    /// - `MCP_BRIDGE_AUTH` (optional, `open` | `bearer` | `passthrough`)
    /// - `MCP_BRIDGE_TOKENS` (required for `bearer`): comma-separated tokens
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Empty values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let upstream_timeout_secs = match get("LLM_TIMEOUT_SECS") {
            Some(val) => val.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "LLM_TIMEOUT_SECS",
                reason: "must be a positive integer".into(),
            })?,
            None => DEFAULT_UPSTREAM_TIMEOUT_SECS,
        };
        if upstream_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "LLM_TIMEOUT_SECS",
                reason: "must be a positive integer".into(),
            });
        }

        let upstream = UpstreamConfig {
            api_key: require("LLM_SECRET")?,
            base_path: require("LLM_BASEPATH")?,
            model: require("LLM_MODEL")?,
            timeout: Duration::from_secs(upstream_timeout_secs),
        };

        let listen_addr = get("MCP_BRIDGE_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "MCP_BRIDGE_ADDR",
                reason: e.to_string(),
            })?;

        let auth = match get("MCP_BRIDGE_AUTH").as_deref().map(str::trim) {
            None | Some("open") => AuthMode::Open,
            Some("passthrough") => AuthMode::Passthrough,
            Some("bearer") => {
                let tokens: Vec<String> = require("MCP_BRIDGE_TOKENS")?
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect();
                if tokens.is_empty() {
                    return Err(ConfigError::Missing("MCP_BRIDGE_TOKENS"));
                }
                AuthMode::Bearer(tokens)
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "MCP_BRIDGE_AUTH",
                    reason: format!("unknown mode `{other}` (expected open, bearer or passthrough)"),
                })
            }
        };

        Ok(Self {
            listen_addr,
            protocol_version: get("LLM_MCP_PROTOCOL_VERSION")
                .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
            upstream,
            auth,
        })
    }
}
