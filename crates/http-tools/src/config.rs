use crate::runtime::{HttpToolsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Base URL used when no upstream base URL is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost";

/// Upstream call timeout (seconds) used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where tool calls are forwarded to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream base URL. Empty means [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Per-call timeout in seconds. `0` disables the timeout.
    pub timeout: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl UpstreamConfig {
    #[must_use]
    pub fn effective_base_url(&self) -> &str {
        let trimmed = self.base_url.trim();
        if trimmed.is_empty() {
            DEFAULT_BASE_URL
        } else {
            trimmed
        }
    }

    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }
}

/// Authentication scheme applied to every upstream call.
///
/// Unknown values are kept verbatim so they can be reported instead of rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum AuthType {
    #[default]
    None,
    Bearer,
    Basic,
    ApiKey,
    Other(String),
}

impl From<&str> for AuthType {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Self::None,
            "bearer" => Self::Bearer,
            "basic" => Self::Basic,
            "apikey" => Self::ApiKey,
            _ => Self::Other(value.trim().to_string()),
        }
    }
}

impl From<String> for AuthType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<AuthType> for String {
    fn from(value: AuthType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Bearer => f.write_str("bearer"),
            Self::Basic => f.write_str("basic"),
            Self::ApiKey => f.write_str("apikey"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Upstream credentials.
///
/// Which fields matter depends on [`AuthType`]; unused ones are ignored.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    pub token: String,
    pub username: String,
    pub password: String,
    pub api_key: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(s: &str) -> &'static str {
            if s.is_empty() { "" } else { "***" }
        }
        f.debug_struct("AuthConfig")
            .field("auth_type", &self.auth_type)
            .field("token", &mask(&self.token))
            .field("username", &self.username)
            .field("password", &mask(&self.password))
            .field("api_key", &mask(&self.api_key))
            .finish()
    }
}

impl AuthConfig {
    /// Check that the credentials required by the selected scheme are present.
    ///
    /// Unknown schemes pass; they are reported as warnings by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`HttpToolsError::Config`] naming the missing credential.
    pub fn validate(&self) -> Result<()> {
        match self.auth_type {
            AuthType::Bearer if self.token.is_empty() => Err(HttpToolsError::Config(
                "token is required for bearer auth".to_string(),
            )),
            AuthType::ApiKey if self.token.is_empty() && self.api_key.is_empty() => {
                Err(HttpToolsError::Config(
                    "token or api_key is required for apikey auth".to_string(),
                ))
            }
            AuthType::Basic if self.username.is_empty() || self.password.is_empty() => {
                Err(HttpToolsError::Config(
                    "username and password are required for basic auth".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}
