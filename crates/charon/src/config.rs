//! Service configuration.

use std::net::SocketAddr;
use std::path::Path;

use charon_core::query::DEFAULT_LIMIT;
use charon_session::CallContext;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the [`Service`](crate::Service).
///
/// Every field has a default, so a partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// User agent prefix a loopback caller must present to be trusted.
    /// An empty prefix disables local trust entirely.
    pub local_agent_prefix: String,
    /// Page size when a list request does not set one.
    pub default_list_limit: i64,
    /// Upper bound on any page size.
    pub max_list_limit: i64,
    pub min_username_length: usize,
    pub min_password_length: usize,
    /// Reconcile the compiled-in catalogue on [`Service::init`](crate::Service::init).
    pub register_catalogue_on_start: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            local_agent_prefix: "charonctl".to_string(),
            default_list_limit: DEFAULT_LIMIT,
            max_list_limit: 1000,
            min_username_length: 3,
            min_password_length: 8,
            register_catalogue_on_start: true,
        }
    }
}

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ServiceConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_list_limit <= 0 || self.max_list_limit <= 0 {
            return Err(ConfigError::Invalid("list limits must be positive".into()));
        }
        if self.default_list_limit > self.max_list_limit {
            return Err(ConfigError::Invalid(format!(
                "default_list_limit {} exceeds max_list_limit {}",
                self.default_list_limit, self.max_list_limit
            )));
        }
        Ok(())
    }

    /// Build the per-call context at the transport edge.
    ///
    /// The call is local-trusted only for a loopback peer presenting the
    /// configured user agent prefix.
    pub fn call_context(
        &self,
        peer: SocketAddr,
        user_agent: &str,
        token: Option<String>,
    ) -> CallContext {
        CallContext::from_peer(peer, user_agent, token, &self.local_agent_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ServiceConfig::from_json(r#"{"max_list_limit": 50}"#).unwrap();
        assert_eq!(config.max_list_limit, 50);
        assert_eq!(config.local_agent_prefix, "charonctl");
        assert_eq!(config.min_password_length, 8);
        assert!(config.register_catalogue_on_start);
    }

    #[test]
    fn test_rejects_inverted_limits() {
        let err = ServiceConfig::from_json(r#"{"default_list_limit": 100, "max_list_limit": 10}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charon.json");
        std::fs::write(&path, r#"{"local_agent_prefix": "opsctl"}"#).unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.local_agent_prefix, "opsctl");
    }

    #[test]
    fn test_call_context_uses_prefix() {
        let config = ServiceConfig::default();
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        assert!(config.call_context(peer, "charonctl/0.1", None).is_local());
        assert!(!config.call_context(peer, "browser", None).is_local());
    }
}
