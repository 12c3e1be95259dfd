//! Configuration management for chatgate
//!
//! This module handles loading, parsing, and validating configuration
//! from a YAML file with environment-variable indirection for secrets.

use crate::error::{ChatgateError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for chatgate
///
/// Holds the model provider settings, the optional search collaborator,
/// and gateway behavior.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Model provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Web search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Gateway behavior configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Model provider configuration
///
/// The provider credential is deployment-level: it is read from the
/// environment variable named by `api_key_env`, never stored per end
/// user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with each request
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the bearer credential
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_base_url() -> String {
    "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string()
}

fn default_model() -> String {
    "deepseek-r1".to_string()
}

fn default_api_key_env() -> String {
    "CHATGATE_API_KEY".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl ProviderConfig {
    /// Resolve the deployment credential from the environment
    ///
    /// # Errors
    ///
    /// Returns `ChatgateError::Config` if the variable is unset or empty
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(ChatgateError::Config(format!(
                "provider credential not set: export {}",
                self.api_key_env
            ))
            .into()),
        }
    }
}

/// Web search configuration
///
/// Search is optional: with no endpoint configured, turns that request
/// search degrade with a warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search API endpoint; `None` disables the collaborator
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Environment variable holding the search credential
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
}

fn default_search_key_env() -> String {
    "SEARCH_API_KEY".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: default_search_key_env(),
        }
    }
}

impl SearchConfig {
    /// Resolve the search credential, empty when unset
    pub fn api_key(&self) -> String {
        std::env::var(&self.api_key_env).unwrap_or_default()
    }
}

/// Gateway behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// System preamble installed at the start of every session
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Maximum sessions returned by history listings
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Commit the partial reply (and charge the full turn cost) when the
    /// caller cancels mid-stream; when false, cancellation commits
    /// nothing
    #[serde(default)]
    pub commit_on_cancel: bool,
}

fn default_system_prompt() -> String {
    "You are an AI assistant. Answer the user's questions. When the user \
     provides web search results, cite them in your answer."
        .to_string()
}

fn default_history_limit() -> usize {
    10
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            history_limit: default_history_limit(),
            commit_on_cancel: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// A missing file yields the default configuration so the binary runs
    /// without any setup; a present-but-invalid file is an error.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chatgate::config::Config;
    ///
    /// let config = Config::load("config/config.yaml").unwrap();
    /// config.validate().unwrap();
    /// ```
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&raw)?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ChatgateError::Config` for empty base URL, empty model,
    /// or a zero history limit
    pub fn validate(&self) -> Result<()> {
        if self.provider.base_url.trim().is_empty() {
            return Err(ChatgateError::Config("provider.base_url is empty".to_string()).into());
        }
        if self.provider.model.trim().is_empty() {
            return Err(ChatgateError::Config("provider.model is empty".to_string()).into());
        }
        if self.gateway.history_limit == 0 {
            return Err(
                ChatgateError::Config("gateway.history_limit must be at least 1".to_string())
                    .into(),
            );
        }
        if let Some(endpoint) = &self.search.endpoint {
            if endpoint.trim().is_empty() {
                return Err(
                    ChatgateError::Config("search.endpoint is empty".to_string()).into(),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().expect("defaults valid");
        assert_eq!(config.gateway.history_limit, 10);
        assert!(!config.gateway.commit_on_cancel);
        assert!(config.search.endpoint.is_none());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load("/no/such/config.yaml").expect("defaults");
        assert_eq!(config.provider.model, "deepseek-r1");
    }

    #[test]
    fn test_load_parses_yaml() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "provider:\n  base_url: http://localhost:8080/v1\n  model: test-model\n\
             gateway:\n  history_limit: 5\n  commit_on_cancel: true\n\
             search:\n  endpoint: http://localhost:9090/search\n",
        )
        .expect("write");

        let config = Config::load(&path).expect("load");
        assert_eq!(config.provider.base_url, "http://localhost:8080/v1");
        assert_eq!(config.provider.model, "test-model");
        assert_eq!(config.gateway.history_limit, 5);
        assert!(config.gateway.commit_on_cancel);
        assert_eq!(
            config.search.endpoint.as_deref(),
            Some("http://localhost:9090/search")
        );
        config.validate().expect("valid");
    }

    #[test]
    fn test_load_rejects_invalid_yaml() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "provider: [not a map").expect("write");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_model() {
        let mut config = Config::default();
        config.provider.model = "".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_history_limit() {
        let mut config = Config::default();
        config.gateway.history_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_missing_env_errors() {
        let config = ProviderConfig {
            api_key_env: "CHATGATE_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        assert!(config.api_key().is_err());
    }
}
