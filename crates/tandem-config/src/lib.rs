//! Chain configuration for tandem.
//!
//! This crate defines how a fallback chain is configured:
//!
//! - [`ChainConfig`] — Prompt template, topic, model, credential and delivery cadence
//! - [`ChainConfigBuilder`] — Fluent API for building a config programmatically
//! - [`ConfigError`] — Errors raised while loading or validating a config
//!
//! # Loading
//!
//! ```rust,ignore
//! use tandem_config::ChainConfig;
//!
//! // JSON file, then environment overrides
//! let config = ChainConfig::from_file("tandem.json")?.apply_env()?;
//! ```
//!
//! # Builder API
//!
//! ```rust
//! use tandem_config::ChainConfig;
//!
//! let config = ChainConfig::builder()
//!     .prompt_template("Tell me a joke about {topic}")
//!     .topic("bears")
//!     .model("gpt-4o-mini")
//!     .api_key("sk-...")
//!     .delay_ms(0)
//!     .build();
//!
//! assert_eq!(config.topic, "bears");
//! assert!(config.validate().is_ok());
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default prompt template. `{topic}` is the only substitution slot.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "Tell me a joke about {topic}";

/// Name of the template variable the topic is bound to.
pub const TOPIC_VARIABLE: &str = "topic";

/// Default topic offered by the session.
pub const DEFAULT_TOPIC: &str = "bears";

/// Default model identifier.
///
/// Deliberately not a real model id: out of the box the primary generator
/// fails and the fallback explainer is streamed instead.
pub const DEFAULT_MODEL: &str =
    "Click 'Start Streaming' to see how the pipeline can fall back from a model that is not working.";

/// Placeholder credential shown by the session.
pub const DEFAULT_API_KEY: &str = "invalid api key";

/// Delay between two displayed increments, in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 30;

/// Environment variables read by [`ChainConfig::apply_env`].
pub mod env {
    pub const API_KEY: &str = "OPENAI_API_KEY";
    pub const API_BASE: &str = "OPENAI_API_BASE";
    pub const MODEL: &str = "TANDEM_MODEL";
    pub const TOPIC: &str = "TANDEM_TOPIC";
    pub const TEMPLATE: &str = "TANDEM_TEMPLATE";
    pub const DELAY_MS: &str = "TANDEM_DELAY_MS";
}

/// Errors that can occur when loading or validating configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse JSON configuration.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment variable held an unusable value.
    #[error("Invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    /// Config validation failed.
    #[error("Invalid config: {0}")]
    Validation(String),
}

impl ConfigError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Configuration for one fallback chain.
///
/// Every field has a default, so a partial JSON document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Prompt template with one `{topic}` slot.
    pub prompt_template: String,
    /// Topic substituted into the template.
    pub topic: String,
    /// Primary model identifier, passed through to the provider unmodified.
    pub model: String,
    /// Opaque credential for the primary provider.
    pub api_key: String,
    /// Optional OpenAI-compatible API base URL.
    pub api_base: Option<String>,
    /// Pause after each displayed increment, in milliseconds.
    pub delay_ms: u64,
    /// Overrides the canned fallback explainer.
    pub fallback_message: Option<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            api_base: None,
            delay_ms: DEFAULT_DELAY_MS,
            fallback_message: None,
        }
    }
}

impl ChainConfig {
    /// Creates a new builder starting from the defaults.
    pub fn builder() -> ChainConfigBuilder {
        ChainConfigBuilder::default()
    }

    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        Self::from_json(&content)
    }

    /// Parses a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes this configuration to a JSON string.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Overrides fields from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Overrides fields from `lookup`, keyed by the names in [`env`].
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(env::API_KEY) {
            debug!("Credential taken from {}", env::API_KEY);
            self.api_key = key;
        }
        if let Some(base) = lookup(env::API_BASE) {
            self.api_base = Some(base);
        }
        if let Some(model) = lookup(env::MODEL) {
            self.model = model;
        }
        if let Some(topic) = lookup(env::TOPIC) {
            self.topic = topic;
        }
        if let Some(template) = lookup(env::TEMPLATE) {
            self.prompt_template = template;
        }
        if let Some(raw) = lookup(env::DELAY_MS) {
            self.delay_ms = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { var: env::DELAY_MS, value: raw })?;
        }
        Ok(self)
    }

    /// Rejects configurations that cannot produce a request.
    ///
    /// The slot itself is checked when the template is formatted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prompt_template.trim().is_empty() {
            return Err(ConfigError::Validation("prompt template is empty".into()));
        }
        Ok(())
    }

    /// The inter-increment delay as a [`Duration`].
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Builder for constructing [`ChainConfig`] programmatically.
///
/// Use [`ChainConfig::builder()`] to create a new builder.
#[derive(Debug, Default)]
pub struct ChainConfigBuilder {
    config: ChainConfig,
}

impl ChainConfigBuilder {
    /// Sets the prompt template.
    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = template.into();
        self
    }

    /// Sets the topic.
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.config.topic = topic.into();
        self
    }

    /// Sets the primary model identifier.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Sets the primary credential.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Points the primary generator at an OpenAI-compatible endpoint.
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = Some(base.into());
        self
    }

    /// Sets the inter-increment delay in milliseconds.
    pub fn delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.delay_ms = delay_ms;
        self
    }

    /// Replaces the canned fallback explainer.
    pub fn fallback_message(mut self, message: impl Into<String>) -> Self {
        self.config.fallback_message = Some(message.into());
        self
    }

    /// Builds the final [`ChainConfig`].
    pub fn build(self) -> ChainConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ChainConfig::from_json(r#"{ "topic": "otters", "delay_ms": 5 }"#).unwrap();
        assert_eq!(config.topic, "otters");
        assert_eq!(config.delay_ms, 5);
        assert_eq!(config.prompt_template, DEFAULT_PROMPT_TEMPLATE);
        assert_eq!(config.api_key, DEFAULT_API_KEY);
        assert_eq!(config.fallback_message, None);
    }

    #[test]
    fn json_round_trips_through_to_json() {
        let config = ChainConfig::builder().model("gpt-4o-mini").api_base("http://localhost:11434/v1").build();
        let parsed = ChainConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (env::API_KEY, "sk-test"),
            (env::MODEL, "gpt-4o"),
            (env::DELAY_MS, " 12 "),
        ]);
        let config = ChainConfig::default()
            .apply_vars(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.delay(), Duration::from_millis(12));
        assert_eq!(config.topic, DEFAULT_TOPIC);
    }

    #[test]
    fn bad_delay_is_rejected() {
        let err = ChainConfig::default()
            .apply_vars(|name| (name == env::DELAY_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: env::DELAY_MS, .. }));
    }

    #[test]
    fn empty_template_fails_validation() {
        let config = ChainConfig::builder().prompt_template("  ").build();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ChainConfig::from_file("/nonexistent/tandem.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tandem.json"));
    }
}
