use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const OPENAI_COMPATIBLE_HOST: &str = "https://api.studio.nebius.com";

/// Which wire protocol a session talks
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Delay before the first retry, doubled on every further attempt
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub retry: RetryConfig,
}

// Unified enum to wrap different provider configurations
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    Anthropic(AnthropicProviderConfig),
    OpenAi(OpenAiProviderConfig),
}

impl ProviderConfig {
    /// Configuration for the default host of a provider kind
    pub fn new<S: Into<String>>(kind: ProviderKind, api_key: S) -> Self {
        match kind {
            ProviderKind::Anthropic => ProviderConfig::Anthropic(AnthropicProviderConfig {
                host: ANTHROPIC_HOST.to_string(),
                api_key: api_key.into(),
                retry: RetryConfig::default(),
            }),
            ProviderKind::OpenAi => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host: OPENAI_COMPATIBLE_HOST.to_string(),
                api_key: api_key.into(),
                retry: RetryConfig::default(),
            }),
        }
    }

    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        match &mut self {
            ProviderConfig::Anthropic(config) => config.host = host.into(),
            ProviderConfig::OpenAi(config) => config.host = host.into(),
        }
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        match &mut self {
            ProviderConfig::Anthropic(config) => config.retry = retry,
            ProviderConfig::OpenAi(config) => config.retry = retry,
        }
        self
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::Anthropic(_) => ProviderKind::Anthropic,
            ProviderConfig::OpenAi(_) => ProviderKind::OpenAi,
        }
    }
}
