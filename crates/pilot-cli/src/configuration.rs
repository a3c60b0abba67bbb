use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use pilot::agent::{LoopOptions, SessionConfig};
use pilot::providers::configs::{ProviderConfig, ProviderKind, RetryConfig};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    pub api_key: String,
    /// Overrides the default endpoint of the provider kind
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl ProviderSettings {
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| default_model(self.kind).to_string())
    }

    pub fn into_config(self) -> ProviderConfig {
        let config = ProviderConfig::new(self.kind, self.api_key).with_retry(RetryConfig {
            max_retries: self.max_retries,
            ..Default::default()
        });
        match self.host {
            Some(host) => config.with_host(host),
            None => config,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub provider: ProviderSettings,
    #[serde(default)]
    pub session: LoopOptions,
    #[serde(default)]
    pub system_prompt_suffix: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(&[])
    }

    /// Load settings from `PILOT_` environment variables, with `overrides` (dotted
    /// key, value) taking precedence
    pub fn load(overrides: &[(&str, String)]) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("provider.type", ProviderKind::Anthropic.to_string())?
            .add_source(
                Environment::with_prefix("PILOT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        for (key, value) in overrides {
            builder = builder.set_override(*key, value.as_str())?;
        }

        let result: Result<Self, config::ConfigError> = builder.build()?.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // "missing field `api_key`" carries no parent path
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .split('`')
                        .next()
                        .unwrap_or_default();
                    let field = if field == "api_key" {
                        "provider.api_key".to_string()
                    } else {
                        field.to_string()
                    };
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(&field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    pub fn into_session_config(self) -> SessionConfig {
        let model = self.provider.model();
        SessionConfig {
            model,
            provider: self.provider.into_config(),
            system_prompt_suffix: self.system_prompt_suffix,
            options: self.session,
        }
    }
}

fn default_max_retries() -> u32 {
    RetryConfig::default().max_retries
}

fn default_model(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Anthropic => "claude-sonnet-4-20250514",
        ProviderKind::OpenAi => "mistralai/Mistral-Small-3.1-24B-Instruct-2503",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot::providers::configs::{ANTHROPIC_HOST, OPENAI_COMPATIBLE_HOST};
    use pilot::tools::ToolVersion;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("PILOT_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        env::set_var("PILOT_PROVIDER__API_KEY", "test-key");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.provider.kind, ProviderKind::Anthropic);
        assert_eq!(settings.provider.model(), "claude-sonnet-4-20250514");
        assert_eq!(settings.session, LoopOptions::default());

        let config = settings.into_session_config();
        match config.provider {
            ProviderConfig::Anthropic(provider) => {
                assert_eq!(provider.host, ANTHROPIC_HOST);
                assert_eq!(provider.api_key, "test-key");
                assert_eq!(provider.retry.max_retries, 4);
            }
            _ => panic!("Expected Anthropic provider"),
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_openai_settings_from_env() {
        clean_env();
        env::set_var("PILOT_PROVIDER__TYPE", "openai");
        env::set_var("PILOT_PROVIDER__API_KEY", "nebius-key");
        env::set_var("PILOT_PROVIDER__MAX_RETRIES", "1");
        env::set_var("PILOT_SESSION__ONLY_N_MOST_RECENT_IMAGES", "3");
        env::set_var("PILOT_SESSION__TOOL_VERSION", "computer_use_20250429");
        env::set_var("PILOT_SESSION__TOOL_CHOICE", "auto");
        env::set_var("PILOT_SYSTEM_PROMPT_SUFFIX", "Be brief.");

        let config = Settings::new().unwrap().into_session_config();
        assert_eq!(config.model, "mistralai/Mistral-Small-3.1-24B-Instruct-2503");
        assert_eq!(config.system_prompt_suffix, "Be brief.");
        assert_eq!(config.options.only_n_most_recent_images, Some(3));
        assert_eq!(config.options.tool_version, ToolVersion::ComputerUse20250429);
        assert_eq!(config.options.max_tokens, 4096);
        match config.provider {
            ProviderConfig::OpenAi(provider) => {
                assert_eq!(provider.host, OPENAI_COMPATIBLE_HOST);
                assert_eq!(provider.retry.max_retries, 1);
            }
            _ => panic!("Expected OpenAI provider"),
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_overrides_win_over_environment() {
        clean_env();
        env::set_var("PILOT_PROVIDER__API_KEY", "env-key");
        env::set_var("PILOT_PROVIDER__MODEL", "env-model");

        let settings = Settings::load(&[
            ("provider.model", "cli-model".to_string()),
            ("provider.host", "http://localhost:8000".to_string()),
        ])
        .unwrap();
        assert_eq!(settings.provider.model(), "cli-model");
        assert_eq!(settings.provider.host.as_deref(), Some("http://localhost:8000"));
        assert_eq!(settings.provider.api_key, "env-key");

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_api_key_names_env_var() {
        clean_env();

        match Settings::new() {
            Err(ConfigError::MissingEnvVar { env_var }) => {
                assert_eq!(env_var, "PILOT_PROVIDER__API_KEY")
            }
            other => panic!("Expected missing env var error, got {:?}", other),
        }
    }
}
