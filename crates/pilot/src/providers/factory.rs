use super::{
    anthropic::AnthropicProvider,
    base::Provider,
    configs::{ProviderConfig, ProviderKind},
    formats::{anthropic::AnthropicFormat, openai::OpenAiFormat, Translator},
    openai::OpenAiProvider,
};
use anyhow::Result;

pub fn get_provider(config: ProviderConfig) -> Result<Box<dyn Provider>> {
    match config {
        ProviderConfig::OpenAi(openai_config) => Ok(Box::new(OpenAiProvider::new(openai_config)?)),
        ProviderConfig::Anthropic(anthropic_config) => {
            Ok(Box::new(AnthropicProvider::new(anthropic_config)?))
        }
    }
}

pub fn get_translator(kind: ProviderKind) -> Box<dyn Translator> {
    match kind {
        ProviderKind::OpenAi => Box::new(OpenAiFormat),
        ProviderKind::Anthropic => Box::new(AnthropicFormat),
    }
}
