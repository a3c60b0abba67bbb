use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::base::{Provider, ProviderRequest};
use super::configs::AnthropicProviderConfig;
use super::utils::{handle_response, with_retries};
use crate::errors::ProviderError;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, request: &ProviderRequest) -> Result<Value, ProviderError> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let mut builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        if !request.betas.is_empty() {
            builder = builder.header("anthropic-beta", request.betas.join(","));
        }

        let response = builder.json(&request.payload).send().await?;
        handle_response(response).await
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn send(&self, request: &ProviderRequest) -> Result<Value, ProviderError> {
        debug!(host = %self.config.host, betas = ?request.betas, "sending messages request");
        with_retries(&self.config.retry, || self.post(request)).await
    }
}
