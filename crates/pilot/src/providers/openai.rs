use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::base::{Provider, ProviderRequest};
use super::configs::OpenAiProviderConfig;
use super::utils::{handle_response, with_retries};
use crate::errors::ProviderError;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: &Value) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send()
            .await?;

        let body = handle_response(response).await?;
        // some compatible servers report failures in a 200 body
        if let Some(error) = body.get("error") {
            return Err(ProviderError::Validation(format!("API error: {}", error)));
        }
        Ok(body)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn send(&self, request: &ProviderRequest) -> Result<Value, ProviderError> {
        debug!(host = %self.config.host, "sending chat completion request");
        with_retries(&self.config.retry, || self.post(&request.payload)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::configs::RetryConfig;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(response: ResponseTemplate) -> (MockServer, OpenAiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test_api_key"))
            .respond_with(response)
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            retry: RetryConfig {
                max_retries: 1,
                base_delay: Duration::from_millis(1),
            },
        };

        let provider = OpenAiProvider::new(config).unwrap();
        (mock_server, provider)
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            payload: json!({
                "model": "Qwen/Qwen2.5-VL-72B-Instruct",
                "messages": [{"role": "user", "content": "Hello?"}]
            }),
            betas: vec!["ignored".to_string()],
        }
    }

    #[tokio::test]
    async fn test_send_basic() -> Result<()> {
        let response_body = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello! How can I assist you today?"
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 15,
                "total_tokens": 27
            }
        });

        let (_, provider) =
            setup_mock_server(ResponseTemplate::new(200).set_body_json(response_body.clone()))
                .await;
        let response = provider.send(&request()).await?;

        assert_eq!(response, response_body);
        Ok(())
    }

    #[tokio::test]
    async fn test_error_in_ok_body() {
        let (_, provider) = setup_mock_server(
            ResponseTemplate::new(200)
                .set_body_json(json!({"error": {"code": "context_length_exceeded"}})),
        )
        .await;

        let err = provider.send(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(msg) if msg.contains("context_length_exceeded")));
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_retries() {
        let (mock_server, provider) = setup_mock_server(ResponseTemplate::new(429)).await;

        let err = provider.send(&request()).await.unwrap_err();

        assert!(matches!(err, ProviderError::Status { status: 429, .. }));
        let received = mock_server.received_requests().await.unwrap();
        assert_eq!(received.len(), 2);
    }
}
