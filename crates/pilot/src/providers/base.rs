use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProviderError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// A request ready to be sent, already in the backend wire format
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub payload: Value,
    /// Feature flags, sent as a header on backends that understand them
    pub betas: Vec<String>,
}

/// Transport for one backend family (Anthropic, OpenAI compatible, ...)
///
/// Implementations own authentication and retries. Translation happens before and
/// after, so a provider only ever sees raw JSON.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn send(&self, request: &ProviderRequest) -> Result<Value, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProvider;
    use serde_json::json;

    #[test]
    fn test_usage_missing_counts() {
        let usage: Usage = serde_json::from_value(json!({"input_tokens": 12})).unwrap();
        assert_eq!(usage, Usage::new(Some(12), None, None));
        assert_eq!(Usage::default().total_tokens, None);
    }

    #[tokio::test]
    async fn test_provider_as_trait_object() {
        let provider: Box<dyn Provider> =
            Box::new(MockProvider::new(vec![Ok(json!({"id": "msg_1"}))]));
        let request = ProviderRequest {
            payload: json!({"model": "test"}),
            betas: vec![],
        };

        assert_eq!(provider.send(&request).await.unwrap(), json!({"id": "msg_1"}));
        assert!(provider.send(&request).await.is_err());
    }
}
