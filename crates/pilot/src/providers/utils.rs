use std::future::Future;

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Response;
use serde_json::Value;
use tracing::warn;

use super::configs::RetryConfig;
use crate::errors::ProviderError;

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    static ref VALID_FUNCTION_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

pub fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

pub fn is_valid_function_name(name: &str) -> bool {
    VALID_FUNCTION_NAME.is_match(name)
}

/// Turn an HTTP response into its JSON body, keeping the body of failed requests so
/// it can be shown to the user
pub async fn handle_response(response: Response) -> Result<Value, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| ProviderError::Validation(format!("response is not valid JSON: {}", e)))
}

/// Run `operation` until it succeeds, fails with an error that is not worth retrying,
/// or the retry budget is spent. The delay doubles after every attempt.
pub async fn with_retries<F, Fut>(retry: &RetryConfig, mut operation: F) -> Result<Value, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value, ProviderError>>,
{
    let mut attempt = 0;
    let mut delay = retry.base_delay;
    loop {
        match operation().await {
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                attempt += 1;
                warn!(
                    attempt,
                    max_retries = retry.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn quick_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_sanitize_function_name() {
        assert_eq!(sanitize_function_name("hello-world"), "hello-world");
        assert_eq!(sanitize_function_name("hello world"), "hello_world");
        assert_eq!(sanitize_function_name("hello@world"), "hello_world");
    }

    #[test]
    fn test_is_valid_function_name() {
        assert!(is_valid_function_name("hello-world"));
        assert!(is_valid_function_name("str_replace_based_edit_tool"));
        assert!(!is_valid_function_name("hello world"));
        assert!(!is_valid_function_name("hello@world"));
        assert!(!is_valid_function_name(""));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retries(&quick_retry(4), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ProviderError::Status {
                    status: 529,
                    body: "overloaded".to_string(),
                })
            } else {
                Ok(serde_json::json!({"ok": true}))
            }
        })
        .await;

        assert_eq!(result.unwrap()["ok"], true);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result = with_retries(&quick_retry(2), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Transport("connection reset".to_string()))
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retries(&quick_retry(4), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Status {
                status: 400,
                body: "bad request".to_string(),
            })
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Status { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
