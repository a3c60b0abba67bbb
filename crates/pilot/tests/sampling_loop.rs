use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use pilot::{
    agent::{run_loop, LoopCallbacks, LoopOptions, SessionConfig},
    errors::{AgentResult, ProviderError},
    models::{conversation::Conversation, message::Message, role::Role},
    providers::configs::{ProviderKind, RetryConfig},
    tools::{ToolExecutor, ToolOutput},
};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct ScreenshotExecutor {
    calls: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl ToolExecutor for ScreenshotExecutor {
    async fn execute(&self, name: &str, input: &Value) -> AgentResult<ToolOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), input.clone()));
        Ok(ToolOutput::output("screenshot taken").with_image("iVBORw0KGgo="))
    }
}

#[derive(Default)]
struct Transcript {
    tool_outputs: Vec<String>,
    api_errors: Vec<String>,
}

impl LoopCallbacks for Transcript {
    fn on_tool_output(&mut self, _output: &ToolOutput, tool_use_id: &str) {
        self.tool_outputs.push(tool_use_id.to_string());
    }

    fn on_api_response(
        &mut self,
        _request: Option<&Value>,
        _response: Option<&Value>,
        error: Option<&ProviderError>,
    ) {
        if let Some(error) = error {
            self.api_errors.push(error.to_string());
        }
    }
}

fn session(kind: ProviderKind, server: &MockServer) -> SessionConfig {
    let mut config = SessionConfig::new("test-model", kind, "test-key").with_options(LoopOptions {
        only_n_most_recent_images: Some(3),
        ..Default::default()
    });
    config.provider = config
        .provider
        .with_host(server.uri())
        .with_retry(RetryConfig {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
        });
    config
}

fn start() -> Conversation {
    Conversation::from_messages(vec![Message::user().with_text("What is on my screen?")]).unwrap()
}

#[tokio::test]
async fn test_anthropic_session_round_trip() -> AgentResult<()> {
    let server = MockServer::start().await;
    // the second request is recognised by the tool result it carries
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({"messages": [{}, {}, {"role": "user"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "A terminal window."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 40, "output_tokens": 5}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "Let me look."},
                {"type": "tool_use", "id": "toolu_01", "name": "computer", "input": {"action": "screenshot"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 20, "output_tokens": 10}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let executor = ScreenshotExecutor::default();
    let mut transcript = Transcript::default();
    let conversation = run_loop(
        session(ProviderKind::Anthropic, &server),
        start(),
        &executor,
        &mut transcript,
    )
    .await?;

    let roles: Vec<Role> = conversation.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert_eq!(transcript.tool_outputs, vec!["toolu_01"]);
    assert_eq!(
        *executor.calls.lock().unwrap(),
        vec![("computer".to_string(), json!({"action": "screenshot"}))]
    );

    // with caching on, the screenshot is kept and sent inside the tool result
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
    let tool_result = &second["messages"][2]["content"][0];
    assert_eq!(tool_result["type"], "tool_result");
    assert_eq!(tool_result["content"][1]["type"], "image");
    assert_eq!(tool_result["cache_control"], json!({"type": "ephemeral"}));
    Ok(())
}

#[tokio::test]
async fn test_openai_session_splits_images() -> AgentResult<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"messages": [{}, {}, {}, {"role": "tool"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "A terminal window."}, "finish_reason": "stop"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "computer", "arguments": "{\"action\": \"screenshot\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let conversation = run_loop(
        session(ProviderKind::OpenAi, &server),
        start(),
        &ScreenshotExecutor::default(),
        &mut Transcript::default(),
    )
    .await?;

    assert_eq!(conversation.len(), 4);
    let requests = server.received_requests().await.unwrap();
    let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
    let roles: Vec<&str> = second["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "tool", "user"]);
    assert_eq!(second["messages"][3]["name"], "computer");
    assert_eq!(
        second["messages"][4]["content"][0]["image_url"]["url"],
        "data:image/png;base64,iVBORw0KGgo="
    );
    assert_eq!(second["tool_choice"], "required");
    Ok(())
}

#[tokio::test]
async fn test_backend_failure_ends_run_with_conversation_intact() -> AgentResult<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let mut transcript = Transcript::default();
    let conversation = run_loop(
        session(ProviderKind::OpenAi, &server),
        start(),
        &ScreenshotExecutor::default(),
        &mut transcript,
    )
    .await?;

    assert_eq!(conversation.len(), 1);
    assert_eq!(
        transcript.api_errors,
        vec!["Request failed with status 503: unavailable"]
    );
    // one try plus one retry
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    Ok(())
}
