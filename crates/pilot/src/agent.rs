use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::{AgentError, AgentResult, ProviderError};
use crate::history::{filter_to_n_most_recent_images, inject_prompt_caching};
use crate::models::conversation::Conversation;
use crate::models::message::{Message, MessageContent};
use crate::prompt_template::render_system_prompt;
use crate::providers::base::Provider;
use crate::providers::configs::{ProviderConfig, ProviderKind};
use crate::providers::factory::{get_provider, get_translator};
use crate::providers::formats::{RequestOptions, ToolChoice, Translator};
use crate::tools::{ToolCollection, ToolExecutor, ToolOutput, ToolVersion};

pub use crate::providers::formats::anthropic::PROMPT_CACHING_BETA_FLAG;
pub const TOKEN_EFFICIENT_TOOLS_BETA_FLAG: &str = "token-efficient-tools-2025-02-19";

/// Knobs for one sampling loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopOptions {
    /// Keep only this many screenshots in tool results. Ignored on backends with
    /// prompt caching, where dropping images would invalidate the cache.
    pub only_n_most_recent_images: Option<usize>,
    /// Remove images in multiples of this, defaults to `only_n_most_recent_images`
    pub image_removal_chunk: Option<usize>,
    pub max_tokens: u32,
    pub tool_version: ToolVersion,
    pub thinking_budget: Option<u32>,
    pub token_efficient_tools_beta: bool,
    pub tool_choice: ToolChoice,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            only_n_most_recent_images: None,
            image_removal_chunk: None,
            max_tokens: 4096,
            tool_version: ToolVersion::default(),
            thinking_budget: None,
            token_efficient_tools_beta: false,
            tool_choice: ToolChoice::default(),
        }
    }
}

/// Everything needed to run a session against one backend
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub model: String,
    pub provider: ProviderConfig,
    pub system_prompt_suffix: String,
    pub options: LoopOptions,
}

impl SessionConfig {
    pub fn new<M: Into<String>, K: Into<String>>(model: M, kind: ProviderKind, api_key: K) -> Self {
        Self {
            model: model.into(),
            provider: ProviderConfig::new(kind, api_key),
            system_prompt_suffix: String::new(),
            options: LoopOptions::default(),
        }
    }

    pub fn with_system_prompt_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.system_prompt_suffix = suffix.into();
        self
    }

    pub fn with_options(mut self, options: LoopOptions) -> Self {
        self.options = options;
        self
    }
}

/// Hooks for showing a session as it happens. Each one fires once per item, in order.
pub trait LoopCallbacks: Send {
    /// An item of the assistant message, before any of its tools run
    fn on_content(&mut self, _content: &MessageContent) {}

    fn on_tool_output(&mut self, _output: &ToolOutput, _tool_use_id: &str) {}

    /// The raw exchange with the backend. On failure only the error is set.
    fn on_api_response(
        &mut self,
        _request: Option<&Value>,
        _response: Option<&Value>,
        _error: Option<&ProviderError>,
    ) {
    }
}

pub struct NoopCallbacks;

impl LoopCallbacks for NoopCallbacks {}

/// Agent drives a model through a computer use session: it asks for the next step,
/// runs the requested tools and feeds the results back until the model stops calling
/// tools
pub struct Agent {
    config: SessionConfig,
    provider: Box<dyn Provider>,
    translator: Box<dyn Translator>,
    tools: ToolCollection,
}

impl Agent {
    pub fn new(config: SessionConfig) -> AgentResult<Self> {
        let provider = get_provider(config.provider.clone())
            .map_err(|e| AgentError::Internal(format!("could not create provider: {}", e)))?;
        Ok(Self::with_provider(config, provider))
    }

    /// Use a custom transport, the translator still follows the configured kind
    pub fn with_provider(config: SessionConfig, provider: Box<dyn Provider>) -> Self {
        let translator = get_translator(config.provider.kind());
        let tools = ToolCollection::from_version(config.options.tool_version);
        Self {
            config,
            provider,
            translator,
            tools,
        }
    }

    pub fn tools(&self) -> &ToolCollection {
        &self.tools
    }

    fn system_prompt(&self) -> AgentResult<String> {
        render_system_prompt(
            self.config.options.tool_version.editor_tool_name(),
            &self.config.system_prompt_suffix,
        )
        .map_err(|e| AgentError::Internal(e.to_string()))
    }

    fn request_options(&self) -> RequestOptions {
        let options = &self.config.options;
        let mut betas: Vec<String> = options
            .tool_version
            .tool_group()
            .beta_flag
            .into_iter()
            .map(String::from)
            .collect();
        if options.token_efficient_tools_beta {
            betas.push(TOKEN_EFFICIENT_TOOLS_BETA_FLAG.to_string());
        }

        RequestOptions {
            model: self.config.model.clone(),
            max_tokens: options.max_tokens,
            thinking_budget: options.thinking_budget,
            betas,
            tool_choice: options.tool_choice,
        }
    }

    fn prepare_history(&self, conversation: &mut Conversation) {
        if self.translator.supports_prompt_caching() {
            inject_prompt_caching(conversation);
            return;
        }

        if let Some(keep) = self.config.options.only_n_most_recent_images {
            let chunk = self.config.options.image_removal_chunk.unwrap_or(keep);
            filter_to_n_most_recent_images(conversation, Some(keep), chunk);
        }
    }

    /// Run the loop until the model answers without tool calls, appending every
    /// assistant turn and tool result turn to `conversation`.
    ///
    /// A failed backend call is reported through `on_api_response` and ends the
    /// invocation with `Ok`, leaving the conversation ready to resume. Translation
    /// errors are returned.
    pub async fn sampling_loop(
        &self,
        conversation: &mut Conversation,
        executor: &dyn ToolExecutor,
        callbacks: &mut dyn LoopCallbacks,
    ) -> AgentResult<()> {
        let system = self.system_prompt()?;
        let options = self.request_options();

        loop {
            self.prepare_history(conversation);
            let request =
                self.translator
                    .build_request(&system, conversation, self.tools.tools(), &options)?;

            debug!(
                provider = %self.translator.kind(),
                messages = conversation.len(),
                "sending request"
            );
            let response = match self.provider.send(&request).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(error = %err, "backend request failed");
                    callbacks.on_api_response(None, None, Some(&err));
                    return Ok(());
                }
            };
            callbacks.on_api_response(Some(&request.payload), Some(&response), None);

            let usage = self.translator.usage(&response);
            info!(
                input_tokens = ?usage.input_tokens,
                output_tokens = ?usage.output_tokens,
                "received response"
            );

            let message = self.translator.from_response(&response)?;
            for content in &message.content {
                callbacks.on_content(content);
            }
            let tool_calls: Vec<_> = message
                .tool_requests()
                .into_iter()
                .map(|request| (request.id.clone(), request.tool_call.clone()))
                .collect();
            conversation.push(message)?;

            if tool_calls.is_empty() {
                return Ok(());
            }

            let mut results = Message::tool();
            for (id, tool_call) in tool_calls {
                let output = self.tools.run(executor, &tool_call).await;
                callbacks.on_tool_output(&output, &id);
                let (content, is_error) = output.to_content();
                results = results.with_tool_response(id, content, is_error);
            }
            conversation.push(results)?;
        }
    }
}

/// Run one session to completion and hand back the extended conversation
pub async fn run_loop(
    config: SessionConfig,
    mut conversation: Conversation,
    executor: &dyn ToolExecutor,
    callbacks: &mut dyn LoopCallbacks,
) -> AgentResult<Conversation> {
    let agent = Agent::new(config)?;
    agent
        .sampling_loop(&mut conversation, executor, callbacks)
        .await?;
    Ok(conversation)
}
