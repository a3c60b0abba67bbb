use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{parse_wire, to_wire, RequestOptions, Translator};
use crate::errors::{TranslateError, TranslateResult};
use crate::models::content::{CacheControl, Content, ImageContent};
use crate::models::conversation::Conversation;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};
use crate::providers::base::{ProviderRequest, Usage};
use crate::providers::configs::ProviderKind;

pub const PROMPT_CACHING_BETA_FLAG: &str = "prompt-caching-2024-07-31";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnthropicRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: AnthropicRole,
    pub content: AnthropicBody,
}

/// Message content is either a bare string or a list of blocks. We always send blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnthropicBody {
    Text(String),
    Blocks(Vec<AnthropicBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicBlock {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    Image {
        source: ImageSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    RedactedThinking {
        data: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: ToolResultBody,
        #[serde(default)]
        is_error: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultBody {
    Text(String),
    Blocks(Vec<ToolResultBlock>),
}

impl Default for ToolResultBody {
    fn default() -> Self {
        ToolResultBody::Blocks(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

fn image_source(image: &ImageContent) -> ImageSource {
    ImageSource::Base64 {
        media_type: image.mime_type.clone(),
        data: image.data.clone(),
    }
}

fn image_content(source: ImageSource) -> Content {
    let ImageSource::Base64 { media_type, data } = source;
    Content::image(data, media_type)
}

/// Convert a conversation into messages API turns. Tool results stay nested in the
/// user turn that carries them, images included. Turns left without any block once
/// empty text is dropped are skipped.
pub fn messages_to_anthropic_spec(
    conversation: &Conversation,
) -> TranslateResult<Vec<AnthropicMessage>> {
    let known = conversation.tool_call_names();
    let mut messages = Vec::with_capacity(conversation.len());

    for message in conversation {
        let role = if message.role.is_user_side() {
            AnthropicRole::User
        } else {
            AnthropicRole::Assistant
        };

        let mut blocks = Vec::with_capacity(message.content.len());
        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    // the API rejects empty text blocks
                    if !text.text.is_empty() {
                        blocks.push(AnthropicBlock::Text {
                            text: text.text.clone(),
                            cache_control: text.cache_control,
                        });
                    }
                }
                MessageContent::Image(image) => blocks.push(AnthropicBlock::Image {
                    source: image_source(image),
                    cache_control: image.cache_control,
                }),
                MessageContent::Thinking(thinking) => blocks.push(AnthropicBlock::Thinking {
                    thinking: thinking.thinking.clone(),
                    signature: thinking.signature.clone(),
                }),
                MessageContent::RedactedThinking(redacted) => {
                    blocks.push(AnthropicBlock::RedactedThinking {
                        data: redacted.data.clone(),
                    })
                }
                MessageContent::ToolRequest(request) if role == AnthropicRole::User => {
                    return Err(TranslateError::InvalidToolCall(format!(
                        "tool call {} appears in a {:?} message",
                        request.id, message.role
                    )));
                }
                MessageContent::ToolResponse(response) if role == AnthropicRole::Assistant => {
                    return Err(TranslateError::InvalidToolCall(format!(
                        "tool result {} appears in an assistant message",
                        response.id
                    )));
                }
                MessageContent::ToolRequest(request) => blocks.push(AnthropicBlock::ToolUse {
                    id: request.id.clone(),
                    name: request.tool_call.name.clone(),
                    input: request.tool_call.arguments.clone(),
                    cache_control: request.cache_control,
                }),
                MessageContent::ToolResponse(response) => {
                    if !known.contains_key(response.id.as_str()) {
                        return Err(TranslateError::DanglingToolResult(response.id.clone()));
                    }
                    let content = response
                        .content
                        .iter()
                        .map(|item| match item {
                            Content::Text(text) => ToolResultBlock::Text {
                                text: text.text.clone(),
                            },
                            Content::Image(image) => ToolResultBlock::Image {
                                source: image_source(image),
                            },
                        })
                        .collect();
                    blocks.push(AnthropicBlock::ToolResult {
                        tool_use_id: response.id.clone(),
                        content: ToolResultBody::Blocks(content),
                        is_error: response.is_error,
                        cache_control: response.cache_control,
                    });
                }
            }
        }

        // a turn made only of empty text has nothing to send and the API rejects it
        if blocks.is_empty() {
            continue;
        }
        messages.push(AnthropicMessage {
            role,
            content: AnthropicBody::Blocks(blocks),
        });
    }

    Ok(messages)
}

/// Convert internal Tool format to the messages API tool specification
pub fn tools_to_anthropic_spec(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.input_schema,
            })
        })
        .collect()
}

fn block_to_content(block: AnthropicBlock) -> TranslateResult<MessageContent> {
    Ok(match block {
        AnthropicBlock::Text { text, .. } => MessageContent::text(text),
        AnthropicBlock::Image { source, .. } => image_content(source).into(),
        AnthropicBlock::Thinking {
            thinking,
            signature,
        } => MessageContent::thinking(thinking, signature),
        AnthropicBlock::RedactedThinking { data } => MessageContent::redacted_thinking(data),
        AnthropicBlock::ToolUse { id, name, input, .. } => {
            MessageContent::tool_request(id, ToolCall::new(name, input)?)
        }
        AnthropicBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
            ..
        } => {
            let content = match content {
                ToolResultBody::Text(text) => vec![Content::text(text)],
                ToolResultBody::Blocks(blocks) => blocks
                    .into_iter()
                    .map(|block| match block {
                        ToolResultBlock::Text { text } => Content::text(text),
                        ToolResultBlock::Image { source } => image_content(source),
                    })
                    .collect(),
            };
            MessageContent::tool_response(tool_use_id, content, is_error)
        }
    })
}

/// Convert a messages API response into an assistant message
pub fn anthropic_response_to_message(response: &Value) -> TranslateResult<Message> {
    let response: AnthropicResponse = parse_wire(response, "messages response")?;

    let mut message = Message::assistant();
    for block in response.content {
        match block {
            AnthropicBlock::Text { ref text, .. } if text.is_empty() => continue,
            AnthropicBlock::ToolResult { .. } | AnthropicBlock::Image { .. } => {
                return Err(TranslateError::MalformedResponse(
                    "assistant response contained a user-only content block".to_string(),
                ))
            }
            block => message.content.push(block_to_content(block)?),
        }
    }

    let has_text = message.content.iter().any(|c| c.as_text().is_some());
    if !has_text && !message.has_tool_requests() {
        return Err(TranslateError::MalformedResponse(format!(
            "response has neither text nor tool use (stop reason: {})",
            response.stop_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(message)
}

pub fn get_usage(data: &Value) -> Usage {
    let usage = &data["usage"];
    let input_tokens = usage["input_tokens"].as_i64().map(|v| v as i32);
    let output_tokens = usage["output_tokens"].as_i64().map(|v| v as i32);
    let total_tokens = match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    };
    Usage::new(input_tokens, output_tokens, total_tokens)
}

/// Translator for the Anthropic messages API
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicFormat;

impl Translator for AnthropicFormat {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn supports_prompt_caching(&self) -> bool {
        true
    }

    fn to_request_messages(&self, conversation: &Conversation) -> TranslateResult<Vec<Value>> {
        messages_to_anthropic_spec(conversation)?
            .iter()
            .map(to_wire)
            .collect()
    }

    fn to_request_tools(&self, tools: &[Tool]) -> Vec<Value> {
        tools_to_anthropic_spec(tools)
    }

    fn from_response(&self, response: &Value) -> TranslateResult<Message> {
        anthropic_response_to_message(response)
    }

    fn from_request_messages(&self, messages: &[Value]) -> TranslateResult<Conversation> {
        let mut conversation = Conversation::new();
        for value in messages {
            let wire: AnthropicMessage = parse_wire(value, "message")?;
            let blocks = match wire.content {
                AnthropicBody::Text(text) => vec![AnthropicBlock::Text {
                    text,
                    cache_control: None,
                }],
                AnthropicBody::Blocks(blocks) => blocks,
            };
            let only_tool_results = !blocks.is_empty()
                && blocks
                    .iter()
                    .all(|block| matches!(block, AnthropicBlock::ToolResult { .. }));
            let role = match wire.role {
                AnthropicRole::Assistant => Role::Assistant,
                AnthropicRole::User if only_tool_results => Role::Tool,
                AnthropicRole::User => Role::User,
            };

            let mut message = match role {
                Role::User => Message::user(),
                Role::Assistant => Message::assistant(),
                Role::Tool => Message::tool(),
            };
            for block in blocks {
                message.content.push(block_to_content(block)?);
            }
            conversation.push(message)?;
        }
        Ok(conversation)
    }

    fn build_request(
        &self,
        system: &str,
        conversation: &Conversation,
        tools: &[Tool],
        options: &RequestOptions,
    ) -> TranslateResult<ProviderRequest> {
        let mut payload = json!({
            "model": options.model,
            "max_tokens": options.max_tokens,
            "system": [{
                "type": "text",
                "text": system,
                "cache_control": CacheControl::Ephemeral,
            }],
            "messages": self.to_request_messages(conversation)?,
        });

        if !tools.is_empty() {
            payload["tools"] = json!(self.to_request_tools(tools));
        }
        if let Some(budget) = options.thinking_budget {
            payload["thinking"] = json!({"type": "enabled", "budget_tokens": budget});
        }
        debug!(
            tool_choice = %options.tool_choice,
            "messages API always uses automatic tool choice"
        );

        let mut betas = options.betas.clone();
        betas.push(PROMPT_CACHING_BETA_FLAG.to_string());

        Ok(ProviderRequest { payload, betas })
    }

    fn usage(&self, response: &Value) -> Usage {
        get_usage(response)
    }
}
