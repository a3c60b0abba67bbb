use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_wire, to_wire, RequestOptions, Translator};
use crate::errors::{TranslateError, TranslateResult};
use crate::models::content::{Content, ImageContent};
use crate::models::conversation::Conversation;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};
use crate::providers::base::{ProviderRequest, Usage};
use crate::providers::configs::ProviderKind;
use crate::providers::utils::{is_valid_function_name, sanitize_function_name};

pub const IMAGE_PLACEHOLDER: &str =
    "This tool result included an image that is uploaded in the next message.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum OpenAiMessage {
    System {
        content: String,
    },
    User {
        content: UserContent,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<OpenAiToolCall>,
    },
    Tool {
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        content: String,
    },
}

/// A lone text part is sent as a plain string, everything else as a list of parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON encoded object, as a string
    #[serde(default)]
    pub arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAiToolCall>,
}

fn image_part(image: &ImageContent) -> ContentPart {
    ContentPart::ImageUrl {
        image_url: ImageUrl {
            url: format!("data:{};base64,{}", image.mime_type, image.data),
        },
    }
}

fn parse_data_url(url: &str) -> TranslateResult<Content> {
    url.strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(mime_type, data)| Content::image(data, mime_type))
        .ok_or_else(|| {
            TranslateError::MalformedResponse(format!("unsupported image url: {:.40}", url))
        })
}

fn user_content(parts: Vec<ContentPart>) -> UserContent {
    if let [ContentPart::Text { text }] = parts.as_slice() {
        return UserContent::Text(text.clone());
    }
    UserContent::Parts(parts)
}

/// Convert a conversation into chat completion messages.
///
/// Each tool result becomes its own `tool` message. Images cannot travel inside those,
/// so the result text gets a placeholder line and the images follow in a user message
/// once every tool message of the turn has been emitted, keeping the call/result
/// pairing contiguous.
pub fn messages_to_openai_spec(conversation: &Conversation) -> TranslateResult<Vec<OpenAiMessage>> {
    let known = conversation.tool_call_names();
    let mut messages_spec = Vec::new();

    for message in conversation {
        match message.role {
            Role::Assistant => {
                let mut text: Vec<&str> = Vec::new();
                let mut tool_calls: Vec<OpenAiToolCall> = Vec::new();
                for content in &message.content {
                    match content {
                        MessageContent::Text(item) if !item.text.is_empty() => {
                            text.push(&item.text)
                        }
                        MessageContent::Text(_) => {}
                        MessageContent::ToolRequest(request) => tool_calls.push(OpenAiToolCall {
                            id: request.id.clone(),
                            call_type: function_type(),
                            function: FunctionCall {
                                name: sanitize_function_name(&request.tool_call.name),
                                arguments: request.tool_call.arguments.to_string(),
                            },
                        }),
                        // reasoning is specific to the messages API
                        MessageContent::Thinking(_) | MessageContent::RedactedThinking(_) => {}
                        MessageContent::ToolResponse(response) => {
                            return Err(TranslateError::InvalidToolCall(format!(
                                "tool result {} appears in an assistant message",
                                response.id
                            )))
                        }
                        MessageContent::Image(_) => {
                            return Err(TranslateError::UnsupportedContent(
                                "assistant messages cannot carry images".to_string(),
                            ))
                        }
                    }
                }

                if text.is_empty() && tool_calls.is_empty() {
                    continue;
                }
                messages_spec.push(OpenAiMessage::Assistant {
                    content: (!text.is_empty()).then(|| text.join("\n")),
                    tool_calls,
                });
            }
            Role::User | Role::Tool => {
                let mut tool_messages = Vec::new();
                let mut image_messages = Vec::new();
                let mut parts = Vec::new();

                for content in &message.content {
                    match content {
                        MessageContent::Text(text) if !text.text.is_empty() => {
                            parts.push(ContentPart::Text {
                                text: text.text.clone(),
                            })
                        }
                        MessageContent::Image(image) => parts.push(image_part(image)),
                        MessageContent::ToolResponse(response) => {
                            let name = known
                                .get(response.id.as_str())
                                .ok_or_else(|| {
                                    TranslateError::DanglingToolResult(response.id.clone())
                                })?;

                            let mut text = response.text();
                            let images: Vec<ContentPart> =
                                response.images().map(image_part).collect();
                            if !images.is_empty() {
                                if !text.is_empty() {
                                    text.push('\n');
                                }
                                text.push_str(IMAGE_PLACEHOLDER);
                                image_messages.push(OpenAiMessage::User {
                                    content: UserContent::Parts(images),
                                });
                            }

                            tool_messages.push(OpenAiMessage::Tool {
                                tool_call_id: response.id.clone(),
                                name: Some(sanitize_function_name(name)),
                                content: text,
                            });
                        }
                        MessageContent::Text(_) => {}
                        MessageContent::ToolRequest(request) => {
                            return Err(TranslateError::InvalidToolCall(format!(
                                "tool call {} appears in a {:?} message",
                                request.id, message.role
                            )))
                        }
                        MessageContent::Thinking(_) | MessageContent::RedactedThinking(_) => {
                            return Err(TranslateError::UnsupportedContent(format!(
                                "thinking in a {:?} message",
                                message.role
                            )))
                        }
                    }
                }

                messages_spec.extend(tool_messages);
                messages_spec.extend(image_messages);
                if !parts.is_empty() {
                    messages_spec.push(OpenAiMessage::User {
                        content: user_content(parts),
                    });
                }
            }
        }
    }

    Ok(messages_spec)
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": sanitize_function_name(&tool.name),
                    "description": tool.description,
                    "parameters": tool.input_schema,
                }
            })
        })
        .collect()
}

fn tool_call_from_wire(call: OpenAiToolCall) -> TranslateResult<MessageContent> {
    let OpenAiToolCall { id, function, .. } = call;
    if !is_valid_function_name(&function.name) {
        return Err(TranslateError::InvalidToolCall(format!(
            "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
            function.name
        )));
    }

    let arguments = match serde_json::from_str::<Value>(&function.arguments) {
        Ok(arguments @ Value::Object(_)) => arguments,
        _ => {
            return Err(TranslateError::ToolCallArgumentsInvalid {
                id,
                raw: function.arguments,
            })
        }
    };

    Ok(MessageContent::tool_request(
        id,
        ToolCall::new(function.name, arguments)?,
    ))
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: &Value) -> TranslateResult<Message> {
    if let Some(error) = response.get("error") {
        return Err(TranslateError::MalformedResponse(format!(
            "backend returned an error: {}",
            error
        )));
    }
    let completion: ChatCompletion = parse_wire(response, "chat completion")?;
    let choice = completion.choices.into_iter().next().ok_or_else(|| {
        TranslateError::MalformedResponse("chat completion has no choices".to_string())
    })?;

    let mut message = Message::assistant();
    if let Some(text) = choice.message.content.filter(|text| !text.is_empty()) {
        message.content.push(MessageContent::text(text));
    }
    for call in choice.message.tool_calls {
        message.content.push(tool_call_from_wire(call)?);
    }

    if message.content.is_empty() {
        return Err(TranslateError::MalformedResponse(format!(
            "response has neither text nor tool calls (finish reason: {})",
            choice.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(message)
}

pub fn get_usage(data: &Value) -> Usage {
    let usage = &data["usage"];
    let input_tokens = usage["prompt_tokens"].as_i64().map(|v| v as i32);
    let output_tokens = usage["completion_tokens"].as_i64().map(|v| v as i32);
    let total_tokens = usage["total_tokens"]
        .as_i64()
        .map(|v| v as i32)
        .or(match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });
    Usage::new(input_tokens, output_tokens, total_tokens)
}

/// Translator for chat completion backends with OpenAI style tool calls
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiFormat;

impl Translator for OpenAiFormat {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn to_request_messages(&self, conversation: &Conversation) -> TranslateResult<Vec<Value>> {
        messages_to_openai_spec(conversation)?
            .iter()
            .map(to_wire)
            .collect()
    }

    fn to_request_tools(&self, tools: &[Tool]) -> Vec<Value> {
        tools_to_openai_spec(tools)
    }

    fn from_response(&self, response: &Value) -> TranslateResult<Message> {
        openai_response_to_message(response)
    }

    /// Tool messages and the image messages that follow them are folded back into a
    /// single tool turn. The error flag of a result is not carried on the wire and
    /// comes back unset.
    fn from_request_messages(&self, messages: &[Value]) -> TranslateResult<Conversation> {
        let mut conversation = Conversation::new();
        let mut pending_tool: Option<Message> = None;
        // ids of results whose images are still to come, in upload order
        let mut awaiting_images: VecDeque<String> = VecDeque::new();

        for value in messages {
            let wire: OpenAiMessage = parse_wire(value, "message")?;
            match wire {
                OpenAiMessage::System { .. } => {}
                OpenAiMessage::Tool {
                    tool_call_id,
                    content,
                    ..
                } => {
                    let text = match content.strip_suffix(IMAGE_PLACEHOLDER) {
                        Some(text) => {
                            awaiting_images.push_back(tool_call_id.clone());
                            text.trim_end_matches('\n')
                        }
                        None => content.as_str(),
                    };
                    let items = if text.is_empty() {
                        Vec::new()
                    } else {
                        vec![Content::text(text)]
                    };
                    let message = pending_tool.take().unwrap_or_else(Message::tool);
                    pending_tool = Some(message.with_tool_response(tool_call_id, items, false));
                }
                OpenAiMessage::User { content } => {
                    let parts = match content {
                        UserContent::Text(text) => vec![ContentPart::Text { text }],
                        UserContent::Parts(parts) => parts,
                    };
                    let only_images = parts
                        .iter()
                        .all(|part| matches!(part, ContentPart::ImageUrl { .. }));

                    if only_images {
                        if let Some(tool) = pending_tool.as_mut() {
                            if let Some(id) = awaiting_images.pop_front() {
                                let target = tool
                                    .content
                                    .iter_mut()
                                    .filter_map(|content| content.as_tool_response_mut())
                                    .find(|response| response.id == id);
                                if let Some(response) = target {
                                    for part in parts {
                                        if let ContentPart::ImageUrl { image_url } = part {
                                            response.content.push(parse_data_url(&image_url.url)?);
                                        }
                                    }
                                    continue;
                                }
                            }
                        }
                    }

                    if let Some(tool) = pending_tool.take() {
                        conversation.push(tool)?;
                    }
                    awaiting_images.clear();
                    let mut message = Message::user();
                    for part in parts {
                        message.content.push(match part {
                            ContentPart::Text { text } => MessageContent::text(text),
                            ContentPart::ImageUrl { image_url } => {
                                parse_data_url(&image_url.url)?.into()
                            }
                        });
                    }
                    conversation.push(message)?;
                }
                OpenAiMessage::Assistant {
                    content,
                    tool_calls,
                } => {
                    if let Some(tool) = pending_tool.take() {
                        conversation.push(tool)?;
                    }
                    awaiting_images.clear();
                    let mut message = Message::assistant();
                    if let Some(text) = content.filter(|text| !text.is_empty()) {
                        message.content.push(MessageContent::text(text));
                    }
                    for call in tool_calls {
                        message.content.push(tool_call_from_wire(call)?);
                    }
                    conversation.push(message)?;
                }
            }
        }

        if let Some(tool) = pending_tool {
            conversation.push(tool)?;
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
        let mut messages = vec![to_wire(&OpenAiMessage::System {
            content: system.to_string(),
        })?];
        messages.extend(self.to_request_messages(conversation)?);

        let mut payload = json!({
            "model": options.model,
            "max_tokens": options.max_tokens,
            "messages": messages,
        });
        if !tools.is_empty() {
            payload["tools"] = json!(self.to_request_tools(tools));
            payload["tool_choice"] = json!(options.tool_choice);
        }

        Ok(ProviderRequest {
            payload,
            betas: Vec::new(),
        })
    }

    fn usage(&self, response: &Value) -> Usage {
        get_usage(response)
    }
}
