use super::content::{CacheControl, Content, ImageContent, TextContent};
use super::role::Role;
use super::tool::ToolCall;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub tool_call: ToolCall,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// The id of the tool request this responds to
    pub id: String,
    pub content: Vec<Content>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl ToolResponse {
    /// Text items of the result joined by newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|content| content.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageContent> {
        self.content.iter().filter_map(|content| content.as_image())
    }
}

/// Extended reasoning returned by backends that support a thinking budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingContent {
    pub thinking: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Reasoning the backend returned encrypted. It is opaque to us and only ever replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactedThinkingContent {
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Content passed inside a message, which can be both simple content and tool content
pub enum MessageContent {
    Text(TextContent),
    Image(ImageContent),
    Thinking(ThinkingContent),
    RedactedThinking(RedactedThinkingContent),
    ToolRequest(ToolRequest),
    ToolResponse(ToolResponse),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent {
            text: text.into(),
            cache_control: None,
        })
    }

    pub fn image<S: Into<String>, T: Into<String>>(data: S, mime_type: T) -> Self {
        MessageContent::Image(ImageContent {
            data: data.into(),
            mime_type: mime_type.into(),
            cache_control: None,
        })
    }

    pub fn thinking<S: Into<String>>(thinking: S, signature: Option<String>) -> Self {
        MessageContent::Thinking(ThinkingContent {
            thinking: thinking.into(),
            signature,
        })
    }

    pub fn redacted_thinking<S: Into<String>>(data: S) -> Self {
        MessageContent::RedactedThinking(RedactedThinkingContent { data: data.into() })
    }

    pub fn tool_request<S: Into<String>>(id: S, tool_call: ToolCall) -> Self {
        MessageContent::ToolRequest(ToolRequest {
            id: id.into(),
            tool_call,
            cache_control: None,
        })
    }

    pub fn tool_response<S: Into<String>>(id: S, content: Vec<Content>, is_error: bool) -> Self {
        MessageContent::ToolResponse(ToolResponse {
            id: id.into(),
            content,
            is_error,
            cache_control: None,
        })
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        if let MessageContent::ToolRequest(ref tool_request) = self {
            Some(tool_request)
        } else {
            None
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        if let MessageContent::ToolResponse(ref tool_response) = self {
            Some(tool_response)
        } else {
            None
        }
    }

    pub fn as_tool_response_mut(&mut self) -> Option<&mut ToolResponse> {
        if let MessageContent::ToolResponse(ref mut tool_response) = self {
            Some(tool_response)
        } else {
            None
        }
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    pub fn cache_control(&self) -> Option<CacheControl> {
        match self {
            MessageContent::Text(text) => text.cache_control,
            MessageContent::Image(image) => image.cache_control,
            MessageContent::ToolRequest(request) => request.cache_control,
            MessageContent::ToolResponse(response) => response.cache_control,
            MessageContent::Thinking(_) | MessageContent::RedactedThinking(_) => None,
        }
    }

    /// Thinking blocks cannot carry a cache marker, setting one on them is ignored
    pub fn set_cache_control(&mut self, cache_control: Option<CacheControl>) {
        match self {
            MessageContent::Text(text) => text.cache_control = cache_control,
            MessageContent::Image(image) => image.cache_control = cache_control,
            MessageContent::ToolRequest(request) => request.cache_control = cache_control,
            MessageContent::ToolResponse(response) => response.cache_control = cache_control,
            MessageContent::Thinking(_) | MessageContent::RedactedThinking(_) => {}
        }
    }
}

impl MessageContent {
    /// Empty text is never put on the wire
    pub fn is_empty_text(&self) -> bool {
        matches!(self, MessageContent::Text(text) if text.text.is_empty())
    }
}

impl From<Content> for MessageContent {
    fn from(content: Content) -> Self {
        match content {
            Content::Text(text) => MessageContent::Text(text),
            Content::Image(image) => MessageContent::Image(image),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: Vec<MessageContent>,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            role,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Self::new(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    /// Create a new message to carry tool results, with the current timestamp
    pub fn tool() -> Self {
        Self::new(Role::Tool)
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add image content to the message
    pub fn with_image<S: Into<String>, T: Into<String>>(self, data: S, mime_type: T) -> Self {
        self.with_content(MessageContent::image(data, mime_type))
    }

    pub fn with_thinking<S: Into<String>>(self, thinking: S, signature: Option<String>) -> Self {
        self.with_content(MessageContent::thinking(thinking, signature))
    }

    /// Add a tool request to the message
    pub fn with_tool_request<S: Into<String>>(self, id: S, tool_call: ToolCall) -> Self {
        self.with_content(MessageContent::tool_request(id, tool_call))
    }

    /// Add a tool response to the message
    pub fn with_tool_response<S: Into<String>>(
        self,
        id: S,
        content: Vec<Content>,
        is_error: bool,
    ) -> Self {
        self.with_content(MessageContent::tool_response(id, content, is_error))
    }

    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.content
            .iter()
            .filter_map(|content| content.as_tool_request())
            .collect()
    }

    pub fn has_tool_requests(&self) -> bool {
        self.content
            .iter()
            .any(|content| matches!(content, MessageContent::ToolRequest(_)))
    }

    /// All text content joined by newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|content| content.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
