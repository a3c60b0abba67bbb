//! Translation between the conversation model and each backend wire schema.
//!
//! Translators are pure: no network I/O and no shared state, so both directions can be
//! tested against literal JSON fixtures. The agent picks one per session based on the
//! provider kind and never branches on the backend itself.
pub mod anthropic;
pub mod openai;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

use super::base::{ProviderRequest, Usage};
use super::configs::ProviderKind;
use crate::errors::{TranslateError, TranslateResult};
use crate::models::conversation::Conversation;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// How strongly the backend is asked to call a tool. Only backends that speak the
/// chat completions dialect honour it, the messages API always runs in auto mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    #[default]
    Required,
    None,
}

/// Per-request settings the translator folds into the payload
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub model: String,
    pub max_tokens: u32,
    pub thinking_budget: Option<u32>,
    pub betas: Vec<String>,
    pub tool_choice: ToolChoice,
}

pub trait Translator: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether the cache breakpoint policy applies to this backend
    fn supports_prompt_caching(&self) -> bool {
        false
    }

    fn to_request_messages(&self, conversation: &Conversation) -> TranslateResult<Vec<Value>>;

    fn to_request_tools(&self, tools: &[Tool]) -> Vec<Value>;

    /// Parse a backend response into an assistant message
    fn from_response(&self, response: &Value) -> TranslateResult<Message>;

    /// Rebuild a conversation from wire messages this translator produced
    fn from_request_messages(&self, messages: &[Value]) -> TranslateResult<Conversation>;

    /// Assemble the full request: system prompt, messages, tools and options
    fn build_request(
        &self,
        system: &str,
        conversation: &Conversation,
        tools: &[Tool],
        options: &RequestOptions,
    ) -> TranslateResult<ProviderRequest>;

    fn usage(&self, response: &Value) -> Usage;
}

/// Deserialize a wire value, reporting a shape mismatch as a malformed payload
pub(crate) fn parse_wire<T: serde::de::DeserializeOwned>(
    value: &Value,
    what: &str,
) -> TranslateResult<T> {
    T::deserialize(value)
        .map_err(|e| TranslateError::MalformedResponse(format!("invalid {}: {}", what, e)))
}

pub(crate) fn to_wire<T: Serialize>(value: &T) -> TranslateResult<Value> {
    serde_json::to_value(value).map_err(|e| TranslateError::MalformedResponse(e.to_string()))
}
