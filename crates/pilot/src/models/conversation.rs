use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::message::{Message, MessageContent};
use super::role::Role;
use crate::errors::{TranslateError, TranslateResult};

/// The ordered history of one session.
///
/// Messages are append-only: every push checks that tool calls only come from the
/// assistant and that their ids are unique. Tool results only come from the user side
/// and each one answers a still unanswered call of the latest assistant message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a conversation from prior messages, validating each in order
    pub fn from_messages(messages: Vec<Message>) -> TranslateResult<Self> {
        let mut conversation = Self::new();
        for message in messages {
            conversation.push(message)?;
        }
        Ok(conversation)
    }

    pub fn push(&mut self, message: Message) -> TranslateResult<()> {
        let mut known = self.tool_call_names();
        let mut open = self.open_tool_calls();
        for content in &message.content {
            match content {
                MessageContent::ToolRequest(request) => {
                    if message.role != Role::Assistant {
                        return Err(TranslateError::InvalidToolCall(format!(
                            "tool call {} appears in a {:?} message",
                            request.id, message.role
                        )));
                    }
                    if request.id.is_empty() {
                        return Err(TranslateError::InvalidToolCall(format!(
                            "tool call to '{}' has no id",
                            request.tool_call.name
                        )));
                    }
                    if known
                        .insert(request.id.as_str(), request.tool_call.name.as_str())
                        .is_some()
                    {
                        return Err(TranslateError::InvalidToolCall(format!(
                            "duplicate tool call id {}",
                            request.id
                        )));
                    }
                }
                MessageContent::ToolResponse(response) => {
                    if message.role == Role::Assistant {
                        return Err(TranslateError::InvalidToolCall(format!(
                            "tool result {} appears in an assistant message",
                            response.id
                        )));
                    }
                    if !open.remove(response.id.as_str()) {
                        return Err(TranslateError::DanglingToolResult(response.id.clone()));
                    }
                }
                _ => {}
            }
        }
        self.messages.push(message);
        Ok(())
    }

    /// Ids of the calls in the latest assistant message that have no result yet
    fn open_tool_calls(&self) -> HashSet<&str> {
        let Some(start) = self
            .messages
            .iter()
            .rposition(|message| message.role == Role::Assistant)
        else {
            return HashSet::new();
        };

        let mut open: HashSet<&str> = self.messages[start]
            .tool_requests()
            .into_iter()
            .map(|request| request.id.as_str())
            .collect();
        for content in self.messages[start + 1..]
            .iter()
            .flat_map(|message| message.content.iter())
        {
            if let Some(response) = content.as_tool_response() {
                open.remove(response.id.as_str());
            }
        }
        open
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Mutable access for the history policies, which may only edit content in place
    pub(crate) fn messages_mut(&mut self) -> &mut [Message] {
        &mut self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Map of every tool call id in the conversation to the name of the tool it called
    pub fn tool_call_names(&self) -> HashMap<&str, &str> {
        self.messages
            .iter()
            .flat_map(|message| message.content.iter())
            .filter_map(|content| content.as_tool_request())
            .map(|request| (request.id.as_str(), request.tool_call.name.as_str()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
