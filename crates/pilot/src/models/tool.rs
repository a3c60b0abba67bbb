use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{TranslateError, TranslateResult};

/// A tool that can be used by a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// A JSON Schema object describing the tool input
    pub input_schema: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A tool call request that an executor can run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// The name of the tool to execute
    pub name: String,
    /// The input for the execution, always a JSON object
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new ToolCall, rejecting an empty name or a non-object input
    pub fn new<S: Into<String>>(name: S, arguments: Value) -> TranslateResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TranslateError::InvalidToolCall(
                "tool call name must not be empty".to_string(),
            ));
        }
        if !arguments.is_object() {
            return Err(TranslateError::InvalidToolCall(format!(
                "input for tool '{}' must be a JSON object, got {}",
                name, arguments
            )));
        }
        Ok(Self { name, arguments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_call_requires_name() {
        let err = ToolCall::new("", json!({})).unwrap_err();
        assert!(matches!(err, TranslateError::InvalidToolCall(_)));
    }

    #[test]
    fn test_tool_call_requires_object_input() {
        let err = ToolCall::new("bash", json!(["ls"])).unwrap_err();
        assert!(matches!(err, TranslateError::InvalidToolCall(msg) if msg.contains("bash")));

        let call = ToolCall::new("bash", json!({"command": "ls"})).unwrap();
        assert_eq!(call.arguments["command"], "ls");
    }
}
