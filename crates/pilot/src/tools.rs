use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, warn};

use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};

/// Selects a fixed set of tools and the backend feature flag they require
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum ToolVersion {
    #[serde(rename = "computer_use_20241022")]
    #[strum(serialize = "computer_use_20241022")]
    ComputerUse20241022,
    #[default]
    #[serde(rename = "computer_use_20250124")]
    #[strum(serialize = "computer_use_20250124")]
    ComputerUse20250124,
    #[serde(rename = "computer_use_20250429")]
    #[strum(serialize = "computer_use_20250429")]
    ComputerUse20250429,
}

/// The tools of one version together with the beta flag to send alongside them
#[derive(Debug, Clone)]
pub struct ToolGroup {
    pub version: ToolVersion,
    pub tools: Vec<Tool>,
    pub beta_flag: Option<&'static str>,
}

impl ToolVersion {
    /// The text editor tool was renamed in the newest version
    pub fn editor_tool_name(&self) -> &'static str {
        match self {
            ToolVersion::ComputerUse20241022 | ToolVersion::ComputerUse20250124 => {
                "str_replace_editor"
            }
            ToolVersion::ComputerUse20250429 => "str_replace_based_edit_tool",
        }
    }

    pub fn tool_group(&self) -> ToolGroup {
        let beta_flag = match self {
            ToolVersion::ComputerUse20241022 => "computer-use-2024-10-22",
            ToolVersion::ComputerUse20250124 | ToolVersion::ComputerUse20250429 => {
                "computer-use-2025-01-24"
            }
        };
        ToolGroup {
            version: *self,
            tools: vec![
                computer_tool(),
                editor_tool(self.editor_tool_name()),
                bash_tool(),
            ],
            beta_flag: Some(beta_flag),
        }
    }
}

fn computer_tool() -> Tool {
    Tool::new(
        "computer",
        "Take a screenshot, click, type, scroll, and perform other computer actions. This tool \
         gives you the ability to interact with the screen, keyboard, and mouse of the current \
         computer. USE THIS TOOL FOR SCREENSHOTS with action='screenshot'.",
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": [
                        "key", "type", "mouse_move", "left_click", "left_click_drag",
                        "right_click", "middle_click", "double_click", "screenshot",
                        "cursor_position", "left_mouse_down", "left_mouse_up", "scroll",
                        "hold_key", "wait", "triple_click"
                    ],
                    "description": "The action to perform"
                },
                "text": {
                    "type": "string",
                    "description": "Text to type (required for 'type' action)"
                },
                "coordinate": {
                    "type": "array",
                    "items": {"type": "integer"},
                    "minItems": 2,
                    "maxItems": 2,
                    "description": "Pixel coordinate [x, y] for mouse actions"
                },
                "scroll_direction": {
                    "type": "string",
                    "enum": ["up", "down", "left", "right"],
                    "description": "Direction to scroll (for 'scroll' action)"
                }
            },
            "required": ["action"]
        }),
    )
}

fn editor_tool(name: &str) -> Tool {
    Tool::new(
        name,
        "A text editor tool for viewing, creating and editing TEXT FILES ONLY. Can view file \
         contents, create new files, edit files, and perform string replacements. NEVER use for \
         screenshots or images - use computer tool for screenshots.",
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "enum": ["view", "create", "str_replace", "undo_edit"],
                    "description": "The command to execute"
                },
                "path": {
                    "type": "string",
                    "description": "Path to the file"
                },
                "file_text": {
                    "type": "string",
                    "description": "Text content for creating files"
                },
                "old_str": {
                    "type": "string",
                    "description": "String to replace (for str_replace command)"
                },
                "new_str": {
                    "type": "string",
                    "description": "Replacement string (for str_replace command)"
                }
            },
            "required": ["command", "path"]
        }),
    )
}

fn bash_tool() -> Tool {
    Tool::new(
        "bash",
        "Execute bash commands in the terminal. Can run shell commands, manage files, install \
         software, and interact with the system.",
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute"
                }
            },
            "required": ["command"]
        }),
    )
}

/// What an executor hands back after running a tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub output: Option<String>,
    pub error: Option<String>,
    /// Base64 encoded PNG, usually a screenshot
    pub base64_image: Option<String>,
    /// Out-of-band note for the model, prefixed to the output
    pub system: Option<String>,
}

impl ToolOutput {
    pub fn output<S: Into<String>>(output: S) -> Self {
        Self {
            output: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn failure<S: Into<String>>(error: S) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_image<S: Into<String>>(mut self, base64_image: S) -> Self {
        self.base64_image = Some(base64_image.into());
        self
    }

    pub fn with_system<S: Into<String>>(mut self, system: S) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    fn prepend_system(&self, text: &str) -> String {
        match &self.system {
            Some(system) => format!("<system>{}</system>\n{}", system, text),
            None => text.to_string(),
        }
    }

    /// The content of the tool result item, and whether it reports an error
    pub fn to_content(&self) -> (Vec<Content>, bool) {
        if let Some(error) = &self.error {
            return (vec![Content::text(self.prepend_system(error))], true);
        }

        let mut content = Vec::new();
        if let Some(output) = self.output.as_deref().filter(|output| !output.is_empty()) {
            content.push(Content::text(self.prepend_system(output)));
        }
        if let Some(image) = &self.base64_image {
            content.push(Content::image(image.clone(), "image/png"));
        }
        (content, false)
    }
}

/// Runs tools on behalf of the agent, e.g. a shell runner or a screen controller
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run the named tool with the given input object
    async fn execute(&self, name: &str, input: &Value) -> AgentResult<ToolOutput>;
}

/// The tools offered to the model during a session. Read-only once built, so one
/// collection can be shared across concurrent sessions.
#[derive(Debug, Clone)]
pub struct ToolCollection {
    tools: Arc<[Tool]>,
}

impl ToolCollection {
    pub fn new(tools: Vec<Tool>) -> AgentResult<Self> {
        let mut names = HashSet::new();
        for tool in &tools {
            if !names.insert(tool.name.as_str()) {
                return Err(AgentError::InvalidParameters(format!(
                    "Duplicate tool name: {}",
                    tool.name
                )));
            }
        }
        Ok(Self {
            tools: tools.into(),
        })
    }

    pub fn from_version(version: ToolVersion) -> Self {
        Self {
            tools: version.tool_group().tools.into(),
        }
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    /// Run a tool call through the executor. Failures come back as an error output
    /// so they can be shown to the model instead of ending the session.
    pub async fn run(&self, executor: &dyn ToolExecutor, tool_call: &ToolCall) -> ToolOutput {
        if self.get(&tool_call.name).is_none() {
            warn!(tool = %tool_call.name, "model requested an unknown tool");
            return ToolOutput::failure(format!("Tool {} is invalid", tool_call.name));
        }

        debug!(tool = %tool_call.name, "executing tool");
        match executor.execute(&tool_call.name, &tool_call.arguments).await {
            Ok(output) => output,
            Err(err) => {
                warn!(tool = %tool_call.name, error = %err, "tool execution failed");
                ToolOutput::failure(err.to_string())
            }
        }
    }
}
