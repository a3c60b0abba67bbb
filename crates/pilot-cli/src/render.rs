use bat::WrappingMode;
use cliclack::spinner;
use console::style;
use pilot::agent::LoopCallbacks;
use pilot::errors::ProviderError;
use pilot::models::message::MessageContent;
use pilot::tools::ToolOutput;
use serde_json::Value;
use tracing::{debug, warn};

const THEME: &str = "GitHub";

/// Shows a session in the terminal: markdown for the model's text, framed JSON for
/// tool calls and a spinner while the backend is thinking
pub struct ConsoleRenderer {
    spinner: cliclack::ProgressBar,
    spinning: bool,
    pending_tools: usize,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        ConsoleRenderer {
            spinner: spinner(),
            spinning: false,
            pending_tools: 0,
        }
    }

    pub fn start_waiting(&mut self) {
        if !self.spinning {
            self.spinner = spinner();
            self.spinner.start("awaiting reply");
            self.spinning = true;
        }
    }

    pub fn stop_waiting(&mut self) {
        if self.spinning {
            self.spinner.stop("");
            self.spinning = false;
        }
    }
}

impl Default for ConsoleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn print_markdown(content: &str) {
    let result = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(THEME)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print();
    if let Err(e) = result {
        warn!("could not render text: {}", e);
        println!("{}", content);
    }
}

fn print_tool_request(content: &str, tool_name: &str) {
    let result = bat::PrettyPrinter::new()
        .input(
            bat::Input::from_bytes(content.as_bytes()).name(format!("Tool Request: {}", tool_name)),
        )
        .theme(THEME)
        .language("JSON")
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print();
    if let Err(e) = result {
        warn!("could not render tool request: {}", e);
        println!("{}: {}", tool_name, content);
    }
}

fn tool_output_summary(output: &ToolOutput) -> String {
    let mut lines = Vec::new();
    if let Some(system) = &output.system {
        lines.push(style(system).dim().to_string());
    }
    if let Some(text) = output.output.as_deref().filter(|text| !text.is_empty()) {
        lines.push(text.to_string());
    }
    if let Some(error) = &output.error {
        lines.push(style(error).red().to_string());
    }
    if output.base64_image.is_some() {
        lines.push(style("[screenshot]").dim().to_string());
    }
    lines.join("\n")
}

impl LoopCallbacks for ConsoleRenderer {
    fn on_content(&mut self, content: &MessageContent) {
        match content {
            MessageContent::Text(text) => print_markdown(&text.text),
            MessageContent::Thinking(thinking) => {
                println!("{}", style(&thinking.thinking).dim().italic())
            }
            MessageContent::ToolRequest(request) => {
                self.pending_tools += 1;
                let arguments = serde_json::to_string_pretty(&request.tool_call.arguments)
                    .unwrap_or_else(|_| request.tool_call.arguments.to_string());
                print_tool_request(&arguments, &request.tool_call.name);
            }
            MessageContent::RedactedThinking(_) => {
                println!("{}", style("[redacted thinking]").dim().italic())
            }
            MessageContent::Image(_) => println!("{}", style("[image]").dim()),
            MessageContent::ToolResponse(_) => {}
        }
    }

    fn on_tool_output(&mut self, output: &ToolOutput, tool_use_id: &str) {
        debug!(tool_use_id, "tool finished");
        let summary = tool_output_summary(output);
        if !summary.is_empty() {
            println!("{}", summary);
        }

        self.pending_tools = self.pending_tools.saturating_sub(1);
        if self.pending_tools == 0 {
            self.start_waiting();
        }
    }

    fn on_api_response(
        &mut self,
        _request: Option<&Value>,
        _response: Option<&Value>,
        error: Option<&ProviderError>,
    ) {
        self.stop_waiting();
        if let Some(error) = error {
            println!("{}", style(format!("Request failed: {}", error)).red());
        }
    }
}
