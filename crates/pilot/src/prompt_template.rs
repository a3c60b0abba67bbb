use chrono::Local;
use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("prompts/system.md");

#[derive(Debug, Clone, Serialize)]
struct SystemPromptContext<'a> {
    arch: &'a str,
    date: String,
    editor_tool: &'a str,
}

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// Render the built in system prompt for the host architecture and today's date.
/// A non-empty suffix is appended after a single space.
pub fn render_system_prompt(editor_tool: &str, suffix: &str) -> Result<String, TeraError> {
    let context = SystemPromptContext {
        arch: std::env::consts::ARCH,
        date: Local::now().format("%A, %B %d, %Y").to_string(),
        editor_tool,
    };
    let prompt = load_prompt(SYSTEM_PROMPT_TEMPLATE, &context)?;
    Ok(append_suffix(prompt.trim_end(), suffix))
}

fn append_suffix(prompt: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        prompt.to_string()
    } else {
        format!("{} {}", prompt, suffix)
    }
}
