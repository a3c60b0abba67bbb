use anyhow::Result;
use clap::Parser;
use cliclack::input;
use console::style;
use pilot::agent::Agent;
use pilot::models::conversation::Conversation;
use pilot::models::message::Message;
use pilot::providers::configs::ProviderKind;
use pilot::tools::ToolVersion;
use tracing_subscriber::EnvFilter;

mod configuration;
mod error;
mod executor;
mod render;

use configuration::Settings;
use executor::ShellExecutor;
use render::ConsoleRenderer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Backend protocol, anthropic or openai (can also be set via PILOT_PROVIDER__TYPE)
    #[arg(short, long)]
    provider: Option<ProviderKind>,

    /// Model to use (can also be set via PILOT_PROVIDER__MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// API key (can also be set via PILOT_PROVIDER__API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL of the backend (can also be set via PILOT_PROVIDER__HOST)
    #[arg(long)]
    host: Option<String>,

    /// Tool set offered to the model, e.g. computer_use_20250124
    #[arg(long)]
    tool_version: Option<ToolVersion>,

    /// Keep only this many screenshots in the history
    #[arg(long)]
    only_n_most_recent_images: Option<usize>,

    /// Token budget for extended thinking
    #[arg(long)]
    thinking_budget: Option<u32>,

    /// Extra text appended to the system prompt
    #[arg(long)]
    system_prompt_suffix: Option<String>,

    /// Run a single instruction instead of starting an interactive session
    instruction: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Vec<(&'static str, String)> {
        let mut overrides = Vec::new();
        if let Some(provider) = self.provider {
            overrides.push(("provider.type", provider.to_string()));
        }
        if let Some(model) = &self.model {
            overrides.push(("provider.model", model.clone()));
        }
        if let Some(api_key) = &self.api_key {
            overrides.push(("provider.api_key", api_key.clone()));
        }
        if let Some(host) = &self.host {
            overrides.push(("provider.host", host.clone()));
        }
        if let Some(tool_version) = self.tool_version {
            overrides.push(("session.tool_version", tool_version.to_string()));
        }
        if let Some(keep) = self.only_n_most_recent_images {
            overrides.push(("session.only_n_most_recent_images", keep.to_string()));
        }
        if let Some(budget) = self.thinking_budget {
            overrides.push(("session.thinking_budget", budget.to_string()));
        }
        if let Some(suffix) = &self.system_prompt_suffix {
            overrides.push(("system_prompt_suffix", suffix.clone()));
        }
        overrides
    }
}

/// Blank input has nothing for the model to act on
fn user_message(text: String) -> Option<Message> {
    if text.trim().is_empty() {
        None
    } else {
        Some(Message::user().with_text(text))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pilot=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.overrides())?;
    let config = settings.into_session_config();
    let agent = Agent::new(config)?;

    let executor = ShellExecutor::default();
    let mut renderer = ConsoleRenderer::new();
    let mut conversation = Conversation::new();

    if let Some(instruction) = cli.instruction {
        let Some(message) = user_message(instruction) else {
            return Ok(());
        };
        conversation.push(message)?;
        renderer.start_waiting();
        agent
            .sampling_loop(&mut conversation, &executor, &mut renderer)
            .await?;
        renderer.stop_waiting();
        return Ok(());
    }

    println!(
        "pilot {}",
        style("- type \"exit\" to end the session").dim()
    );
    println!();

    loop {
        let message_text: String = input("Message:").placeholder("").multiline().interact()?;
        if message_text.trim().eq_ignore_ascii_case("exit") {
            break;
        }
        let Some(message) = user_message(message_text) else {
            continue;
        };

        conversation.push(message)?;
        renderer.start_waiting();
        agent
            .sampling_loop(&mut conversation, &executor, &mut renderer)
            .await?;
        renderer.stop_waiting();
    }

    Ok(())
}
