use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use pilot::{
    history::inject_prompt_caching,
    models::{content::Content, conversation::Conversation, message::Message, tool::ToolCall},
    providers::{
        configs::ProviderKind,
        factory::get_translator,
        formats::{RequestOptions, ToolChoice},
    },
    tools::ToolVersion,
};
use serde_json::json;
use strum::IntoEnumIterator;

/// Prints the request each backend would receive for the same screenshot exchange
fn main() -> Result<()> {
    // 1x1 transparent PNG
    let png: [u8; 67] = [
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
        0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];
    let screenshot = BASE64.encode(png);

    let mut conversation = Conversation::from_messages(vec![
        Message::user().with_text("What is on the screen?"),
        Message::assistant().with_text("Let me check.").with_tool_request(
            "toolu_01",
            ToolCall::new("computer", json!({"action": "screenshot"}))?,
        ),
        Message::tool().with_tool_response(
            "toolu_01",
            vec![
                Content::text("screenshot taken"),
                Content::image(screenshot, "image/png"),
            ],
            false,
        ),
    ])?;

    let version = ToolVersion::ComputerUse20250124;
    let group = version.tool_group();
    let options = RequestOptions {
        model: "example-model".to_string(),
        max_tokens: 4096,
        thinking_budget: None,
        betas: group.beta_flag.into_iter().map(String::from).collect(),
        tool_choice: ToolChoice::Required,
    };

    for kind in ProviderKind::iter() {
        let translator = get_translator(kind);
        if translator.supports_prompt_caching() {
            inject_prompt_caching(&mut conversation);
        }
        let request = translator.build_request(
            "You are a careful computer operator.",
            &conversation,
            &group.tools,
            &options,
        )?;

        println!("=== {} (betas: {:?}) ===", kind, request.betas);
        println!("{}", serde_json::to_string_pretty(&request.payload["messages"])?);
    }

    Ok(())
}
