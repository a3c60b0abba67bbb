//! These models represent the objects passed around by the agent
//!
//! There are two wire formats we need to talk to:
//! - anthropic messages/tools, where tool results are content blocks of a user turn
//! - openai chat completions messages/tools, where tool results are standalone messages
//!
//! We always immediately convert those formats into the internal structs using the
//! translators in `providers::formats`. Because of the need for compatibility, the
//! internal models are not an exact match to either of them.
pub mod content;
pub mod conversation;
pub mod message;
pub mod role;
pub mod tool;
