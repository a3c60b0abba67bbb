//! Policies applied to the conversation in place before every request.
//!
//! Screenshots lose relevance as a session goes on, so older ones are dropped from tool
//! results. Backends with prompt caching additionally get breakpoints on the most recent
//! user turns.
use tracing::debug;

use crate::models::content::CacheControl;
use crate::models::conversation::Conversation;

/// Cache breakpoints placed on recent turns. One more is left to the backend for the
/// tools and system prompt, which are shared across sessions.
const MAX_TURN_BREAKPOINTS: usize = 3;

/// Remove all but the `keep` most recent tool result images, oldest first.
///
/// The number removed is rounded down to a multiple of `chunk` so that the cached
/// prefix is not invalidated every time a single image falls out. A `chunk` of zero
/// behaves like one. Returns how many images were removed.
pub fn filter_to_n_most_recent_images(
    conversation: &mut Conversation,
    keep: Option<usize>,
    chunk: usize,
) -> usize {
    let Some(keep) = keep else {
        return 0;
    };
    let chunk = chunk.max(1);

    let total_images: usize = conversation
        .iter()
        .flat_map(|message| message.content.iter())
        .filter_map(|content| content.as_tool_response())
        .map(|response| response.images().count())
        .sum();

    let mut to_remove = total_images.saturating_sub(keep);
    to_remove -= to_remove % chunk;
    if to_remove == 0 {
        return 0;
    }
    let removed = to_remove;

    for message in conversation.messages_mut() {
        for content in message.content.iter_mut() {
            let Some(response) = content.as_tool_response_mut() else {
                continue;
            };
            response.content.retain(|item| {
                if item.is_image() && to_remove > 0 {
                    to_remove -= 1;
                    false
                } else {
                    true
                }
            });
        }
    }

    debug!(total_images, removed, "trimmed tool result images");
    removed
}

/// Mark the last content item that gets sent of the three most recent user-side turns
/// as cache breakpoints, and clear the marker left on the turn before them by an earlier
/// request. Turns further back cannot carry a marker from this policy.
pub fn inject_prompt_caching(conversation: &mut Conversation) {
    let mut breakpoints_remaining = MAX_TURN_BREAKPOINTS;
    for message in conversation.messages_mut().iter_mut().rev() {
        if !message.role.is_user_side() {
            continue;
        }
        // empty text is dropped by the translators, so it cannot hold a marker
        let Some(last) = message
            .content
            .iter_mut()
            .rev()
            .find(|content| !content.is_empty_text())
        else {
            continue;
        };
        if breakpoints_remaining > 0 {
            breakpoints_remaining -= 1;
            last.set_cache_control(Some(CacheControl::Ephemeral));
        } else {
            last.set_cache_control(None);
            break;
        }
    }
}
