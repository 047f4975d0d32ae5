//! Assembly of the bounded conversation context sent upstream.

use super::public::HistoryEntry;
use crate::openai::{Message, Role};

/// Longest history entry forwarded upstream, in characters. Longer
/// entries are truncated rather than rejected.
pub const HISTORY_CONTENT_CAP: usize = 1000;

/// Build the outbound message list: the system prompt, then the
/// client-supplied history with invalid entries silently dropped, then
/// the current user message.
pub fn build_messages(
    system_prompt: &str,
    history: &[HistoryEntry],
    message: &str,
) -> Vec<Message> {
    let mut messages = vec![Message::new(Role::System, system_prompt)];

    for entry in history {
        let role = match entry.role.as_deref() {
            Some("user") => Role::User,
            Some("assistant") => Role::Assistant,
            _ => continue,
        };
        let Some(content) = entry.content.as_ref().and_then(|content| content.as_str()) else {
            continue;
        };
        let content = content.chars().take(HISTORY_CONTENT_CAP).collect::<String>();
        messages.push(Message::new(role, &content));
    }

    messages.push(Message::new(Role::User, message));
    messages
}
