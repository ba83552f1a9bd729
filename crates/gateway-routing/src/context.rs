//! Per-model character budgets and truncation of oversized prompts.

use gateway_core::{ChatRequest, ContentPart, MessageContent};
use std::borrow::Cow;

/// Budget for models missing from the table
pub const DEFAULT_CONTEXT_CHAR_LIMIT: usize = 32_000;

/// Character budgets by internal model id.
///
/// Query-string upstreams get small budgets since the prompt travels in the URL.
const CONTEXT_CHAR_LIMITS: &[(&str, usize)] = &[
    ("grok-3", 6_000),
    ("claude-sonnet-4", 6_000),
    ("gpt-oss-120b", 20_000),
    ("gemini-2.0-flash", 400_000),
    ("gemini-2.0-flash-search", 400_000),
    ("gemini-2.0-flash-lite", 400_000),
    ("gemini-1.5-pro", 800_000),
    ("meta-llama-Llama-3.3-70B-Instruct", 120_000),
    ("meta-llama-Llama-3.2-90B-Vision-Instruct", 120_000),
    ("deepseek-ai-DeepSeek-V3", 120_000),
    ("deepseek-ai-DeepSeek-R1", 120_000),
    ("Qwen-Qwen2.5-72B-Instruct", 120_000),
    ("openai-gpt-4o", 120_000),
    ("gpt-4o-mini", 120_000),
    ("gpt-4.1", 400_000),
    ("anthropic-claude-3-5-sonnet", 200_000),
    ("claude-3-7-sonnet-20250219", 200_000),
    ("codex-mini-latest", 200_000),
    ("@cf-meta-llama-3.1-8b-instruct", 24_000),
    ("@cf-qwen-qwq-32b", 48_000),
];

/// Character budget for a model
#[must_use]
pub fn context_char_limit(internal_id: &str) -> usize {
    CONTEXT_CHAR_LIMITS
        .iter()
        .find(|(id, _)| *id == internal_id)
        .map_or(DEFAULT_CONTEXT_CHAR_LIMIT, |(_, limit)| *limit)
}

/// Keep the first `limit` characters of `text` and append a note.
///
/// Text at or under the limit is returned as is.
#[must_use]
pub fn truncate_to_limit(text: &str, limit: usize) -> Cow<'_, str> {
    let Some((cut, _)) = text.char_indices().nth(limit) else {
        return Cow::Borrowed(text);
    };
    let original = text.chars().count();
    Cow::Owned(format!(
        "{}\n\n[Content truncated: showing {limit} of {original} characters]",
        &text[..cut]
    ))
}

/// Truncate the text of the last user message in place.
///
/// Multi-part messages keep their image parts; the text parts are joined
/// and replaced by one truncated text part. Returns whether anything changed.
pub fn truncate_last_user_message(request: &mut ChatRequest, limit: usize) -> bool {
    let Some(index) = request.last_user_index() else {
        return false;
    };
    let content = &mut request.messages[index].content;
    let text = content.joined_text();
    let Cow::Owned(truncated) = truncate_to_limit(&text, limit) else {
        return false;
    };

    match content {
        MessageContent::Text(s) => *s = truncated,
        MessageContent::Parts(parts) => {
            parts.retain(|p| matches!(p, ContentPart::ImageUrl { .. }));
            parts.insert(0, ContentPart::Text { text: truncated });
        }
    }
    true
}
