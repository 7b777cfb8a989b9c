//! Token estimation for replay budgets.
//!
//! Character-based heuristic: English prose averages ~3.2 chars/token,
//! which overestimates slightly for most tokenizers. Images are not
//! counted; only text is ever replayed from memory.

use crate::inference::types::{ContentBlock, Message};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Average characters per token for English prose.
const CHARS_PER_TOKEN: f64 = 3.2;

/// Per-message overhead (role label, formatting tokens).
const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

// ─── UTF-8 Safe Truncation ──────────────────────────────────────────────────

/// Truncate a string to at most `max_bytes` bytes on a valid UTF-8 char boundary.
pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ─── Public API ─────────────────────────────────────────────────────────────

/// Estimate the token count for a string of natural language text.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.len() as f64;
    (chars / CHARS_PER_TOKEN).ceil() as u32
}

/// Estimate the token count for a [`Message`], text blocks only.
pub fn estimate_message_tokens(message: &Message) -> u32 {
    let text_tokens: u32 = message
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => estimate_tokens(text),
            ContentBlock::Image { .. } => 0,
        })
        .sum();
    MESSAGE_OVERHEAD_TOKENS + text_tokens
}

// ─── Tests ──────────────────────────────────────────────────────────────────
