//! ConversationMemory — in-process log of completed exchanges.
//!
//! Responsibilities:
//! - Append `(user input, assistant response)` pairs in turn order
//! - Render the transcript for display (`Human: ... / AI: ...`)
//! - Render pairs as Messages API messages for history replay
//! - Select the most recent pairs that fit a token budget

use crate::inference::types::Message;

use super::tokens;

/// Speaker label for user lines in the transcript.
const HUMAN_PREFIX: &str = "Human";

/// Speaker label for model lines in the transcript.
const AI_PREFIX: &str = "AI";

/// One completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user_input: String,
    pub assistant_response: String,
}

impl Exchange {
    fn to_messages(&self) -> [Message; 2] {
        [
            Message::user_text(self.user_input.as_str()),
            Message::assistant_text(self.assistant_response.as_str()),
        ]
    }
}

/// Append-only conversation log, owned by one session.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    exchanges: Vec<Exchange>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed exchange.
    pub fn append(&mut self, user_input: impl Into<String>, assistant_response: impl Into<String>) {
        self.exchanges.push(Exchange {
            user_input: user_input.into(),
            assistant_response: assistant_response.into(),
        });
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Forget every exchange.
    pub fn reset(&mut self) {
        self.exchanges.clear();
    }

    /// The transcript, one `Human:` and one `AI:` line per exchange.
    ///
    /// Empty memory renders as an empty string.
    pub fn to_context_string(&self) -> String {
        self.exchanges
            .iter()
            .map(|e| {
                format!(
                    "{HUMAN_PREFIX}: {}\n{AI_PREFIX}: {}",
                    e.user_input, e.assistant_response
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All exchanges as alternating user/assistant text messages.
    pub fn to_messages(&self) -> Vec<Message> {
        self.exchanges.iter().flat_map(Exchange::to_messages).collect()
    }

    /// The most recent exchanges whose estimated size fits `max_tokens`.
    ///
    /// Exchanges are dropped whole from the oldest end, so the result always
    /// starts with a user message.
    pub fn recent_messages(&self, max_tokens: u32) -> Vec<Message> {
        let mut used = 0u32;
        let mut keep = 0usize;
        for exchange in self.exchanges.iter().rev() {
            let cost: u32 = exchange
                .to_messages()
                .iter()
                .map(tokens::estimate_message_tokens)
                .sum();
            if used.saturating_add(cost) > max_tokens {
                break;
            }
            used += cost;
            keep += 1;
        }

        self.exchanges[self.exchanges.len() - keep..]
            .iter()
            .flat_map(Exchange::to_messages)
            .collect()
    }

    /// Estimated token size of the full replayed history.
    pub fn estimated_tokens(&self) -> u32 {
        self.to_messages()
            .iter()
            .map(tokens::estimate_message_tokens)
            .sum()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
