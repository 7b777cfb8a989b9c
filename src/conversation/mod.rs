//! Conversation — turn orchestration and the in-process exchange log.
//!
//! Submodules:
//! - `chatbot`: One turn end to end (build, invoke, record)
//! - `memory`: Append-only log of `(user input, assistant response)` pairs
//! - `tokens`: Token estimation for history replay budgets

pub mod chatbot;
pub mod memory;
pub mod tokens;

// Re-exports for convenience
pub use chatbot::Chatbot;
pub use memory::{ConversationMemory, Exchange};
