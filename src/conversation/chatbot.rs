//! Chatbot — one conversational turn at a time against a hosted model.
//!
//! A turn is: assemble the user message (optionally after replayed
//! history), invoke the model, check the reply has text, and record the
//! exchange in the caller's memory. Any failure leaves memory untouched.

use std::sync::Arc;

use uuid::Uuid;

use crate::inference::client::BedrockRuntimeClient;
use crate::inference::config::{AppConfig, ModelConfig};
use crate::inference::errors::InferenceError;
use crate::inference::invoke::invoke;
use crate::inference::messages::build_messages;
use crate::inference::transport::InvokeModel;
use crate::inference::types::{ImageData, Message};

use super::memory::ConversationMemory;
use super::tokens::truncate_utf8;

/// Longest user-input preview written to the log.
const LOG_PREVIEW_BYTES: usize = 80;

/// Which part of memory is sent back to the model as prior messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryReplay {
    /// Every turn is sent on its own.
    Off,
    /// All exchanges are replayed.
    All,
    /// Only the most recent exchanges within this token estimate.
    Budget(u32),
}

/// A configured model plus the transport used to reach it.
pub struct Chatbot {
    transport: Arc<dyn InvokeModel>,
    config: ModelConfig,
    replay: HistoryReplay,
    session_id: Uuid,
}

impl Chatbot {
    pub fn new(transport: Arc<dyn InvokeModel>, config: ModelConfig) -> Self {
        Self {
            transport,
            config,
            replay: HistoryReplay::Off,
            session_id: Uuid::new_v4(),
        }
    }

    /// Build a chatbot on a Bedrock runtime client from application config.
    pub fn from_app_config(app: &AppConfig) -> Result<Self, InferenceError> {
        app.model.validate()?;
        let client = BedrockRuntimeClient::from_settings(&app.aws)?;
        tracing::info!(
            region = client.region(),
            endpoint = client.endpoint(),
            "created Bedrock runtime client"
        );
        let chatbot = Self::new(Arc::new(client), app.model.clone());
        Ok(if app.memory.replay_history {
            chatbot.with_history_replay(app.memory.max_history_tokens)
        } else {
            chatbot
        })
    }

    /// Send previous exchanges from memory along with each new turn.
    ///
    /// With `max_tokens`, only the most recent exchanges whose estimated
    /// size fits are sent.
    pub fn with_history_replay(mut self, max_tokens: Option<u32>) -> Self {
        self.replay = match max_tokens {
            Some(budget) => HistoryReplay::Budget(budget),
            None => HistoryReplay::All,
        };
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Run one turn and return the model's text.
    ///
    /// Fails with [`InferenceError::EmptyTurn`] before any call when neither
    /// text nor image is given, and with [`InferenceError::EmptyResponse`]
    /// when the reply holds no text. On success the exchange is appended to
    /// `memory` if the turn had text; image-only turns are not recorded.
    pub async fn converse(
        &self,
        input_text: Option<&str>,
        image: Option<&ImageData>,
        memory: Option<&mut ConversationMemory>,
    ) -> Result<String, InferenceError> {
        let prior = self.prior_messages(memory.as_deref());
        let messages = build_messages(&prior, input_text, image)?;

        tracing::info!(
            session_id = %self.session_id,
            replayed = prior.len(),
            has_image = image.is_some_and(|i| !i.is_empty()),
            input = truncate_utf8(input_text.unwrap_or_default(), LOG_PREVIEW_BYTES),
            "starting turn"
        );

        let result = invoke(self.transport.as_ref(), &self.config, &messages).await?;
        if result.response_text.is_empty() {
            tracing::warn!(
                session_id = %self.session_id,
                model_id = %self.config.model_id(),
                "model reply contained no text"
            );
            return Err(InferenceError::EmptyResponse {
                model_id: self.config.model_id().to_string(),
            });
        }

        if let (Some(memory), Some(text)) = (memory, input_text.filter(|t| !t.is_empty())) {
            memory.append(text, result.response_text.as_str());
            tracing::debug!(session_id = %self.session_id, exchanges = memory.len(), "memory updated");
        }

        Ok(result.response_text)
    }

    fn prior_messages(&self, memory: Option<&ConversationMemory>) -> Vec<Message> {
        match (memory, self.replay) {
            (None, _) | (_, HistoryReplay::Off) => Vec::new(),
            (Some(memory), HistoryReplay::All) => memory.to_messages(),
            (Some(memory), HistoryReplay::Budget(max_tokens)) => memory.recent_messages(max_tokens),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
