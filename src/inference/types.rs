//! Shared types for the inference client.
//!
//! These mirror the Anthropic Messages API shape accepted by Bedrock's
//! `InvokeModel`, used for both request building and response parsing.

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Media type declared on every image block.
pub const IMAGE_MEDIA_TYPE: &str = "image/jpeg";

// ─── Request Types ───────────────────────────────────────────────────────────

/// Message role. The Messages API only knows these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One part of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

/// Inline image payload. Only base64 sources are produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
}

impl ContentBlock {
    /// A text block.
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// An image block. The media type is always `image/jpeg`, whatever the
    /// source format; callers supply compatible data.
    pub fn image(image: &ImageData) -> Self {
        ContentBlock::Image {
            source: ImageSource::Base64 {
                media_type: IMAGE_MEDIA_TYPE.to_string(),
                data: image.as_base64().to_string(),
            },
        }
    }
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// A user message holding one text block.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// An assistant message holding one text block.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }
}

/// Base64 text of an image attached to a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData(String);

impl ImageData {
    /// Encode raw image bytes (as read from an upload or a file).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    /// Wrap text that is already base64-encoded.
    pub fn from_base64(data: impl Into<String>) -> Self {
        Self(data.into())
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ─── Transport Types ─────────────────────────────────────────────────────────

/// Content negotiation value sent as both `contentType` and `accept`.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// One `InvokeModel` call as handed to a transport.
#[derive(Debug, Clone)]
pub struct InvokeModelRequest {
    pub model_id: String,
    pub content_type: String,
    pub accept: String,
    /// Serialized request document.
    pub body: Vec<u8>,
}

/// The raw reply of an `InvokeModel` call.
#[derive(Debug, Clone)]
pub struct InvokeModelResponse {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    /// Text blocks of the reply, newline-joined and trimmed.
    pub response_text: String,
    /// The whole parsed reply document, including non-text blocks.
    pub raw_payload: serde_json::Value,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
