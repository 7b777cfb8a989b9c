//! Inference — Bedrock `InvokeModel` client for Claude's Messages API.
//!
//! This module handles all communication with the hosted model:
//! - Turn assembly (text + optional image into one user message)
//! - Request encoding with flat-merged sampling parameters
//! - SigV4-signed HTTP transport behind the `InvokeModel` trait
//! - Reply parsing into plain response text
//! - Configuration loading from `bedrock-chat.yaml` or the environment

pub mod client;
pub mod config;
pub mod errors;
pub mod invoke;
pub mod messages;
pub mod signing;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{create_client, BedrockRuntimeClient};
pub use config::{AppConfig, AwsSettings, MemorySettings, ModelConfig};
pub use errors::{InferenceError, InvocationFailure};
pub use invoke::invoke;
pub use messages::build_messages;
pub use transport::InvokeModel;
pub use types::{ContentBlock, ImageData, InferenceResult, Message, Role};
