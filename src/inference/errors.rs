//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility — these types carry the context needed to build
//! meaningful log entries.

use thiserror::Error;

/// Errors surfaced by the chatbot core.
///
/// Transport-level faults never appear here directly: the invoker wraps them
/// in [`InferenceError::Invocation`] so callers only ever match on this enum.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Credentials/region missing or the transport could not be built.
    #[error("failed to create Bedrock runtime client: {reason}")]
    ClientCreation { reason: String },

    /// Neither text nor an image was supplied for the turn.
    #[error("a turn needs text, an image, or both")]
    EmptyTurn,

    /// The model call failed (serialization, transport, or remote error).
    #[error("invocation of '{model_id}' failed: {failure}")]
    Invocation {
        model_id: String,
        failure: InvocationFailure,
    },

    /// The call succeeded but the reply held no text content.
    #[error("model '{model_id}' returned no text")]
    EmptyResponse { model_id: String },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    Config { reason: String },
}

/// What went wrong during a single model invocation.
#[derive(Debug, Error)]
pub enum InvocationFailure {
    /// The request body could not be encoded.
    #[error("request serialization failed: {reason}")]
    Serialization { reason: String },

    /// TCP/HTTP connection to the runtime endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    /// The runtime endpoint did not answer in time.
    #[error("request timed out: {reason}")]
    Timeout { reason: String },

    /// Non-2xx HTTP response from the runtime endpoint.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The reply body was not the expected `{"content": [...]}` document.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },
}

impl InferenceError {
    /// The HTTP status of a failed invocation, if the remote answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            InferenceError::Invocation {
                failure: InvocationFailure::Http { status, .. },
                ..
            } => Some(*status),
            _ => None,
        }
    }
}
