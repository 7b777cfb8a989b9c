//! Request encoding, the model call, and reply parsing.
//!
//! Every failure past this point is caught here, logged, and returned as
//! [`InferenceError::Invocation`]; callers never see transport fault types.

use std::time::Instant;

use serde_json::{Map, Value};

use super::config::ModelConfig;
use super::errors::{InferenceError, InvocationFailure};
use super::transport::InvokeModel;
use super::types::{InferenceResult, InvokeModelRequest, Message, JSON_CONTENT_TYPE};

/// Encode the request document.
///
/// `messages` and `max_tokens` are always present, `anthropic_version` when
/// configured, then every sampling parameter is merged in at the top level.
/// A sampling parameter named like a reserved field replaces it.
pub fn build_request_body(
    config: &ModelConfig,
    messages: &[Message],
) -> Result<Vec<u8>, InvocationFailure> {
    let encoded_messages =
        serde_json::to_value(messages).map_err(|e| InvocationFailure::Serialization {
            reason: format!("failed to encode messages: {e}"),
        })?;

    let mut body = Map::new();
    body.insert("messages".to_string(), encoded_messages);
    body.insert("max_tokens".to_string(), Value::from(config.max_tokens()));
    if let Some(version) = config.anthropic_version() {
        body.insert("anthropic_version".to_string(), Value::from(version));
    }
    for (key, value) in config.sampling() {
        body.insert(key.clone(), value.clone());
    }

    serde_json::to_vec(&Value::Object(body)).map_err(|e| InvocationFailure::Serialization {
        reason: format!("failed to encode request body: {e}"),
    })
}

/// Turn a reply body into an [`InferenceResult`].
///
/// Each `content` entry of type `"text"` contributes its text plus a newline;
/// the joined text is trimmed. Other entry types are skipped but stay in
/// `raw_payload`. A missing `content` field yields an empty response text.
pub fn parse_response(body: &[u8]) -> Result<InferenceResult, InvocationFailure> {
    let raw_payload: Value =
        serde_json::from_slice(body).map_err(|e| InvocationFailure::MalformedResponse {
            reason: format!("reply is not JSON: {e}"),
        })?;

    let entries: &[Value] = match raw_payload.get("content") {
        None | Some(Value::Null) => &[],
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            return Err(InvocationFailure::MalformedResponse {
                reason: format!("'content' is not a list: {other}"),
            })
        }
    };

    let mut text = String::new();
    for entry in entries {
        if entry.get("type").and_then(Value::as_str) != Some("text") {
            continue;
        }
        let block_text = entry.get("text").and_then(Value::as_str).ok_or_else(|| {
            InvocationFailure::MalformedResponse {
                reason: format!("text block without text: {entry}"),
            }
        })?;
        text.push_str(block_text);
        text.push('\n');
    }

    Ok(InferenceResult {
        response_text: text.trim().to_string(),
        raw_payload,
    })
}

/// `application/json`, with or without parameters such as `charset`.
fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE))
}

/// Send `messages` to the configured model through `transport`.
///
/// A single attempt. On failure the cause is logged at `warn` and wrapped in
/// [`InferenceError::Invocation`].
pub async fn invoke(
    transport: &dyn InvokeModel,
    config: &ModelConfig,
    messages: &[Message],
) -> Result<InferenceResult, InferenceError> {
    let model_id = config.model_id();

    let result = invoke_inner(transport, config, messages).await;
    result.map_err(|failure| {
        tracing::warn!(model_id = %model_id, error = %failure, "model invocation failed");
        InferenceError::Invocation {
            model_id: model_id.to_string(),
            failure,
        }
    })
}

async fn invoke_inner(
    transport: &dyn InvokeModel,
    config: &ModelConfig,
    messages: &[Message],
) -> Result<InferenceResult, InvocationFailure> {
    let body = build_request_body(config, messages)?;

    // Metadata only; image payloads make the body huge.
    tracing::info!(
        model_id = %config.model_id(),
        message_count = messages.len(),
        block_count = messages.iter().map(|m| m.content.len()).sum::<usize>(),
        max_tokens = config.max_tokens(),
        body_bytes = body.len(),
        "=== LLM REQUEST ==="
    );

    let started = Instant::now();
    let response = transport
        .invoke_model(InvokeModelRequest {
            model_id: config.model_id().to_string(),
            content_type: JSON_CONTENT_TYPE.to_string(),
            accept: JSON_CONTENT_TYPE.to_string(),
            body,
        })
        .await?;

    if let Some(content_type) = response.content_type.as_deref() {
        if !is_json_content_type(content_type) {
            return Err(InvocationFailure::MalformedResponse {
                reason: format!("expected a JSON reply, got content type '{content_type}'"),
            });
        }
    }

    let result = parse_response(&response.body)?;

    let stop_reason = result
        .raw_payload
        .get("stop_reason")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let output_tokens = result
        .raw_payload
        .pointer("/usage/output_tokens")
        .and_then(Value::as_u64);
    tracing::info!(
        model_id = %config.model_id(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        response_chars = result.response_text.chars().count(),
        stop_reason,
        output_tokens,
        "=== LLM RESPONSE ==="
    );

    Ok(result)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
