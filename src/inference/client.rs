//! Bedrock runtime client.
//!
//! Sends SigV4-signed `InvokeModel` requests over HTTPS. Creating a client
//! performs no network I/O; bad credentials only show up on the first call.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client as HttpClient;

use super::config::AwsSettings;
use super::errors::{InferenceError, InvocationFailure};
use super::signing::{self, Credentials, SigningRequest};
use super::transport::InvokeModel;
use super::types::{InvokeModelRequest, InvokeModelResponse};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout (matches the AWS SDK default).
const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-read timeout (matches the AWS SDK default).
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// SigV4 service name for the runtime API.
const SIGNING_SERVICE: &str = "bedrock";

// ─── Factory ─────────────────────────────────────────────────────────────────

/// Create a runtime client for `region` with static credentials.
///
/// All three inputs must be non-empty. A single attempt; nothing is sent
/// until the first invocation.
pub fn create_client(
    region: &str,
    access_key_id: &str,
    secret_access_key: &str,
) -> Result<BedrockRuntimeClient, InferenceError> {
    BedrockRuntimeClient::from_settings(&AwsSettings {
        region: region.to_string(),
        access_key_id: access_key_id.to_string(),
        secret_access_key: secret_access_key.to_string(),
        session_token: None,
        endpoint: None,
    })
}

// ─── BedrockRuntimeClient ────────────────────────────────────────────────────

/// Authenticated handle to the Bedrock runtime endpoint.
pub struct BedrockRuntimeClient {
    http: HttpClient,
    region: String,
    /// Scheme + authority, no trailing slash.
    endpoint: String,
    credentials: Credentials,
}

impl std::fmt::Debug for BedrockRuntimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockRuntimeClient")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl BedrockRuntimeClient {
    /// Build a client from configuration, including the optional session
    /// token and endpoint override.
    pub fn from_settings(settings: &AwsSettings) -> Result<Self, InferenceError> {
        let required = [
            ("region", &settings.region),
            ("access key id", &settings.access_key_id),
            ("secret access key", &settings.secret_access_key),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(InferenceError::ClientCreation {
                reason: format!("missing {}", missing.join(", ")),
            });
        }

        let endpoint = match &settings.endpoint {
            Some(url) => {
                let parsed = reqwest::Url::parse(url).map_err(|e| {
                    InferenceError::ClientCreation {
                        reason: format!("invalid endpoint '{url}': {e}"),
                    }
                })?;
                if parsed.host_str().is_none() {
                    return Err(InferenceError::ClientCreation {
                        reason: format!("endpoint '{url}' has no host"),
                    });
                }
                url.trim_end_matches('/').to_string()
            }
            None => format!("https://bedrock-runtime.{}.amazonaws.com", settings.region),
        };

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| InferenceError::ClientCreation {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            region: settings.region.clone(),
            endpoint,
            credentials: Credentials {
                access_key_id: settings.access_key_id.clone(),
                secret_access_key: settings.secret_access_key.clone(),
                session_token: settings.session_token.clone().filter(|t| !t.is_empty()),
            },
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The `InvokeModel` URL for `model_id` (model id encoded as one path segment).
    pub fn invoke_url(&self, model_id: &str) -> String {
        format!(
            "{}/model/{}/invoke",
            self.endpoint,
            signing::uri_encode(model_id, true)
        )
    }

    /// Build the signed HTTP request without sending it.
    fn build_request(
        &self,
        request: &InvokeModelRequest,
        now: chrono::DateTime<Utc>,
    ) -> Result<reqwest::Request, InvocationFailure> {
        let url_text = self.invoke_url(&request.model_id);
        let url = reqwest::Url::parse(&url_text).map_err(|e| InvocationFailure::Serialization {
            reason: format!("invalid invoke URL '{url_text}': {e}"),
        })?;

        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(InvocationFailure::Serialization {
                    reason: format!("invoke URL '{url_text}' has no host"),
                })
            }
        };

        let headers = vec![
            ("accept".to_string(), request.accept.clone()),
            ("content-type".to_string(), request.content_type.clone()),
            ("host".to_string(), host),
        ];
        let signature = signing::sign(
            &SigningRequest {
                method: "POST",
                path: url.path(),
                headers: &headers,
                body: &request.body,
            },
            &self.credentials,
            &self.region,
            SIGNING_SERVICE,
            now,
        );

        let mut builder = self
            .http
            .post(url)
            .header("content-type", &request.content_type)
            .header("accept", &request.accept);
        for (name, value) in signature.into_pairs() {
            builder = builder.header(name, value);
        }

        builder
            .body(request.body.clone())
            .build()
            .map_err(|e| InvocationFailure::Serialization {
                reason: format!("failed to build HTTP request: {e}"),
            })
    }
}

#[async_trait]
impl InvokeModel for BedrockRuntimeClient {
    async fn invoke_model(
        &self,
        request: InvokeModelRequest,
    ) -> Result<InvokeModelResponse, InvocationFailure> {
        let http_request = self.build_request(&request, Utc::now())?;
        let url = http_request.url().to_string();

        let response = self.http.execute(http_request).await.map_err(|e| {
            if e.is_timeout() {
                InvocationFailure::Timeout {
                    reason: e.to_string(),
                }
            } else {
                InvocationFailure::Connection {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(status.as_u16(), response.text().await);
            return Err(InvocationFailure::Http {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                InvocationFailure::Timeout {
                    reason: e.to_string(),
                }
            } else {
                InvocationFailure::Connection {
                    endpoint: url,
                    reason: format!("failed to read response body: {e}"),
                }
            }
        })?;

        Ok(InvokeModelResponse {
            content_type,
            body: body.to_vec(),
        })
    }
}

/// The body of a non-2xx reply, or a note saying why it is missing.
fn error_body<E: std::fmt::Display>(status: u16, read: Result<String, E>) -> String {
    match read {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(status, error = %e, "failed to read error response body");
            format!("<unreadable response body: {e}>")
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::JSON_CONTENT_TYPE;
    use chrono::TimeZone;

    fn settings() -> AwsSettings {
        AwsSettings {
            region: "us-east-1".into(),
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "secret".into(),
            session_token: None,
            endpoint: None,
        }
    }

    fn request() -> InvokeModelRequest {
        InvokeModelRequest {
            model_id: "anthropic.claude-3-haiku-20240307-v1:0".into(),
            content_type: JSON_CONTENT_TYPE.into(),
            accept: JSON_CONTENT_TYPE.into(),
            body: br#"{"max_tokens":10,"messages":[]}"#.to_vec(),
        }
    }

    #[test]
    fn test_create_client_rejects_empty_inputs() {
        let err = create_client("", "AKID", "secret").unwrap_err();
        assert!(matches!(err, InferenceError::ClientCreation { .. }));
        assert!(err.to_string().contains("region"));

        let err = create_client("us-east-1", " ", "").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("access key id"));
        assert!(text.contains("secret access key"));
    }

    #[test]
    fn test_create_client_default_endpoint() {
        let client = create_client("eu-central-1", "AKID", "secret").unwrap();
        assert_eq!(client.region(), "eu-central-1");
        assert_eq!(
            client.endpoint(),
            "https://bedrock-runtime.eu-central-1.amazonaws.com"
        );
    }

    #[test]
    fn test_endpoint_override() {
        let mut s = settings();
        s.endpoint = Some("http://localhost:4566/".into());
        let client = BedrockRuntimeClient::from_settings(&s).unwrap();
        assert_eq!(
            client.invoke_url("m:1"),
            "http://localhost:4566/model/m%3A1/invoke"
        );
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let mut s = settings();
        s.endpoint = Some("not a url".into());
        assert!(matches!(
            BedrockRuntimeClient::from_settings(&s),
            Err(InferenceError::ClientCreation { .. })
        ));
    }

    #[test]
    fn test_build_request_is_signed() {
        let client = BedrockRuntimeClient::from_settings(&settings()).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 9, 9, 10, 0, 0).unwrap();
        let req = client.build_request(&request(), now).unwrap();

        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(
            req.url().as_str(),
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/anthropic.claude-3-haiku-20240307-v1%3A0/invoke"
        );
        let headers = req.headers();
        assert_eq!(headers["content-type"], JSON_CONTENT_TYPE);
        assert_eq!(headers["accept"], JSON_CONTENT_TYPE);
        assert_eq!(headers["x-amz-date"], "20240909T100000Z");
        let auth = headers["authorization"].to_str().unwrap();
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240909/us-east-1/bedrock/aws4_request"
        ));
        assert!(auth.contains("SignedHeaders=accept;content-type;host;x-amz-date"));
        assert!(headers.get("x-amz-security-token").is_none());
    }

    #[test]
    fn test_build_request_carries_session_token() {
        let mut s = settings();
        s.session_token = Some("session".into());
        let client = BedrockRuntimeClient::from_settings(&s).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 9, 9, 10, 0, 0).unwrap();
        let req = client.build_request(&request(), now).unwrap();
        assert_eq!(req.headers()["x-amz-security-token"], "session");
    }

    #[test]
    fn test_empty_session_token_is_ignored() {
        let mut s = settings();
        s.session_token = Some(String::new());
        let client = BedrockRuntimeClient::from_settings(&s).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 9, 9, 10, 0, 0).unwrap();
        let req = client.build_request(&request(), now).unwrap();
        assert!(req.headers().get("x-amz-security-token").is_none());
    }

    #[test]
    fn test_error_body_keeps_read_failure() {
        assert_eq!(error_body(403, Ok::<_, String>("denied".into())), "denied");
        assert_eq!(
            error_body(500, Err("connection reset")),
            "<unreadable response body: connection reset>"
        );
    }

    #[test]
    fn test_debug_hides_secret() {
        let client = BedrockRuntimeClient::from_settings(&settings()).unwrap();
        let printed = format!("{client:?}");
        assert!(!printed.contains("\"secret\""));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_failure() {
        let mut s = settings();
        // Port 9 (discard) on loopback is almost never listening.
        s.endpoint = Some("http://127.0.0.1:9".into());
        let client = BedrockRuntimeClient::from_settings(&s).unwrap();
        let err = client.invoke_model(request()).await.unwrap_err();
        assert!(matches!(
            err,
            InvocationFailure::Connection { .. } | InvocationFailure::Timeout { .. }
        ));
    }
}
