//! Model and credential configuration.
//!
//! Reads `bedrock-chat.yaml` and resolves environment variables. When no file
//! is present the configuration is assembled from the process environment,
//! using the same variable names the `.env` file carries.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::InferenceError;

/// File name searched for when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "bedrock-chat.yaml";

/// Env var pointing at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "BEDROCK_CHAT_CONFIG";

const DEFAULT_MODEL_ID: &str = "anthropic.claude-3-haiku-20240307-v1:0";
const DEFAULT_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const DEFAULT_MAX_TOKENS: u32 = 1000;

// ─── ModelConfig ─────────────────────────────────────────────────────────────

/// Per-invocation model parameters.
///
/// Immutable once built: the `with_*` methods consume and return a new value.
/// Sampling parameters are merged flat into the request body next to
/// `messages` and `max_tokens`, so a key such as `"max_tokens"` here wins over
/// the reserved field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_id")]
    model_id: String,
    /// `null` in the file omits the field from requests.
    #[serde(default = "default_anthropic_version")]
    anthropic_version: Option<String>,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    /// A bare `sampling:` (null) means the defaults; `{}` means none.
    #[serde(default = "default_sampling", deserialize_with = "sampling_or_default")]
    sampling: BTreeMap<String, serde_json::Value>,
}

fn sampling_or_default<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let sampling: Option<BTreeMap<String, serde_json::Value>> =
        Option::deserialize(deserializer)?;
    Ok(sampling.unwrap_or_else(default_sampling))
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_anthropic_version() -> Option<String> {
    Some(DEFAULT_ANTHROPIC_VERSION.to_string())
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_sampling() -> BTreeMap<String, serde_json::Value> {
    BTreeMap::from([
        ("temperature".to_string(), serde_json::json!(0.0)),
        ("top_k".to_string(), serde_json::json!(250)),
        ("top_p".to_string(), serde_json::json!(1.0)),
    ])
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_ID).with_anthropic_version(DEFAULT_ANTHROPIC_VERSION)
    }
}

impl ModelConfig {
    /// Config for `model_id` with the default token limit and sampling
    /// (`temperature = 0.0`, `top_k = 250`, `top_p = 1.0`) and no version tag.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            anthropic_version: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            sampling: default_sampling(),
        }
    }

    pub fn with_anthropic_version(mut self, version: impl Into<String>) -> Self {
        self.anthropic_version = Some(version.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Set (or replace) one sampling parameter.
    pub fn with_sampling_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.sampling.insert(key.into(), value.into());
        self
    }

    /// Drop every sampling parameter.
    pub fn without_sampling(mut self) -> Self {
        self.sampling.clear();
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn anthropic_version(&self) -> Option<&str> {
        self.anthropic_version.as_deref()
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn sampling(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.sampling
    }

    /// Check that the model id is set and every sampling value is a number.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.model_id.trim().is_empty() {
            return Err(InferenceError::Config {
                reason: "model_id must not be empty".into(),
            });
        }
        if let Some((key, value)) = self.sampling.iter().find(|(_, v)| !v.is_number()) {
            return Err(InferenceError::Config {
                reason: format!("sampling parameter '{key}' must be a number, got {value}"),
            });
        }
        Ok(())
    }
}

// ─── Credentials ─────────────────────────────────────────────────────────────

/// Region, credentials and optional endpoint override for the runtime client.
///
/// Missing values deserialize as empty strings; the client factory rejects
/// them, so an incomplete file fails at client creation rather than parse time.
#[derive(Clone, Default, Deserialize)]
pub struct AwsSettings {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    /// Replaces `https://bedrock-runtime.{region}.amazonaws.com`.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl fmt::Debug for AwsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsSettings")
            .field("region", &self.region)
            .field("access_key_id", &redact(&self.access_key_id))
            .field("secret_access_key", &redact(&self.secret_access_key))
            .field("session_token", &self.session_token.as_deref().map(redact))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// Conversation memory behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MemorySettings {
    /// Feed previous exchanges back to the model as prior messages.
    #[serde(default)]
    pub replay_history: bool,
    /// Cap on the estimated tokens of replayed history.
    #[serde(default)]
    pub max_history_tokens: Option<u32>,
}

/// Top-level application config (mirrors `bedrock-chat.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub aws: AwsSettings,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub memory: MemorySettings,
}

impl AppConfig {
    /// Build the config from `AWS_REGION`, `ACCESS_KEY`, `SECRET_ACCESS_KEY`
    /// and the optional `AWS_SESSION_TOKEN`. Model settings use defaults.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).unwrap_or_default();
        Self {
            aws: AwsSettings {
                region: var("AWS_REGION"),
                access_key_id: var("ACCESS_KEY"),
                secret_access_key: var("SECRET_ACCESS_KEY"),
                session_token: std::env::var("AWS_SESSION_TOKEN")
                    .ok()
                    .filter(|t| !t.is_empty()),
                endpoint: None,
            },
            model: ModelConfig::default(),
            memory: MemorySettings::default(),
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the config file.
///
/// Checks `BEDROCK_CHAT_CONFIG` first, then walks upward from `start`
/// looking for `bedrock-chat.yaml`.
pub fn find_config_path(start: &Path) -> Result<PathBuf, InferenceError> {
    let explicit = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
    find_config_path_from(start, explicit)
}

fn find_config_path_from(
    start: &Path,
    explicit: Option<PathBuf>,
) -> Result<PathBuf, InferenceError> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "configured config path does not exist");
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(InferenceError::Config {
        reason: format!("could not find {CONFIG_FILE_NAME}"),
    })
}

/// Load and parse a config file.
///
/// `${VAR_NAME}` and `${VAR_NAME:-default}` are replaced from the environment
/// before the YAML is parsed.
pub fn load_config(path: &Path) -> Result<AppConfig, InferenceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::Config {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let config: AppConfig =
        serde_yaml::from_str(&interpolate_env_vars(&raw)).map_err(|e| InferenceError::Config {
            reason: format!("failed to parse {}: {e}", path.display()),
        })?;

    config.model.validate()?;
    Ok(config)
}

/// Load the config file found from `start`, or fall back to the environment.
pub fn load_or_env(start: &Path) -> Result<AppConfig, InferenceError> {
    match find_config_path(start) {
        Ok(path) => {
            tracing::info!(path = %path.display(), "loading config file");
            load_config(&path)
        }
        Err(_) => {
            tracing::info!("no config file found, reading credentials from environment");
            Ok(AppConfig::from_env())
        }
    }
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                out.push_str(&resolve_var_expr(&after[..end]));
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated: keep verbatim.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Resolve `VAR` or `VAR:-default`. Unset or empty variables take the default.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
