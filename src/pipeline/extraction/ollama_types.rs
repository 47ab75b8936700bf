use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Ollama /api/chat wire types
// ──────────────────────────────────────────────

/// Chat-based vision request for `/api/chat`.
///
/// `format` carries a JSON schema; Ollama constrains decoding to it.
#[derive(Debug, Clone, Serialize)]
pub struct VisionChatRequest {
    pub model: String,
    pub messages: Vec<VisionChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<VisionGenerationOptions>,
}

/// A single message in a vision chat request.
#[derive(Debug, Clone, Serialize)]
pub struct VisionChatMessage {
    pub role: String,
    pub content: String,
    /// Base64-encoded images (only for user messages).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

/// Generation options tuned for table transcription.
#[derive(Debug, Clone, Serialize)]
pub struct VisionGenerationOptions {
    pub temperature: f32,
}

/// One NDJSON line of a streaming `/api/chat` response.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatStreamChunk {
    #[serde(default)]
    pub message: Option<ChatStreamMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatStreamMessage {
    #[serde(default)]
    pub content: String,
}

// ──────────────────────────────────────────────
// Error taxonomy
// ──────────────────────────────────────────────

/// Transport and protocol failures of the inference backend.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("AI service is not reachable at {0}")]
    NotReachable(String),

    #[error("AI service returned an error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("AI service reported an error: {0}")]
    Model(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed stream chunk: {0}")]
    MalformedChunk(String),

    #[error("Invalid model name: '{0}'")]
    InvalidModelName(String),

    #[error("Invalid URL format: '{0}'")]
    InvalidUrl(String),
}

// ──────────────────────────────────────────────
// Validators
// ──────────────────────────────────────────────

/// Validate a model name against the Ollama naming convention.
///
/// Format: `[namespace/]model[:tag]`, each segment starting alphanumeric, at
/// most one namespace. Rejects path traversal and shell metacharacters.
pub fn validate_model_name(name: &str) -> Result<(), InferenceError> {
    let valid = regex::Regex::new(
        r"^[a-zA-Z0-9][a-zA-Z0-9._-]*(/[a-zA-Z0-9][a-zA-Z0-9._-]*)?(:[a-zA-Z0-9._-]+)?$",
    )
    .map_err(|e| InferenceError::InvalidModelName(e.to_string()))?;

    if name.is_empty() || !valid.is_match(name) {
        return Err(InferenceError::InvalidModelName(name.to_string()));
    }
    Ok(())
}

/// Validate that a base URL has an http(s) scheme and a host.
pub fn validate_base_url(url: &str) -> Result<(), InferenceError> {
    let after_scheme = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| InferenceError::InvalidUrl(url.to_string()))?;

    let host = after_scheme.split(['/', '?', '#']).next().unwrap_or("");
    if host.is_empty() || host.starts_with(':') {
        return Err(InferenceError::InvalidUrl(url.to_string()));
    }
    Ok(())
}
