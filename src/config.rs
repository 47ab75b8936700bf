use std::net::SocketAddr;

use crate::pipeline::extraction::ollama_types::{validate_base_url, validate_model_name};
use crate::pipeline::extraction::InferenceError;
use crate::pipeline::upload::{MediaType, UploadLimits};

/// Application-level constants
pub const APP_NAME: &str = "ScribeTable";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// ── Upload acceptance ───────────────────────────────────────

/// Largest accepted upload, in megabytes.
pub const MAX_FILE_SIZE_MB: usize = 50;

pub const SUPPORTED_FORMATS: &[MediaType] = &[MediaType::Png, MediaType::Jpeg, MediaType::Webp];

// ── Payload fitting ─────────────────────────────────────────

/// Budget for the base-64 text of one image. The upstream request limit is
/// 20 MB; the gap leaves room for the prompt and JSON framing.
pub const API_PAYLOAD_LIMIT_BYTES: usize = 18 * 1024 * 1024;

/// JPEG qualities tried in order when the original does not fit.
pub const QUALITY_LADDER: &[u8] = &[90, 80, 70, 60, 50];

// ── Inference backend ───────────────────────────────────────

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_VISION_MODEL: &str = "qwen2.5vl:7b";

/// Vision models on CPU can take minutes for a dense page.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

// ── Session surface ─────────────────────────────────────────

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

pub const CSV_FILENAME: &str = "extracted_data.csv";
pub const XLSX_FILENAME: &str = "extracted_data.xlsx";

pub const ENV_OLLAMA_URL: &str = "SCRIBETABLE_OLLAMA_URL";
pub const ENV_MODEL: &str = "SCRIBETABLE_MODEL";
pub const ENV_BIND: &str = "SCRIBETABLE_BIND";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "scribetable_lib=info,scribetable=info,tower_http=info"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid inference settings: {0}")]
    Inference(#[from] InferenceError),
    #[error("Invalid bind address '{0}'")]
    BindAddr(String),
}

/// Runtime settings. Only deployment wiring is read from the environment;
/// limits keep their compiled defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub ollama_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
    pub bind_addr: SocketAddr,
    pub upload_limits: UploadLimits,
    pub payload_budget: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_VISION_MODEL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            upload_limits: UploadLimits::default(),
            payload_budget: API_PAYLOAD_LIMIT_BYTES,
        }
    }
}

impl AppConfig {
    /// Defaults overridden by `SCRIBETABLE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get(ENV_OLLAMA_URL) {
            config.ollama_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get(ENV_MODEL) {
            config.model = model;
        }
        if let Some(bind) = get(ENV_BIND) {
            config.bind_addr = bind.parse().map_err(|_| ConfigError::BindAddr(bind))?;
        }

        validate_base_url(&config.ollama_url)?;
        validate_model_name(&config.model)?;
        Ok(config)
    }
}
