//! Ollama vision backend: streams `/api/chat` NDJSON as text fragments.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};

use super::ollama_types::{
    validate_base_url, validate_model_name, ChatStreamChunk, InferenceError, VisionChatMessage,
    VisionChatRequest, VisionGenerationOptions,
};
use super::types::{FragmentStream, InferenceBackend, InferenceRequest};

/// Ollama HTTP client for vision inference.
pub struct OllamaInference {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OllamaInference {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, InferenceError> {
        validate_base_url(base_url)?;
        validate_model_name(model)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: InferenceRequest) -> VisionChatRequest {
        VisionChatRequest {
            model: self.model.clone(),
            messages: vec![
                VisionChatMessage {
                    role: "system".into(),
                    content: request.system_instruction,
                    images: None,
                },
                VisionChatMessage {
                    role: "user".into(),
                    content: request.task_instruction,
                    images: Some(vec![request.image_base64]),
                },
            ],
            stream: true,
            format: Some(request.response_schema),
            options: Some(VisionGenerationOptions {
                temperature: request.temperature,
            }),
        }
    }
}

impl InferenceBackend for OllamaInference {
    fn stream_table(&self, request: InferenceRequest) -> FragmentStream {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.build_request(request);
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let timeout_secs = self.timeout_secs;

        let open = async move {
            tracing::debug!(url = %url, model = %body.model, "Opening chat stream");
            let response = client.post(&url).json(&body).send().await.map_err(|e| {
                if e.is_connect() {
                    InferenceError::NotReachable(base_url.clone())
                } else if e.is_timeout() {
                    InferenceError::Timeout(timeout_secs)
                } else {
                    InferenceError::Network(e.to_string())
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(InferenceError::ApiError {
                    status: status.as_u16(),
                    message,
                });
            }

            let chunks = response
                .bytes_stream()
                .map(move |chunk| {
                    chunk.map(|bytes| bytes.to_vec()).map_err(|e| {
                        if e.is_timeout() {
                            InferenceError::Timeout(timeout_secs)
                        } else {
                            InferenceError::Network(e.to_string())
                        }
                    })
                })
                .boxed();
            Ok(decode_chat_stream(chunks))
        };

        Box::pin(stream::once(open).try_flatten())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ──────────────────────────────────────────────
// NDJSON decoding
// ──────────────────────────────────────────────

/// Splits an arbitrary byte-chunk sequence into complete lines.
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Append a chunk and drain every complete, non-blank line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    /// Flush a trailing line that had no newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

struct DecodeState {
    chunks: BoxStream<'static, Result<Vec<u8>, InferenceError>>,
    lines: LineDecoder,
    pending: VecDeque<Result<String, InferenceError>>,
    finished: bool,
}

impl DecodeState {
    fn queue_line(&mut self, line: &str) {
        if self.finished {
            return;
        }
        let chunk: ChatStreamChunk = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.pending
                    .push_back(Err(InferenceError::MalformedChunk(e.to_string())));
                self.finished = true;
                return;
            }
        };

        if let Some(error) = chunk.error {
            self.pending.push_back(Err(InferenceError::Model(error)));
            self.finished = true;
            return;
        }
        if let Some(message) = chunk.message {
            if !message.content.is_empty() {
                self.pending.push_back(Ok(message.content));
            }
        }
        if chunk.done {
            self.finished = true;
        }
    }
}

/// Turn raw response body chunks into content fragments.
///
/// Empty-content lines are skipped. The stream ends at `"done": true`, at the
/// end of the body, or after the first error.
pub(crate) fn decode_chat_stream(
    chunks: BoxStream<'static, Result<Vec<u8>, InferenceError>>,
) -> FragmentStream {
    let state = DecodeState {
        chunks,
        lines: LineDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.chunks.next().await {
                Some(Ok(bytes)) => {
                    for line in st.lines.push(&bytes) {
                        st.queue_line(&line);
                    }
                }
                Some(Err(e)) => {
                    st.pending.push_back(Err(e));
                    st.finished = true;
                }
                None => {
                    if let Some(line) = st.lines.finish() {
                        st.queue_line(&line);
                    }
                    st.finished = true;
                }
            }
        }
    }))
}
