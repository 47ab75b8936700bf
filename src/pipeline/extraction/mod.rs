pub mod types;
pub mod prompt;
pub mod parser;
pub mod ollama;
pub mod ollama_types;

pub use types::*;
pub use prompt::*;
pub use parser::*;
pub use ollama::OllamaInference;
pub use ollama_types::InferenceError;

use std::sync::Arc;

use futures_util::StreamExt;
use thiserror::Error;
use tracing::Instrument;

use crate::grid::TableData;
use crate::pipeline::payload::EncodedPayload;

/// Emit a streaming progress message every this many fragments.
const PROGRESS_EVERY_FRAGMENTS: usize = 3;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("No data returned from the model.")]
    NoData,

    #[error("Could not parse table data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    Inference(#[from] InferenceError),
}

/// Turns an encoded image into a table through a streaming inference backend.
#[derive(Clone)]
pub struct ExtractionClient {
    backend: Arc<dyn InferenceBackend>,
}

impl ExtractionClient {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }

    /// Run one extraction.
    ///
    /// `on_progress` is called before the stream opens, after every third
    /// fragment, and once the stream is exhausted. Calls happen in stream
    /// order on the calling task. The exact cadence is informational only.
    pub async fn extract<F>(
        &self,
        payload: &EncodedPayload,
        instructions: &str,
        mut on_progress: F,
    ) -> Result<TableData, ExtractionError>
    where
        F: FnMut(&str) + Send,
    {
        let span = tracing::info_span!(
            "table_extract",
            backend = %self.backend.name(),
            media_type = %payload.media_type(),
            encoded_len = payload.encoded_len(),
        );
        self.run(payload, instructions, &mut on_progress)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        payload: &EncodedPayload,
        instructions: &str,
        on_progress: &mut (dyn FnMut(&str) + Send),
    ) -> Result<TableData, ExtractionError> {
        let start = std::time::Instant::now();

        on_progress("Initializing AI model...");

        let request = InferenceRequest {
            image_base64: payload.data().to_string(),
            media_type: payload.media_type(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            task_instruction: instructions.to_string(),
            response_schema: table_response_schema(),
            temperature: EXTRACTION_TEMPERATURE,
        };

        let mut fragments = self.backend.stream_table(request);
        let mut buffer = String::new();
        let mut fragment_count = 0usize;

        while let Some(fragment) = fragments.next().await {
            let text = fragment.map_err(|e| {
                tracing::warn!(error = %e, fragment_count, "Inference stream failed");
                e
            })?;
            fragment_count += 1;
            buffer.push_str(&text);
            if fragment_count % PROGRESS_EVERY_FRAGMENTS == 0 {
                on_progress(&format!("Receiving data stream (chunk {fragment_count})..."));
            }
        }

        on_progress("Finalizing structure...");

        if buffer.trim().is_empty() {
            tracing::warn!(fragment_count, "Model returned no text");
            return Err(ExtractionError::NoData);
        }

        let table = parse_table_response(&buffer).map_err(|e| {
            tracing::warn!(error = %e, response_len = buffer.len(), "Table response did not parse");
            e
        })?;

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            fragment_count,
            rows = table.row_count(),
            columns = table.column_count(),
            "Table extraction complete"
        );
        Ok(table)
    }
}
