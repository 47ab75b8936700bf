//! Upload processing orchestrator: fit → extract → accept.
//!
//! Uses trait-based DI for the inference backend so the whole pipeline runs
//! against `MockInference` in tests. Session bookkeeping lives in the caller.

use serde::Serialize;

use super::extraction::{ExtractionClient, ExtractionError, DEFAULT_TASK_INSTRUCTION};
use super::payload::{PayloadError, PayloadFitter};
use super::upload::Image;
use crate::grid::{GridError, TableData};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Everything that can stop an upload from becoming a table.
///
/// Messages are shown to the user as-is.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Unsupported file format. Please upload PNG, JPEG, or WebP.")]
    UnsupportedFormat,

    #[error("File size exceeds {limit_mb}MB limit.")]
    FileTooLarge { size: usize, limit_mb: usize },

    #[error("Image compression failed: {0}")]
    Compression(#[from] PayloadError),

    #[error("{0}")]
    Extraction(#[from] ExtractionError),

    #[error("The AI could not detect any tabular data.")]
    NoDataDetected,
}

impl PipelineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::Compression(_) => "COMPRESSION_FAILED",
            Self::Extraction(_) => "EXTRACTION_FAILED",
            Self::NoDataDetected => "NO_DATA_DETECTED",
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A table known to contain at least one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtractedTable(TableData);

impl ExtractedTable {
    /// `None` for a table without rows.
    pub fn new(table: TableData) -> Option<Self> {
        (!table.is_empty()).then_some(Self(table))
    }

    pub fn table(&self) -> &TableData {
        &self.0
    }

    pub fn into_inner(self) -> TableData {
        self.0
    }

    /// Cell edits never remove rows, so the result stays non-empty.
    pub fn set_cell(&self, row: usize, col: usize, value: impl Into<String>) -> Result<Self, GridError> {
        self.0.set_cell(row, col, value).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives one upload through payload fitting and table extraction.
#[derive(Clone)]
pub struct UploadPipeline {
    fitter: PayloadFitter,
    client: ExtractionClient,
    instructions: String,
}

impl UploadPipeline {
    pub fn new(fitter: PayloadFitter, client: ExtractionClient) -> Self {
        Self {
            fitter,
            client,
            instructions: DEFAULT_TASK_INSTRUCTION.to_string(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Process a validated image into a non-empty table.
    ///
    /// Compression runs on the blocking pool. Progress messages are
    /// forwarded from the extraction client in order.
    pub async fn process<F>(&self, image: Image, mut on_progress: F) -> Result<ExtractedTable, PipelineError>
    where
        F: FnMut(&str) + Send,
    {
        on_progress("Optimizing image...");

        let fitter = self.fitter.clone();
        let payload = tokio::task::spawn_blocking(move || fitter.fit(image))
            .await
            .map_err(|e| PayloadError::Encode(format!("compression task failed: {e}")))??;

        tracing::debug!(
            encoded_len = payload.encoded_len(),
            quality = ?payload.quality(),
            "Payload ready"
        );

        let table = self
            .client
            .extract(&payload, &self.instructions, &mut on_progress)
            .await?;

        ExtractedTable::new(table).ok_or_else(|| {
            tracing::info!("Extraction returned an empty table");
            PipelineError::NoDataDetected
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
