pub mod upload;
pub mod payload;
pub mod extraction;
pub mod processor; // Upload → payload → table orchestrator

pub use upload::{validate_upload, Image, MediaType, UploadLimits};
pub use payload::{EncodedPayload, PayloadError, PayloadFitter};
pub use extraction::{ExtractionClient, ExtractionError, InferenceBackend, InferenceError};
pub use processor::{ExtractedTable, PipelineError, UploadPipeline};
