//! Shared types for the session API layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pipeline::{UploadLimits, UploadPipeline};
use crate::session::SessionStore;

/// Room for multipart boundaries and part headers on top of the file itself.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and the background extraction task.
#[derive(Clone)]
pub struct ApiContext {
    pub session: Arc<SessionStore>,
    pub pipeline: Arc<UploadPipeline>,
    pub limits: Arc<UploadLimits>,
}

impl ApiContext {
    pub fn new(pipeline: UploadPipeline, limits: UploadLimits) -> Self {
        Self {
            session: Arc::new(SessionStore::new()),
            pipeline: Arc::new(pipeline),
            limits: Arc::new(limits),
        }
    }

    /// Request body cap: the file limit plus multipart framing.
    pub fn body_limit(&self) -> usize {
        self.limits.max_file_bytes + MULTIPART_OVERHEAD_BYTES
    }

    pub fn max_file_mb(&self) -> usize {
        self.limits.max_file_bytes / (1024 * 1024)
    }
}

// ═══════════════════════════════════════════════════════════
// Request / response bodies
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellEdit {
    pub row: usize,
    pub col: usize,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub app: &'static str,
    pub version: &'static str,
    pub session: &'static str,
}
