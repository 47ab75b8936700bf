//! Upload validation: media type allow-list and raw size cap.
//!
//! Runs before any decoding. A rejected file never reaches the payload fitter.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::PipelineError;
use crate::config;

/// Image media types accepted at upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/webp")]
    Webp,
}

impl MediaType {
    pub fn as_mime(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    /// Parse a MIME string. Parameters (`; charset=...`) and case are ignored.
    /// `image/jpg` is accepted as an alias some browsers send.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Guess from a file name extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        mime_guess::from_path(name)
            .iter()
            .find_map(|m| Self::from_mime(m.essence_str()))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// An uploaded image. Immutable once read.
#[derive(Clone)]
pub struct Image {
    bytes: Vec<u8>,
    media_type: MediaType,
}

impl Image {
    pub fn new(bytes: Vec<u8>, media_type: MediaType) -> Self {
        Self { bytes, media_type }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Upload acceptance rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    pub supported_formats: Vec<MediaType>,
    pub max_file_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            supported_formats: config::SUPPORTED_FORMATS.to_vec(),
            max_file_bytes: config::MAX_FILE_SIZE_MB * 1024 * 1024,
        }
    }
}

/// Check an incoming file against the allow-list and size cap.
///
/// The declared content type wins when it names a concrete type. A missing or
/// generic declaration (`application/octet-stream`) falls back to the file
/// name extension.
pub fn validate_upload(
    bytes: Vec<u8>,
    declared_type: Option<&str>,
    file_name: Option<&str>,
    limits: &UploadLimits,
) -> Result<Image, PipelineError> {
    let media_type = resolve_media_type(declared_type, file_name)
        .filter(|m| limits.supported_formats.contains(m))
        .ok_or(PipelineError::UnsupportedFormat)?;

    if bytes.len() > limits.max_file_bytes {
        return Err(PipelineError::FileTooLarge {
            size: bytes.len(),
            limit_mb: limits.max_file_bytes / (1024 * 1024),
        });
    }

    tracing::debug!(media_type = %media_type, size = bytes.len(), "Upload accepted");
    Ok(Image::new(bytes, media_type))
}

fn resolve_media_type(declared_type: Option<&str>, file_name: Option<&str>) -> Option<MediaType> {
    match declared_type.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) if t.starts_with("image/") => MediaType::from_mime(t),
        _ => file_name.and_then(MediaType::from_file_name),
    }
}
