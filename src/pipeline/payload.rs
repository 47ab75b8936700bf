//! Payload fitting: shrink an upload until its base-64 text fits the budget.
//!
//! Resolution is never reduced. Only encoder quality moves, along a fixed
//! ladder that ends at the readability floor.

use std::fmt;

use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use thiserror::Error;

use super::upload::{Image, MediaType};
use crate::config;

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Could not decode image for compression: {0}")]
    Decode(String),

    #[error("Could not re-encode image: {0}")]
    Encode(String),
}

/// Base-64 text of an image, ready for the inference request.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    data: String,
    media_type: MediaType,
    /// JPEG quality used, or `None` when the original bytes were kept.
    quality: Option<u8>,
}

impl EncodedPayload {
    pub fn new(data: String, media_type: MediaType, quality: Option<u8>) -> Self {
        Self {
            data,
            media_type,
            quality,
        }
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn quality(&self) -> Option<u8> {
        self.quality
    }

    /// Length in characters; the proxy for transmitted bytes.
    pub fn encoded_len(&self) -> usize {
        self.data.len()
    }

    pub fn fits(&self, budget: usize) -> bool {
        self.encoded_len() <= budget
    }

    pub fn was_recompressed(&self) -> bool {
        self.quality.is_some()
    }
}

impl fmt::Debug for EncodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedPayload")
            .field("media_type", &self.media_type)
            .field("encoded_len", &self.data.len())
            .field("quality", &self.quality)
            .finish()
    }
}

/// Fits images into a payload budget by stepping JPEG quality down.
#[derive(Debug, Clone)]
pub struct PayloadFitter {
    budget: usize,
    quality_ladder: Vec<u8>,
}

impl Default for PayloadFitter {
    fn default() -> Self {
        Self::new(config::API_PAYLOAD_LIMIT_BYTES)
    }
}

impl PayloadFitter {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            quality_ladder: config::QUALITY_LADDER.to_vec(),
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Encode `image`, recompressing only if the original does not fit.
    ///
    /// At the quality floor the last encoding is returned even when it is
    /// still over budget; the caller decides whether to send it.
    pub fn fit(&self, image: Image) -> Result<EncodedPayload, PayloadError> {
        let _span = tracing::info_span!(
            "payload_fit",
            media_type = %image.media_type(),
            raw_size = image.len(),
            budget = self.budget,
        )
        .entered();

        let original = base64::engine::general_purpose::STANDARD.encode(image.bytes());
        if original.len() <= self.budget {
            tracing::debug!(encoded_len = original.len(), "Original image fits budget");
            return Ok(EncodedPayload::new(original, image.media_type(), None));
        }
        drop(original);

        tracing::info!("Image over payload budget, compressing");

        let decoded = image::load_from_memory(image.bytes())
            .map_err(|e| PayloadError::Decode(e.to_string()))?;
        drop(image);
        let surface = DynamicImage::ImageRgb8(decoded.to_rgb8());
        drop(decoded);

        let mut last: Option<EncodedPayload> = None;
        for &quality in &self.quality_ladder {
            let jpeg = encode_jpeg(&surface, quality)?;
            let payload = EncodedPayload::new(
                base64::engine::general_purpose::STANDARD.encode(&jpeg),
                MediaType::Jpeg,
                Some(quality),
            );
            let fits = payload.fits(self.budget);
            tracing::debug!(quality, encoded_len = payload.encoded_len(), fits, "JPEG attempt");
            last = Some(payload);
            if fits {
                break;
            }
        }

        let payload = last.ok_or_else(|| PayloadError::Encode("empty quality ladder".into()))?;
        if !payload.fits(self.budget) {
            tracing::warn!(
                encoded_len = payload.encoded_len(),
                budget = self.budget,
                "Payload still over budget at quality floor"
            );
        }
        Ok(payload)
    }
}

/// Encode a full-resolution surface as JPEG at the given quality (1-100).
pub fn encode_jpeg(surface: &DynamicImage, quality: u8) -> Result<Vec<u8>, PayloadError> {
    let mut out = Vec::new();
    surface
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
        .map_err(|e| PayloadError::Encode(format!("JPEG encoding failed: {e}")))?;
    Ok(out)
}
