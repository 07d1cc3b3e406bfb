//! Upload validation, image normalization and grid placement.
//!
//! Every accepted image is re-encoded to RGB JPEG so the assembled document
//! carries one media format regardless of what was uploaded. Placement is a
//! pure function of ordinal and grid capacity.

use std::path::Path;

use actix_web::HttpResponse;
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

use crate::ErrorResponse;

/// Gallery grid geometry: 2 columns by 3 rows, 6 images per page.
pub const GALLERY_COLUMNS: usize = 2;
pub const GALLERY_ROWS_PER_PAGE: usize = 3;
pub const GALLERY_IMAGES_PER_PAGE: usize = GALLERY_COLUMNS * GALLERY_ROWS_PER_PAGE;

const JPEG_QUALITY: u8 = 85;
const MAX_DIMENSION: u32 = 2400;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("{slot}: unsupported image extension '{ext}'")]
    UnsupportedExtension { slot: String, ext: String },
    #[error("{slot}: file exceeds the {max_mb} MB upload limit")]
    TooLarge { slot: String, max_mb: u64 },
    #[error("{slot}: could not decode image data: {reason}")]
    Undecodable { slot: String, reason: String },
    #[error("{slot}: failed to re-encode image: {reason}")]
    Encode { slot: String, reason: String },
}

impl From<ImageError> for HttpResponse {
    fn from(error: ImageError) -> Self {
        match &error {
            ImageError::TooLarge { .. } => {
                HttpResponse::PayloadTooLarge().json(ErrorResponse::new(
                    "PayloadTooLarge",
                    &error.to_string(),
                ))
            }
            ImageError::UnsupportedExtension { .. } | ImageError::Undecodable { .. } => {
                HttpResponse::BadRequest().json(ErrorResponse::bad_request(&error.to_string()))
            }
            ImageError::Encode { .. } => {
                log::error!("Image re-encode failed: {}", error);
                HttpResponse::InternalServerError()
                    .json(ErrorResponse::internal_error("Failed to process image"))
            }
        }
    }
}

/// An image that passed validation, normalized to JPEG.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub data: Vec<u8>,
    pub caption: String,
}

fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Validate one upload against the extension allow-list and size limit,
/// then decode and normalize it. `slot` names the upload field (for
/// example `gallery_image_3`) so rejections identify the offending part.
pub fn process_upload(
    slot: &str,
    filename: &str,
    data: &[u8],
    caption: &str,
    allowed_extensions: &[String],
    max_bytes: u64,
) -> Result<ProcessedImage, ImageError> {
    let ext = extension_of(filename);
    if !allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)) {
        return Err(ImageError::UnsupportedExtension {
            slot: slot.to_string(),
            ext,
        });
    }

    if data.len() as u64 > max_bytes {
        return Err(ImageError::TooLarge {
            slot: slot.to_string(),
            max_mb: max_bytes / (1024 * 1024),
        });
    }

    let decoded = image::load_from_memory(data).map_err(|e| ImageError::Undecodable {
        slot: slot.to_string(),
        reason: e.to_string(),
    })?;

    // Bound dimensions so a huge photo does not balloon the document.
    let decoded = if decoded.width() > MAX_DIMENSION || decoded.height() > MAX_DIMENSION {
        decoded.thumbnail(MAX_DIMENSION, MAX_DIMENSION)
    } else {
        decoded
    };

    let rgb = decoded.to_rgb8();
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| ImageError::Encode {
            slot: slot.to_string(),
            reason: e.to_string(),
        })?;

    Ok(ProcessedImage {
        data: buffer,
        caption: caption.to_string(),
    })
}

/// One image's target location. Pages, rows and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSlot {
    pub page: usize,
    pub row: usize,
    pub col: usize,
}

impl GridSlot {
    /// Position within the page, 1-based, row-major.
    pub fn cell_index(&self) -> usize {
        (self.row - 1) * GALLERY_COLUMNS + self.col
    }
}

/// Deterministic mapping from image ordinal to page/grid position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementPlan {
    slots: Vec<GridSlot>,
}

impl PlacementPlan {
    /// Gallery layout: images fill a 2x3 grid per page in submission
    /// order, overflowing onto further pages.
    pub fn for_gallery(count: usize) -> Self {
        let slots = (0..count)
            .map(|ordinal| {
                let page = ordinal / GALLERY_IMAGES_PER_PAGE;
                let within = ordinal % GALLERY_IMAGES_PER_PAGE;
                GridSlot {
                    page: page + 1,
                    row: within / GALLERY_COLUMNS + 1,
                    col: within % GALLERY_COLUMNS + 1,
                }
            })
            .collect();
        Self { slots }
    }

    /// Annexure layout: one full-page image per page, in order.
    pub fn for_annexure(count: usize) -> Self {
        let slots = (0..count)
            .map(|ordinal| GridSlot {
                page: ordinal + 1,
                row: 1,
                col: 1,
            })
            .collect();
        Self { slots }
    }

    pub fn slots(&self) -> &[GridSlot] {
        &self.slots
    }

    pub fn page_count(&self) -> usize {
        self.slots.iter().map(|s| s.page).max().unwrap_or(0)
    }

    /// Ordinals (0-based) of the images on the given 1-based page.
    pub fn ordinals_on_page(&self, page: usize) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.page == page)
            .map(|(i, _)| i)
            .collect()
    }
}
