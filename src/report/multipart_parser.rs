use std::collections::BTreeMap;
use std::io::Write;

use actix_multipart::Multipart;
use actix_web::HttpResponse;
use futures::StreamExt;
use sanitize_filename::sanitize;
use tempfile::NamedTempFile;

use crate::generator::form::FormFields;
use crate::ErrorResponse;

/// One uploaded image part with the caption submitted for its slot.
#[derive(Debug)]
pub struct ReportUpload {
    /// Form field name the file arrived under, e.g. `gallery_image_3`
    pub slot: String,
    pub filename: String,
    pub data: Vec<u8>,
    pub caption: String,
}

/// The decoded multipart payload of a generate request.
#[derive(Debug, Default)]
pub struct ParsedReportRequest {
    pub fields: FormFields,
    /// Gallery uploads in slot order
    pub gallery: Vec<ReportUpload>,
    /// Annexure uploads keyed by section number, each in slot order
    pub annexures: BTreeMap<u8, Vec<ReportUpload>>,
}

#[derive(Debug, thiserror::Error)]
pub enum MultipartParseError {
    #[error("Multipart field error: {0}")]
    FieldError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Invalid UTF-8 data: {0}")]
    Utf8Error(String),
    #[error("{slot} exceeds the maximum upload size of {max_mb} MB")]
    PayloadTooLarge { slot: String, max_mb: u64 },
}

impl From<MultipartParseError> for HttpResponse {
    fn from(error: MultipartParseError) -> Self {
        match error {
            MultipartParseError::PayloadTooLarge { .. } => HttpResponse::PayloadTooLarge()
                .json(ErrorResponse::new("PayloadTooLarge", &error.to_string())),
            MultipartParseError::FieldError(_) | MultipartParseError::Utf8Error(_) => {
                HttpResponse::BadRequest().json(ErrorResponse::bad_request(&error.to_string()))
            }
            MultipartParseError::IoError(_) => HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error(&error.to_string())),
        }
    }
}

/// Which report slot a multipart field name addresses.
#[derive(Debug, PartialEq, Eq)]
enum FieldKind {
    GalleryImage(u32),
    GalleryCaption(u32),
    AnnexureImage(u8, u32),
    AnnexureCaption(u8, u32),
    Text,
}

fn classify_field(name: &str) -> FieldKind {
    if let Some(rest) = name.strip_prefix("gallery_image_") {
        if let Ok(n) = rest.parse::<u32>() {
            return FieldKind::GalleryImage(n);
        }
    }
    if let Some(rest) = name.strip_prefix("gallery_caption_") {
        if let Ok(n) = rest.parse::<u32>() {
            return FieldKind::GalleryCaption(n);
        }
    }
    if let Some(rest) = name.strip_prefix("annexure") {
        if let Some((section, n)) = rest.split_once("_image_") {
            if let (Ok(section), Ok(n)) = (section.parse::<u8>(), n.parse::<u32>()) {
                return FieldKind::AnnexureImage(section, n);
            }
        }
        if let Some((section, n)) = rest.split_once("_caption_") {
            if let (Ok(section), Ok(n)) = (section.parse::<u8>(), n.parse::<u32>()) {
                return FieldKind::AnnexureCaption(section, n);
            }
        }
    }
    FieldKind::Text
}

pub struct ReportMultipartParser;

impl ReportMultipartParser {
    /// Stream the multipart payload into memory. File parts are buffered
    /// through a request-scoped temp file (dropped on every exit path) and
    /// rejected as soon as they cross `max_file_bytes`.
    pub async fn parse(
        mut multipart: Multipart,
        max_file_bytes: u64,
    ) -> Result<ParsedReportRequest, MultipartParseError> {
        let mut fields = FormFields::new();
        let mut gallery_files: BTreeMap<u32, (String, String, Vec<u8>)> = BTreeMap::new();
        let mut gallery_captions: BTreeMap<u32, String> = BTreeMap::new();
        let mut annexure_files: BTreeMap<(u8, u32), (String, String, Vec<u8>)> = BTreeMap::new();
        let mut annexure_captions: BTreeMap<(u8, u32), String> = BTreeMap::new();

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| MultipartParseError::FieldError(e.to_string()))?;
            let content_disposition = field.content_disposition().ok_or_else(|| {
                MultipartParseError::FieldError("Content disposition not found".to_string())
            })?;
            let name = content_disposition
                .get_name()
                .ok_or_else(|| MultipartParseError::FieldError("Field name not found".to_string()))?
                .to_string();
            let maybe_filename = content_disposition.get_filename().map(|s| s.to_string());

            match classify_field(&name) {
                kind @ (FieldKind::GalleryImage(_) | FieldKind::AnnexureImage(_, _)) => {
                    let filename = match maybe_filename {
                        Some(f) => sanitize(&f),
                        None => {
                            return Err(MultipartParseError::FieldError(format!(
                                "No filename in file field {}",
                                name
                            )))
                        }
                    };

                    let mut temp_file = NamedTempFile::new()
                        .map_err(|e| MultipartParseError::IoError(e.to_string()))?;
                    let mut total: u64 = 0;
                    while let Some(chunk) = field.next().await {
                        let data_chunk =
                            chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
                        total += data_chunk.len() as u64;
                        if total > max_file_bytes {
                            return Err(MultipartParseError::PayloadTooLarge {
                                slot: name,
                                max_mb: max_file_bytes / (1024 * 1024),
                            });
                        }
                        temp_file
                            .write_all(&data_chunk)
                            .map_err(|e| MultipartParseError::IoError(e.to_string()))?;
                    }
                    let data = std::fs::read(temp_file.path())
                        .map_err(|e| MultipartParseError::IoError(e.to_string()))?;

                    match kind {
                        FieldKind::GalleryImage(n) => {
                            gallery_files.insert(n, (name, filename, data));
                        }
                        FieldKind::AnnexureImage(section, n) => {
                            annexure_files.insert((section, n), (name, filename, data));
                        }
                        _ => unreachable!(),
                    }
                }
                kind => {
                    let mut buffer = Vec::new();
                    while let Some(chunk) = field.next().await {
                        let data_chunk =
                            chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
                        buffer.extend_from_slice(&data_chunk);
                    }
                    let value = String::from_utf8(buffer)
                        .map_err(|e| MultipartParseError::Utf8Error(e.to_string()))?;

                    match kind {
                        FieldKind::GalleryCaption(n) => {
                            gallery_captions.insert(n, value);
                        }
                        FieldKind::AnnexureCaption(section, n) => {
                            annexure_captions.insert((section, n), value);
                        }
                        FieldKind::Text => fields.push(name, value),
                        _ => unreachable!(),
                    }
                }
            }
        }

        let gallery = gallery_files
            .into_iter()
            .map(|(n, (slot, filename, data))| ReportUpload {
                slot,
                filename,
                data,
                caption: gallery_captions.remove(&n).unwrap_or_default(),
            })
            .collect();

        let mut annexures: BTreeMap<u8, Vec<ReportUpload>> = BTreeMap::new();
        for ((section, n), (slot, filename, data)) in annexure_files {
            annexures.entry(section).or_default().push(ReportUpload {
                slot,
                filename,
                data,
                caption: annexure_captions.remove(&(section, n)).unwrap_or_default(),
            });
        }

        Ok(ParsedReportRequest {
            fields,
            gallery,
            annexures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_are_classified() {
        assert_eq!(classify_field("gallery_image_3"), FieldKind::GalleryImage(3));
        assert_eq!(
            classify_field("gallery_caption_10"),
            FieldKind::GalleryCaption(10)
        );
        assert_eq!(
            classify_field("annexure2_image_1"),
            FieldKind::AnnexureImage(2, 1)
        );
        assert_eq!(
            classify_field("annexure5_caption_7"),
            FieldKind::AnnexureCaption(5, 7)
        );
        assert_eq!(classify_field("event_date"), FieldKind::Text);
        assert_eq!(classify_field("gallery_image_x"), FieldKind::Text);
        assert_eq!(classify_field("annexure_image_1"), FieldKind::Text);
    }
}
