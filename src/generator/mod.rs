//! Report generation: form processing, image layout and docx assembly.

pub mod docx;
pub mod form;
pub mod images;
pub mod templates;
pub mod validation;

pub use docx::{DocxRenderEngine, ReportContent};
pub use form::{FormFields, ReportForm};
pub use images::{PlacementPlan, ProcessedImage};
pub use templates::TemplateCatalog;

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while assembling a document.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("failed to read template file: {0}")]
    TemplateIo(#[source] std::io::Error),
    #[error("template is not a valid docx archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("template part {0} is not valid UTF-8")]
    PartEncoding(String),
    #[error("template is missing required part {0}")]
    MissingPart(String),
    #[error("failed to write output archive: {0}")]
    OutputIo(#[source] std::io::Error),
}

/// Result of a successful document generation.
#[derive(Debug)]
pub struct GeneratedDocument {
    pub file_id: Uuid,
    pub filename: String,
    pub bytes: Vec<u8>,
}
