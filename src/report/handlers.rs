use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{
    web::{self, Path},
    HttpRequest, HttpResponse, Responder,
};
use lazy_static::lazy_static;
use log::{error, info, warn};
use prometheus::IntCounter;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::middleware::require_api_key;
use crate::config::AppState;
use crate::generator::docx::{DocxRenderEngine, ReportContent};
use crate::generator::form::ReportForm;
use crate::generator::images::{process_upload, ProcessedImage};
use crate::generator::validation::{ValidationError, ValidationErrors};
use crate::report::models::{FilesResponse, HealthResponse, TemplatesResponse};
use crate::report::multipart_parser::{ParsedReportRequest, ReportMultipartParser};
use crate::ErrorResponse;

const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

lazy_static! {
    pub static ref REPORTS_GENERATED: IntCounter = IntCounter::new(
        "reports_generated_total",
        "Total number of reports generated"
    )
    .expect("reports_generated_total counter can be created");
}

/// Multipart form for the generate endpoint. Image parts follow the
/// `gallery_image_<n>` / `annexure<k>_image_<n>` naming convention with
/// matching `..._caption_<n>` text fields.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateReportRequest {
    #[schema(example = "type_a")]
    pub training_type: String,
    #[schema(example = 1)]
    pub template_id: u8,
    #[schema(example = "2026-03-14")]
    pub event_date: String,
    #[schema(example = "Solar Cell")]
    pub cell_name: String,
    #[schema(example = "District Hall")]
    pub venue: String,
    #[schema(value_type = Option<String>, format = Binary)]
    pub gallery_image_1: Option<String>,
    #[schema(example = "Opening ceremony")]
    pub gallery_caption_1: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub annexure1_image_1: Option<String>,
}

/// Root endpoint with service information.
pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "Training Report Generator API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/api/health",
            "templates": "/api/templates",
            "generate": "/api/generate (POST)",
            "files": "/api/files",
            "download": "/api/download/{file_id}"
        }
    }))
}

#[utoipa::path(
    context_path = "/api",
    tag = "Report Service",
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        service: "Training Report Generator API".to_string(),
    })
}

#[utoipa::path(
    context_path = "/api",
    tag = "Report Service",
    get,
    path = "/templates",
    responses(
        (status = 200, description = "Available templates", body = TemplatesResponse)
    )
)]
pub async fn list_templates(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(TemplatesResponse {
        status: "success".to_string(),
        templates: data.catalog.list(),
    })
}

/// Check the upload counts against the configured limits.
fn validate_upload_counts(
    parsed: &ParsedReportRequest,
    state: &AppState,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if parsed.gallery.len() > state.config.max_gallery_images {
        errors.add(ValidationError::new(
            "gallery_images",
            format!(
                "{} gallery images submitted, at most {} are allowed",
                parsed.gallery.len(),
                state.config.max_gallery_images
            ),
        ));
    }

    for (&section, uploads) in &parsed.annexures {
        if section == 0 || usize::from(section) > state.config.max_annexure_sections {
            errors.add(ValidationError::new(
                format!("annexure{}", section),
                format!(
                    "annexure section {} is out of range, expected 1-{}",
                    section, state.config.max_annexure_sections
                ),
            ));
        } else if uploads.len() > state.config.max_images_per_annexure {
            errors.add(ValidationError::new(
                format!("annexure{}", section),
                format!(
                    "{} images submitted for annexure {}, at most {} are allowed",
                    uploads.len(),
                    section,
                    state.config.max_images_per_annexure
                ),
            ));
        }
    }

    errors.into_result()
}

#[utoipa::path(
    context_path = "/api",
    tag = "Report Service",
    post,
    path = "/generate",
    request_body(content = inline(GenerateReportRequest), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Generated .docx report stream"),
        (status = 400, description = "Invalid form data", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 413, description = "Upload too large", body = ErrorResponse),
        (status = 500, description = "Generation failed", body = ErrorResponse)
    )
)]
pub async fn generate_report(
    req: HttpRequest,
    payload: Multipart,
    data: web::Data<AppState>,
) -> impl Responder {
    if data.config.require_api_key {
        if let Err(resp) = require_api_key(&req, &data.api_keys) {
            return resp;
        }
    }

    info!("Report generation request received");

    let parsed = match ReportMultipartParser::parse(payload, data.config.max_file_size_bytes()).await
    {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Rejected multipart payload: {}", e);
            return e.into();
        }
    };

    let form = match ReportForm::from_fields(&parsed.fields) {
        Ok(form) => form,
        Err(errors) => {
            warn!("{}", errors);
            return HttpResponse::BadRequest().json(ErrorResponse::validation(&errors));
        }
    };

    if let Err(errors) = validate_upload_counts(&parsed, &data) {
        warn!("{}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse::validation(&errors));
    }

    let template_path = match data.catalog.resolve(form.training_type, form.template_id) {
        Some(path) => path,
        None => {
            return HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
                "No template {} for training type {}",
                form.template_id, form.training_type
            )))
        }
    };

    let template_bytes = match std::fs::read(&template_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Template file missing: {}", template_path.display());
            return HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
                "Template file not found for {} template {}",
                form.training_type, form.template_id
            )));
        }
        Err(e) => {
            error!("Failed to read template {}: {}", template_path.display(), e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to load template"));
        }
    };
    info!("Loaded template: {}", template_path.display());

    let mut gallery = Vec::with_capacity(parsed.gallery.len());
    for upload in &parsed.gallery {
        match process_upload(
            &upload.slot,
            &upload.filename,
            &upload.data,
            &upload.caption,
            &data.config.allowed_extensions,
            data.config.max_file_size_bytes(),
        ) {
            Ok(image) => gallery.push(image),
            Err(e) => {
                warn!("Rejected upload: {}", e);
                return e.into();
            }
        }
    }

    let mut annexures: Vec<Vec<ProcessedImage>> =
        vec![Vec::new(); data.config.max_annexure_sections];
    for (&section, uploads) in &parsed.annexures {
        for upload in uploads {
            match process_upload(
                &upload.slot,
                &upload.filename,
                &upload.data,
                &upload.caption,
                &data.config.allowed_extensions,
                data.config.max_file_size_bytes(),
            ) {
                Ok(image) => annexures[usize::from(section) - 1].push(image),
                Err(e) => {
                    warn!("Rejected upload: {}", e);
                    return e.into();
                }
            }
        }
    }

    info!(
        "Assembling report with {} text replacements, {} gallery images, {} annexure images",
        form.replacements.len(),
        gallery.len(),
        annexures.iter().map(Vec::len).sum::<usize>()
    );

    let content = ReportContent {
        replacements: form.replacements.clone(),
        gallery,
        annexures,
    };

    let rendered =
        web::block(move || DocxRenderEngine::render(&template_bytes, &content)).await;
    let bytes = match rendered {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            error!("Document assembly failed: {}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to generate report"));
        }
        Err(e) => {
            error!("Document assembly task failed: {}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to generate report"));
        }
    };

    let file_id = Uuid::new_v4();
    let filename = form.output_filename();
    if let Err(e) = data
        .store
        .ensure_dir()
        .and_then(|_| data.store.save(&file_id, &filename, &bytes).map(|_| ()))
    {
        error!("Failed to retain generated report: {}", e);
        return HttpResponse::InternalServerError()
            .json(ErrorResponse::internal_error("Failed to store report"));
    }

    REPORTS_GENERATED.inc();
    info!(
        "Report generated successfully: {} ({} bytes, file_id {})",
        filename,
        bytes.len(),
        file_id
    );

    HttpResponse::Ok()
        .content_type(DOCX_CONTENT_TYPE)
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ))
        .insert_header(("x-file-id", file_id.to_string()))
        .body(bytes)
}

#[utoipa::path(
    context_path = "/api",
    tag = "Report Service",
    get,
    path = "/files",
    responses(
        (status = 200, description = "Retained reports", body = FilesResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse)
    )
)]
pub async fn list_files(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    if data.config.require_api_key {
        if let Err(resp) = require_api_key(&req, &data.api_keys) {
            return resp;
        }
    }

    if let Err(e) = data.store.ensure_dir() {
        error!("Failed to access output directory: {}", e);
        return HttpResponse::InternalServerError()
            .json(ErrorResponse::internal_error("Failed to list files"));
    }

    match data.store.list() {
        Ok(files) => HttpResponse::Ok().json(FilesResponse {
            status: "success".to_string(),
            total_files: files.len(),
            files,
        }),
        Err(e) => {
            error!("Failed to list output directory: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to list files"))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Report Service",
    get,
    path = "/download/{file_id}",
    params(
        ("file_id" = String, Path, description = "ID returned when the report was generated")
    ),
    responses(
        (status = 200, description = "The report file stream"),
        (status = 400, description = "Malformed file id", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 404, description = "No report with that id", body = ErrorResponse)
    )
)]
pub async fn download_report(
    req: HttpRequest,
    file_id: Path<String>,
    data: web::Data<AppState>,
) -> HttpResponse {
    if data.config.require_api_key {
        if let Err(resp) = require_api_key(&req, &data.api_keys) {
            return resp;
        }
    }

    let file_id = file_id.into_inner();
    if Uuid::parse_str(&file_id).is_err() {
        return HttpResponse::BadRequest()
            .json(ErrorResponse::bad_request("Invalid file ID format"));
    }

    let report = match data.store.find(&file_id) {
        Ok(Some(report)) => report,
        Ok(None) => {
            warn!("No retained report for file_id {}", file_id);
            return HttpResponse::NotFound()
                .json(ErrorResponse::not_found("File not found or expired"));
        }
        Err(e) => {
            error!("Failed to search output directory: {}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to access files"));
        }
    };

    info!(
        "Serving report {} for file_id {}",
        report.original_filename, file_id
    );

    match NamedFile::open(&report.path) {
        Ok(file) => {
            let disposition = header::ContentDisposition {
                disposition: header::DispositionType::Attachment,
                parameters: vec![header::DispositionParam::Filename(
                    report.original_filename.clone(),
                )],
            };
            file.set_content_disposition(disposition).into_response(&req)
        }
        Err(e) => {
            error!("Failed to open {}: {}", report.path.display(), e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to read file"))
        }
    }
}
