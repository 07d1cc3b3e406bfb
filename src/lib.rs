use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod config;
pub mod generator;
pub mod report;
pub mod storage;

pub use crate::config::{AppConfig, AppState};

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
    /// Offending form fields, present on validation errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            details: None,
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }

    /// Validation failure listing every offending field.
    pub fn validation(errors: &crate::generator::validation::ValidationErrors) -> Self {
        let mut response = Self::new("ValidationError", &errors.to_message());
        response.details = Some(errors.field_names());
        response
    }
}

pub async fn run() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::report::handlers::health_check,
            crate::report::handlers::list_templates,
            crate::report::handlers::generate_report,
            crate::report::handlers::list_files,
            crate::report::handlers::download_report
        ),
        components(
            schemas(
                report::models::TrainingType,
                report::models::HealthResponse,
                report::models::TemplatesResponse,
                report::models::FilesResponse,
                report::handlers::GenerateReportRequest,
                generator::templates::TemplateInfo,
                storage::StoredReportInfo,
                ErrorResponse,
            )
        ),
        tags(
            (name = "Report Service", description = "Training report generation endpoints.")
        )
    )]
    struct ApiDoc;

    dotenvy::dotenv().ok(); // Load .env file
    let config = AppConfig::from_env();
    let host = config.host.clone();
    let port = config.port;

    let app_state = AppState::from_config(config);

    if let Err(e) = app_state.store.ensure_dir() {
        log::error!(
            "Failed to create output directory {}: {}",
            app_state.store.output_dir().display(),
            e
        );
        std::process::exit(1);
    }

    if app_state.config.cleanup_on_startup {
        match app_state
            .store
            .cleanup_older_than(app_state.config.auto_cleanup_hours)
        {
            Ok(removed) if removed > 0 => {
                log::info!("Startup cleanup removed {} old report(s)", removed)
            }
            Ok(_) => {}
            Err(e) => log::warn!("Startup cleanup failed: {}", e),
        }
    }

    if !app_state.config.templates_dir.is_dir() {
        log::warn!(
            "Templates directory {} does not exist; all generate requests will fail",
            app_state.config.templates_dir.display()
        );
    }

    let app_state = web::Data::new(app_state);

    let prometheus = PrometheusMetricsBuilder::new("training_report_server")
        .endpoint("/metrics")
        .build()
        .expect("Failed to create Prometheus metrics middleware");
    if let Err(e) = prometheus
        .registry
        .register(Box::new(report::handlers::REPORTS_GENERATED.clone()))
    {
        log::warn!("Failed to register report counter: {}", e);
    }

    log::info!("Starting server at http://{}:{}", host, port);

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                header::ACCEPT,
                header::CONTENT_TYPE,
                header::HeaderName::from_static("x-api-key"),
            ])
            .max_age(3600);
        for origin in &app_state.config.cors_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .route("/", web::get().to(report::handlers::index))
            .service(
                web::scope("/api")
                    .service(
                        web::resource("/health")
                            .route(web::get().to(report::handlers::health_check)),
                    )
                    .service(
                        web::resource("/templates")
                            .route(web::get().to(report::handlers::list_templates)),
                    )
                    .service(
                        web::resource("/generate")
                            .route(web::post().to(report::handlers::generate_report)),
                    )
                    .service(
                        web::resource("/files").route(web::get().to(report::handlers::list_files)),
                    )
                    .service(
                        web::resource("/download/{file_id}")
                            .route(web::get().to(report::handlers::download_report)),
                    ),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
