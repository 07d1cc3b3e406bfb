mod common;

use actix_web::{http::StatusCode, test, web, App};
use serde_json::Value;

use training_report_server::auth::keys::ApiKeySet;
use training_report_server::report::handlers;
use training_report_server::{AppConfig, AppState, ErrorResponse};

use common::{docx_with_body, paragraph, tiny_png};

const BOUNDARY: &str = "----report-test-boundary";

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new().app_data(web::Data::new($state)).service(
                web::scope("/api")
                    .service(web::resource("/health").route(web::get().to(handlers::health_check)))
                    .service(
                        web::resource("/templates").route(web::get().to(handlers::list_templates)),
                    )
                    .service(
                        web::resource("/generate").route(web::post().to(handlers::generate_report)),
                    )
                    .service(web::resource("/files").route(web::get().to(handlers::list_files)))
                    .service(
                        web::resource("/download/{file_id}")
                            .route(web::get().to(handlers::download_report)),
                    ),
            ),
        )
        .await
    };
}

struct TestEnv {
    _templates: tempfile::TempDir,
    _output: tempfile::TempDir,
    config: AppConfig,
}

fn test_env() -> TestEnv {
    let templates = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let mut config = AppConfig::from_env();
    config.templates_dir = templates.path().to_path_buf();
    config.output_dir = output.path().to_path_buf();
    config.require_api_key = true;
    TestEnv {
        _templates: templates,
        _output: output,
        config,
    }
}

fn write_template(env: &TestEnv, name: &str, body: &str) {
    std::fs::write(env.config.templates_dir.join(name), docx_with_body(body)).unwrap();
}

fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (name, filename, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn valid_fields<'a>() -> Vec<(&'a str, &'a str)> {
    vec![
        ("training_type", "type_a"),
        ("template_id", "1"),
        ("event_date", "2026-03-14"),
        ("cell_name", "Solar Cell"),
        ("venue", "District Hall"),
    ]
}

#[actix_web::test]
async fn health_endpoint_reports_healthy() {
    let env = test_env();
    let app = init_app!(AppState::with_keys(env.config.clone(), ApiKeySet::empty()));

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn templates_endpoint_lists_the_full_catalog() {
    let env = test_env();
    write_template(&env, "type_a_template_1.docx", &paragraph("x"));
    let app = init_app!(AppState::with_keys(env.config.clone(), ApiKeySet::empty()));

    let req = test::TestRequest::get().uri("/api/templates").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    let templates = body["templates"].as_array().unwrap();
    assert_eq!(templates.len(), 20);
    let first = &templates[0];
    assert_eq!(first["training_type"], "type_a");
    assert_eq!(first["template_id"], 1);
    assert_eq!(first["exists"], true);
    assert_eq!(templates[1]["exists"], false);
}

#[actix_web::test]
async fn generate_without_key_is_unauthorized_when_keys_configured() {
    let env = test_env();
    let app = init_app!(AppState::with_keys(
        env.config.clone(),
        ApiKeySet::from_keys(["secret-key"])
    ));

    let req = test::TestRequest::post().uri("/api/generate").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn generate_with_wrong_key_is_unauthorized() {
    let env = test_env();
    let app = init_app!(AppState::with_keys(
        env.config.clone(),
        ApiKeySet::from_keys(["secret-key"])
    ));

    let req = test::TestRequest::post()
        .uri("/api/generate")
        .insert_header(("x-api-key", "not-the-key"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn generate_with_zero_keys_bypasses_authentication() {
    let env = test_env();
    write_template(
        &env,
        "type_a_template_1.docx",
        &paragraph("Cell: {{CELL_NAME}}"),
    );
    let app = init_app!(AppState::with_keys(env.config.clone(), ApiKeySet::empty()));

    let body = multipart_body(&valid_fields(), &[]);
    let req = test::TestRequest::post()
        .uri("/api/generate")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn generate_produces_a_filled_document() {
    let env = test_env();
    write_template(
        &env,
        "type_a_template_1.docx",
        &format!(
            "{}{}",
            paragraph("Cell: {{CELL_NAME}}"),
            paragraph("{{GALLERY_TABLE}}")
        ),
    );
    let app = init_app!(AppState::with_keys(
        env.config.clone(),
        ApiKeySet::from_keys(["secret-key"])
    ));

    let body = multipart_body(
        &{
            let mut fields = valid_fields();
            fields.push(("gallery_caption_1", "Opening ceremony"));
            fields
        },
        &[("gallery_image_1", "photo.png", tiny_png())],
    );
    let req = test::TestRequest::post()
        .uri("/api/generate")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .insert_header(("x-api-key", "secret-key"))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let file_id = resp
        .headers()
        .get("x-file-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .expect("x-file-id header");
    let disposition = resp
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(disposition.contains("TYPE_A_20260314_Solar_Cell_report.docx"));

    let docx = test::read_body(resp).await;
    let document = common::read_part(&docx, "word/document.xml").unwrap();
    assert!(document.contains("Cell: Solar Cell"));
    assert!(document.contains("Opening ceremony"));
    assert!(common::part_names(&docx).contains(&"word/media/image1.jpeg".to_string()));

    // The retained copy is listed and downloadable under the same id.
    let req = test::TestRequest::get()
        .uri("/api/files")
        .insert_header(("x-api-key", "secret-key"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let listing: Value = test::read_body_json(resp).await;
    assert_eq!(listing["total_files"], 1);
    assert_eq!(listing["files"][0]["file_id"], file_id.as_str());

    let req = test::TestRequest::get()
        .uri(&format!("/api/download/{}", file_id))
        .insert_header(("x-api-key", "secret-key"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn generate_missing_event_date_lists_the_field() {
    let env = test_env();
    let app = init_app!(AppState::with_keys(env.config.clone(), ApiKeySet::empty()));

    let body = multipart_body(
        &[("training_type", "type_a"), ("template_id", "1")],
        &[],
    );
    let req = test::TestRequest::post()
        .uri("/api/generate")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(error.error, "ValidationError");
    let details = error.details.expect("validation details");
    assert!(details.contains(&"event_date".to_string()));
    assert!(details.contains(&"cell_name".to_string()));
    assert!(details.contains(&"venue".to_string()));
}

#[actix_web::test]
async fn generate_for_absent_template_file_is_not_found() {
    let env = test_env();
    let app = init_app!(AppState::with_keys(env.config.clone(), ApiKeySet::empty()));

    let body = multipart_body(&valid_fields(), &[]);
    let req = test::TestRequest::post()
        .uri("/api/generate")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn generate_rejects_executable_upload() {
    let env = test_env();
    write_template(&env, "type_a_template_1.docx", &paragraph("x"));
    let app = init_app!(AppState::with_keys(env.config.clone(), ApiKeySet::empty()));

    let body = multipart_body(
        &valid_fields(),
        &[("gallery_image_1", "malware.exe", tiny_png())],
    );
    let req = test::TestRequest::post()
        .uri("/api/generate")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = test::read_body_json(resp).await;
    assert!(error.message.contains("gallery_image_1"));
}

#[actix_web::test]
async fn oversize_upload_is_payload_too_large() {
    let mut env = test_env();
    env.config.max_file_size_mb = 0;
    write_template(&env, "type_a_template_1.docx", &paragraph("x"));
    let app = init_app!(AppState::with_keys(env.config.clone(), ApiKeySet::empty()));

    let body = multipart_body(
        &valid_fields(),
        &[("gallery_image_1", "photo.png", tiny_png())],
    );
    let req = test::TestRequest::post()
        .uri("/api/generate")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[actix_web::test]
async fn download_with_malformed_id_is_bad_request() {
    let env = test_env();
    let app = init_app!(AppState::with_keys(env.config.clone(), ApiKeySet::empty()));

    let req = test::TestRequest::get()
        .uri("/api/download/not-a-uuid")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn download_unknown_id_is_not_found() {
    let env = test_env();
    let app = init_app!(AppState::with_keys(env.config.clone(), ApiKeySet::empty()));

    let req = test::TestRequest::get()
        .uri(&format!("/api/download/{}", uuid::Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn files_listing_requires_key_when_configured() {
    let env = test_env();
    let app = init_app!(AppState::with_keys(
        env.config.clone(),
        ApiKeySet::from_keys(["secret-key"])
    ));

    let req = test::TestRequest::get().uri("/api/files").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
