//! Environment-backed configuration and shared application state.
//!
//! All tunables are read once at startup into an `AppConfig` value and
//! injected into handlers through `web::Data<AppState>`. Nothing here is
//! process-global or mutable after construction.

use std::env;
use std::path::PathBuf;

use crate::auth::keys::ApiKeySet;
use crate::generator::templates::TemplateCatalog;
use crate::storage::ReportStore;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(default)
}

fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub api_keys_file: PathBuf,
    pub api_keys_env_var: String,
    pub require_api_key: bool,
    pub max_file_size_mb: u64,
    pub allowed_extensions: Vec<String>,
    pub max_gallery_images: usize,
    pub max_annexure_sections: usize,
    pub max_images_per_annexure: usize,
    pub templates_dir: PathBuf,
    pub output_dir: PathBuf,
    pub auto_cleanup_hours: u64,
    pub cleanup_on_startup: bool,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("API_HOST", "0.0.0.0"),
            port: env_parse("API_PORT", 8080),
            api_keys_file: PathBuf::from(env_or("API_KEYS_FILE", "api_keys.json")),
            api_keys_env_var: env_or("API_KEYS_VAR", "API_KEYS"),
            require_api_key: env_bool("REQUIRE_API_KEY", true),
            max_file_size_mb: env_parse("MAX_FILE_SIZE_MB", 16),
            allowed_extensions: env_list(
                "ALLOWED_EXTENSIONS",
                &["jpg", "jpeg", "png", "gif", "bmp", "tiff"],
            ),
            max_gallery_images: env_parse("MAX_GALLERY_IMAGES", 10),
            max_annexure_sections: env_parse("MAX_ANNEXURE_SECTIONS", 5),
            max_images_per_annexure: env_parse("MAX_IMAGES_PER_ANNEXURE", 10),
            templates_dir: PathBuf::from(env_or("TEMPLATES_FOLDER", "word_templates")),
            output_dir: PathBuf::from(env_or("OUTPUT_FOLDER", "output")),
            auto_cleanup_hours: env_parse("AUTO_CLEANUP_HOURS", 24),
            cleanup_on_startup: env_bool("CLEANUP_ON_STARTUP", true),
            cors_origins: env_list(
                "CORS_ORIGINS",
                &[
                    "http://localhost:3000",
                    "http://localhost:5173",
                    "http://localhost:8080",
                    "http://127.0.0.1:8080",
                ],
            ),
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

/// Read-only state shared across workers. Built once in `run()`.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub api_keys: ApiKeySet,
    pub catalog: TemplateCatalog,
    pub store: ReportStore,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Self {
        let api_keys = crate::auth::keys::load_api_keys(&crate::auth::keys::default_sources(
            &config.api_keys_file,
            &config.api_keys_env_var,
        ));
        let catalog = TemplateCatalog::new(config.templates_dir.clone());
        let store = ReportStore::new(config.output_dir.clone());

        Self {
            config,
            api_keys,
            catalog,
            store,
        }
    }

    /// State with an explicit key set, bypassing the loader chain.
    pub fn with_keys(config: AppConfig, api_keys: ApiKeySet) -> Self {
        let catalog = TemplateCatalog::new(config.templates_dir.clone());
        let store = ReportStore::new(config.output_dir.clone());
        Self {
            config,
            api_keys,
            catalog,
            store,
        }
    }
}
