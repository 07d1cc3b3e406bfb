use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Listing entry for a retained report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoredReportInfo {
    pub filename: String,
    pub file_id: String,
    pub size_mb: f64,
    pub created_at: String,
    pub download_url: String,
    #[schema(example = "application/vnd.openxmlformats-officedocument.wordprocessingml.document")]
    pub content_type: String,
}

/// A stored report located by its id.
#[derive(Debug)]
pub struct StoredReport {
    pub path: PathBuf,
    pub original_filename: String,
}

/// Filesystem store for generated reports. Files are written as
/// `{file_id}_{filename}` so the id alone is enough to find and serve
/// them later.
#[derive(Debug, Clone)]
pub struct ReportStore {
    output_dir: PathBuf,
}

impl ReportStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.output_dir)
    }

    pub fn save(&self, file_id: &Uuid, filename: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.output_dir.join(format!("{}_{}", file_id, filename));
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Locate a report by id prefix. Returns `Ok(None)` when nothing with
    /// that id is retained.
    pub fn find(&self, file_id: &str) -> std::io::Result<Option<StoredReport>> {
        let prefix = format!("{}_", file_id);
        for entry in fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&prefix) && entry.path().is_file() {
                return Ok(Some(StoredReport {
                    path: entry.path(),
                    original_filename: name[prefix.len()..].to_string(),
                }));
            }
        }
        Ok(None)
    }

    /// All retained reports, newest first.
    pub fn list(&self) -> std::io::Result<Vec<StoredReportInfo>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(".docx") || !entry.path().is_file() {
                continue;
            }
            let (file_id, display_name) = match name.split_once('_') {
                Some((id, rest)) if Uuid::parse_str(id).is_ok() => (id.to_string(), rest.to_string()),
                _ => continue,
            };

            let metadata = entry.metadata()?;
            let created: DateTime<Utc> = metadata
                .modified()
                .unwrap_or_else(|_| SystemTime::now())
                .into();

            files.push(StoredReportInfo {
                content_type: mime_guess::from_path(&display_name)
                    .first_or_octet_stream()
                    .to_string(),
                download_url: format!("/api/download/{}", file_id),
                size_mb: (metadata.len() as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
                created_at: created.to_rfc3339(),
                filename: display_name,
                file_id,
            });
        }
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(files)
    }

    /// Delete reports older than `hours`. Returns how many were removed.
    pub fn cleanup_older_than(&self, hours: u64) -> std::io::Result<usize> {
        let cutoff = SystemTime::now() - Duration::from_secs(hours * 3600);
        let mut removed = 0;
        for entry in fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(".docx") || !entry.path().is_file() {
                continue;
            }
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(_) => continue,
            };
            if modified < cutoff {
                match fs::remove_file(entry.path()) {
                    Ok(()) => {
                        log::info!("Cleaned up old report: {}", name);
                        removed += 1;
                    }
                    Err(e) => log::warn!("Failed to clean up {}: {}", name, e),
                }
            }
        }
        Ok(removed)
    }
}
