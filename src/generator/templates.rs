//! Template catalog: resolves (training_type, template_id) pairs to .docx
//! files on disk and backs the public template listing.

use std::ops::RangeInclusive;
use std::path::PathBuf;

use serde::Serialize;
use utoipa::ToSchema;

use crate::report::models::TrainingType;

/// Valid template ids for every training type.
pub const TEMPLATE_IDS: RangeInclusive<u8> = 1..=5;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TemplateInfo {
    pub training_type: TrainingType,
    #[schema(example = 1)]
    pub template_id: u8,
    #[schema(example = "Type A Template 1")]
    pub display_name: String,
    pub exists: bool,
}

/// Read-only mapping of the template library directory.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    root: PathBuf,
}

impl TemplateCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path for a (training_type, template_id) pair, or `None` when the id
    /// is outside the catalog range. Existence is not checked here; callers
    /// surface a missing file as a not-found error when they read it.
    pub fn resolve(&self, training_type: TrainingType, template_id: u8) -> Option<PathBuf> {
        if !TEMPLATE_IDS.contains(&template_id) {
            return None;
        }
        Some(self.root.join(format!(
            "{}_template_{}.docx",
            training_type.as_str(),
            template_id
        )))
    }

    pub fn display_name(training_type: TrainingType, template_id: u8) -> String {
        format!("{} Template {}", training_type.label(), template_id)
    }

    /// Full listing across all types and ids, with an exists flag per entry.
    pub fn list(&self) -> Vec<TemplateInfo> {
        let mut templates = Vec::new();
        for training_type in TrainingType::ALL {
            for template_id in TEMPLATE_IDS {
                let path = self
                    .resolve(training_type, template_id)
                    .expect("catalog ids are in range");
                templates.push(TemplateInfo {
                    training_type,
                    template_id,
                    display_name: Self::display_name(training_type, template_id),
                    exists: path.is_file(),
                });
            }
        }
        templates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_pair_resolves() {
        let catalog = TemplateCatalog::new("word_templates");
        for training_type in TrainingType::ALL {
            for id in TEMPLATE_IDS {
                let path = catalog.resolve(training_type, id);
                assert!(path.is_some(), "{}/{} should resolve", training_type, id);
            }
        }
    }

    #[test]
    fn out_of_range_ids_do_not_resolve() {
        let catalog = TemplateCatalog::new("word_templates");
        assert!(catalog.resolve(TrainingType::TypeA, 0).is_none());
        assert!(catalog.resolve(TrainingType::TypeA, 6).is_none());
        assert!(catalog.resolve(TrainingType::TypeD, 255).is_none());
    }

    #[test]
    fn resolved_path_follows_naming_convention() {
        let catalog = TemplateCatalog::new("word_templates");
        let path = catalog.resolve(TrainingType::TypeC, 4).unwrap();
        assert!(path.ends_with("type_c_template_4.docx"));
    }

    #[test]
    fn listing_covers_all_twenty_entries() {
        let catalog = TemplateCatalog::new("word_templates");
        let listing = catalog.list();
        assert_eq!(listing.len(), 20);
        assert_eq!(listing[0].display_name, "Type A Template 1");
    }
}
