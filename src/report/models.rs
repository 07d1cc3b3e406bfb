use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The four training programme categories a report can be generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrainingType {
    TypeA,
    TypeB,
    TypeC,
    TypeD,
}

impl TrainingType {
    pub const ALL: [TrainingType; 4] = [
        TrainingType::TypeA,
        TrainingType::TypeB,
        TrainingType::TypeC,
        TrainingType::TypeD,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingType::TypeA => "type_a",
            TrainingType::TypeB => "type_b",
            TrainingType::TypeC => "type_c",
            TrainingType::TypeD => "type_d",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrainingType::TypeA => "Type A",
            TrainingType::TypeB => "Type B",
            TrainingType::TypeC => "Type C",
            TrainingType::TypeD => "Type D",
        }
    }
}

impl std::fmt::Display for TrainingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrainingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "type_a" => Ok(TrainingType::TypeA),
            "type_b" => Ok(TrainingType::TypeB),
            "type_c" => Ok(TrainingType::TypeC),
            "type_d" => Ok(TrainingType::TypeD),
            other => Err(format!(
                "unknown training type '{}', expected one of type_a, type_b, type_c, type_d",
                other
            )),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    pub timestamp: String,
    #[schema(example = "Training Report Generator API")]
    pub service: String,
}

#[derive(Serialize, ToSchema)]
pub struct TemplatesResponse {
    #[schema(example = "success")]
    pub status: String,
    pub templates: Vec<crate::generator::templates::TemplateInfo>,
}

#[derive(Serialize, ToSchema)]
pub struct FilesResponse {
    #[schema(example = "success")]
    pub status: String,
    pub files: Vec<crate::storage::StoredReportInfo>,
    pub total_files: usize,
}
