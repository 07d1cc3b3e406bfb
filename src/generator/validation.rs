//! Input validation for report generation.
//!
//! Validation never stops at the first problem: every missing or invalid
//! field is collected so one response can list them all.

use std::fmt;

use serde::Serialize;

/// A single validation failure with a descriptive message.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    /// The form field that failed validation
    pub field: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Error for an absent or blank required field.
    pub fn missing_field(field: &str) -> Self {
        Self::new(field, format!("{} is required", field))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors accumulated over a whole form.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Names of every offending field, for the error response body.
    pub fn field_names(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.field.clone()).collect()
    }

    /// One-line summary naming each failed field and reason.
    pub fn to_message(&self) -> String {
        let parts: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        format!(
            "Validation failed with {} error(s): {}",
            self.errors.len(),
            parts.join("; ")
        )
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_message())
    }
}

// ============================================================================
// Validation functions
// ============================================================================

/// Validate that a string is present and not blank.
pub fn validate_required(value: Option<&str>, field: &str, errors: &mut ValidationErrors) {
    match value {
        Some(v) if !v.trim().is_empty() => {}
        _ => errors.add(ValidationError::missing_field(field)),
    }
}

/// Validate a date in `YYYY-MM-DD` form.
pub fn validate_date(value: Option<&str>, field: &str, errors: &mut ValidationErrors) {
    let value = match value {
        Some(v) if !v.trim().is_empty() => v.trim(),
        _ => {
            errors.add(ValidationError::missing_field(field));
            return;
        }
    };

    if chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
        errors.add(ValidationError::new(
            field,
            format!("'{}' is not a valid date, expected YYYY-MM-DD", value),
        ));
    }
}

/// Same as [`validate_date`] but an absent value is acceptable.
pub fn validate_date_optional(value: Option<&str>, field: &str, errors: &mut ValidationErrors) {
    match value {
        Some(v) if !v.trim().is_empty() => validate_date(Some(v), field, errors),
        _ => {}
    }
}
