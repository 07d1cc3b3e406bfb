//! Form processing: validates submitted fields and turns them into the
//! placeholder map consumed by the document assembler.

use std::collections::HashMap;

use crate::generator::validation::{
    validate_date, validate_date_optional, validate_required, ValidationError, ValidationErrors,
};
use crate::report::models::TrainingType;

/// Raw text fields from the multipart payload. A field submitted more than
/// once (array-style inputs like `guest_name[]`) keeps every value in
/// submission order.
#[derive(Debug, Default)]
pub struct FormFields {
    values: HashMap<String, Vec<String>>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_default().push(value.into());
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    pub fn first_or_empty(&self, name: &str) -> &str {
        self.first(name).unwrap_or("")
    }

    pub fn all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Validated, canonical form data for one report.
#[derive(Debug)]
pub struct ReportForm {
    pub training_type: TrainingType,
    pub template_id: u8,
    pub event_date: String,
    pub cell_name: String,
    pub replacements: HashMap<String, String>,
}

impl ReportForm {
    /// Validate the raw fields and build the canonical form. Every failed
    /// check lands in the returned `ValidationErrors`, not just the first.
    pub fn from_fields(fields: &FormFields) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let training_type = match fields.first("training_type") {
            Some(raw) if !raw.trim().is_empty() => match raw.trim().parse::<TrainingType>() {
                Ok(t) => Some(t),
                Err(message) => {
                    errors.add(ValidationError::new("training_type", message));
                    None
                }
            },
            _ => {
                errors.add(ValidationError::missing_field("training_type"));
                None
            }
        };

        let template_id = match fields.first("template_id") {
            Some(raw) if !raw.trim().is_empty() => match raw.trim().parse::<u8>() {
                Ok(id) if crate::generator::templates::TEMPLATE_IDS.contains(&id) => Some(id),
                Ok(id) => {
                    errors.add(ValidationError::new(
                        "template_id",
                        format!("template_id {} is out of range, expected 1-5", id),
                    ));
                    None
                }
                Err(_) => {
                    errors.add(ValidationError::new(
                        "template_id",
                        format!("'{}' is not a valid template id", raw.trim()),
                    ));
                    None
                }
            },
            _ => {
                errors.add(ValidationError::missing_field("template_id"));
                None
            }
        };

        validate_date(fields.first("event_date"), "event_date", &mut errors);
        validate_required(fields.first("cell_name"), "cell_name", &mut errors);
        validate_required(fields.first("venue"), "venue", &mut errors);
        validate_date_optional(fields.first("date"), "date", &mut errors);

        // Type-specific requirements; the date range is mandatory only for
        // multi-day type_b trainings.
        match training_type {
            Some(TrainingType::TypeB) => {
                validate_date(fields.first("start_date"), "start_date", &mut errors);
                validate_date(fields.first("end_date"), "end_date", &mut errors);
            }
            other => {
                validate_date_optional(fields.first("start_date"), "start_date", &mut errors);
                validate_date_optional(fields.first("end_date"), "end_date", &mut errors);
                if other == Some(TrainingType::TypeD) {
                    validate_required(
                        fields.first("participant_count"),
                        "participant_count",
                        &mut errors,
                    );
                }
            }
        }

        errors.into_result()?;

        Ok(Self {
            training_type: training_type.expect("validated above"),
            template_id: template_id.expect("validated above"),
            event_date: fields.first_or_empty("event_date").to_string(),
            cell_name: fields.first_or_empty("cell_name").to_string(),
            replacements: build_replacements(fields),
        })
    }

    /// Download filename: `TYPE_A_20260314_Solar_Cell_report.docx`.
    pub fn output_filename(&self) -> String {
        let date = self.event_date.replace('-', "");
        let cell = self.cell_name.trim().replace(' ', "_");
        sanitize_filename::sanitize(format!(
            "{}_{}_{}_report.docx",
            self.training_type.as_str().to_uppercase(),
            date,
            cell
        ))
    }
}

/// Reformat `YYYY-MM-DD` as `DD-MM-YYYY`; anything else passes through.
pub fn format_report_date(date: &str) -> String {
    let parts: Vec<&str> = date.split('-').collect();
    match parts.as_slice() {
        [year, month, day] => format!("{}-{}-{}", day, month, year),
        _ => date.to_string(),
    }
}

/// First two address lines joined by a comma, third on its own line.
pub fn format_address(line1: &str, line2: &str, line3: &str) -> String {
    let mut first_part = Vec::new();
    for line in [line1, line2] {
        let line = line.trim();
        if !line.is_empty() {
            first_part.push(line);
        }
    }

    let mut parts = Vec::new();
    if !first_part.is_empty() {
        parts.push(first_part.join(", "));
    }
    let line3 = line3.trim();
    if !line3.is_empty() {
        parts.push(line3.to_string());
    }
    parts.join("\n")
}

/// All address lines joined onto one comma-separated line.
pub fn format_address_oneline(line1: &str, line2: &str, line3: &str) -> String {
    [line1, line2, line3]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Combine parallel prefix/name/designation lists into prose, with "and"
/// before the final person: "Dr. A (Lead), Mr. B and Ms. C (Trainer)".
pub fn combine_person_list(prefixes: &[String], names: &[String], designations: &[String]) -> String {
    let mut people = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let prefix = prefixes.get(i).map(|p| p.trim()).unwrap_or("");
        let designation = designations.get(i).map(|d| d.trim()).unwrap_or("");

        let mut entry = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{} {}", prefix, name)
        };
        if !designation.is_empty() {
            entry.push_str(&format!(" ({})", designation));
        }
        people.push(entry);
    }

    match people.len() {
        0 => String::new(),
        1 => people.remove(0),
        2 => format!("{} and {}", people[0], people[1]),
        n => format!("{} and {}", people[..n - 1].join(", "), people[n - 1]),
    }
}

/// A person list may arrive as one preformatted field or as parallel
/// `<base>_prefix[]` / `<base>_name[]` / `<base>_designation[]` arrays.
fn person_field(fields: &FormFields, direct: &str, array_base: &str) -> String {
    let direct_value = fields.first_or_empty(direct).trim().to_string();
    if !direct_value.is_empty() {
        return direct_value;
    }
    combine_person_list(
        fields.all(&format!("{}_prefix[]", array_base)),
        fields.all(&format!("{}_name[]", array_base)),
        fields.all(&format!("{}_designation[]", array_base)),
    )
}

/// Build the `{{TOKEN}}` substitution map from the submitted fields.
pub fn build_replacements(fields: &FormFields) -> HashMap<String, String> {
    let get = |name: &str| fields.first_or_empty(name).trim().to_string();

    let mut map = HashMap::new();
    map.insert(
        "{{EVENT_DATE}}".to_string(),
        format_report_date(&get("event_date")),
    );
    map.insert("{{Submitted_to}}".to_string(), get("submitted_to"));
    map.insert("{{Submitted_by}}".to_string(), get("submitted_by"));
    map.insert(
        "{{ADDRESS}}".to_string(),
        format_address(
            fields.first_or_empty("address_line1"),
            fields.first_or_empty("address_line2"),
            fields.first_or_empty("address_line3"),
        ),
    );
    map.insert(
        "{{ADDRESS_ONELINE}}".to_string(),
        format_address_oneline(
            fields.first_or_empty("address_line1"),
            fields.first_or_empty("address_line2"),
            fields.first_or_empty("address_line3"),
        ),
    );
    map.insert(
        "{{SDA_PEOPLE}}".to_string(),
        person_field(fields, "sda_people", "sda"),
    );
    map.insert("{{WORKSHOP_TYPE}}".to_string(), get("workshop_type"));
    map.insert(
        "{{GUEST_TRAINERS}}".to_string(),
        person_field(fields, "guest_trainers", "guest"),
    );
    map.insert("{{ORGANIZER}}".to_string(), get("organizer"));
    map.insert("{{VENUE}}".to_string(), get("venue"));
    map.insert("{{DATETIME}}".to_string(), format_report_date(&get("date")));
    map.insert("{{CELL_NAME}}".to_string(), get("cell_name"));
    map.insert(
        "{{CHIEF_GUESTS}}".to_string(),
        person_field(fields, "chief_guests", "chief"),
    );
    map.insert(
        "{{GUIDANCE_PERSON}}".to_string(),
        person_field(fields, "guidance_person", "guidance"),
    );
    map.insert(
        "{{START_DATE}}".to_string(),
        format_report_date(&get("start_date")),
    );
    map.insert(
        "{{END_DATE}}".to_string(),
        format_report_date(&get("end_date")),
    );
    map.insert("{{DURATION}}".to_string(), get("duration"));
    map.insert(
        "{{PARTICIPANT_COUNT}}".to_string(),
        get("participant_count"),
    );
    map.insert("{{TRAINING_TYPE}}".to_string(), get("training_type"));
    map.insert("{{CONTACT_PERSON}}".to_string(), get("contact_person"));
    map.insert("{{PHONE}}".to_string(), get("phone"));
    map.insert("{{EMAIL}}".to_string(), get("email"));

    for section in 1..=5u8 {
        map.insert(
            format!("{{{{ANNEXURE{}_TITLE}}}}", section),
            get(&format!("annexure{}_title", section)),
        );
    }

    map
}
