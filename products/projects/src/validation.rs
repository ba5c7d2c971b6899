use entity::{projects, settings};
use platform_api::FieldError;

use crate::{budget::ActivityRow, projects::ProjectInput};

fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Trimmed, non-empty text or a "required" field error.
pub fn required_text(field: &str, value: &str) -> Result<String, FieldError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(FieldError::new(field, "is required"))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Check a project form and normalize it into the stored field set.
pub fn validate_project(
    input: &ProjectInput,
    activities: &[ActivityRow],
    settings: &settings::Model,
) -> Result<projects::Changes, Vec<FieldError>> {
    let mut errors = Vec::new();

    let name = required_text("name", &input.name).unwrap_or_else(|err| {
        errors.push(err);
        String::new()
    });
    if !(0..=100).contains(&input.completion_percentage) {
        errors.push(FieldError::new(
            "completionPercentage",
            "must be between 0 and 100",
        ));
    }
    if let (Some(start), Some(end)) = (input.start_date, input.end_date) {
        if end < start {
            errors.push(FieldError::new("endDate", "must not be before the start date"));
        }
    }
    let project_type = optional_text(&input.project_type);
    if let Some(kind) = &project_type {
        if !settings.project_types.is_empty() && !settings.project_types.contains(kind) {
            errors.push(FieldError::new("projectType", "is not a configured project type"));
        }
    }

    for (index, row) in activities.iter().enumerate() {
        let field = |name: &str| format!("activities[{index}].{name}");
        if row.name.trim().is_empty() {
            errors.push(FieldError::new(field("name"), "is required"));
        }
        if row.quantity() < 0.0 {
            errors.push(FieldError::new(field("quantity"), "must not be negative"));
        }
        if row.rate() < 0.0 {
            errors.push(FieldError::new(field("rate"), "must not be negative"));
        }
        if let (Some(start), Some(end)) = (row.start_date, row.end_date) {
            if end < start {
                errors.push(FieldError::new(
                    field("endDate"),
                    "must not be before the start date",
                ));
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(projects::Changes {
        name,
        project_type,
        start_date: input.start_date,
        end_date: input.end_date,
        vendor: optional_text(&input.vendor),
        description: optional_text(&input.description),
        status: input.status,
        completion_percentage: input.completion_percentage,
    })
}

/// Trim, drop blanks and duplicates while keeping first-seen order.
pub fn normalize_list(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if !out.iter().any(|seen| seen == value) {
            out.push(value.to_string());
        }
    }
    out
}

/// File extensions are compared lower-case and without a leading dot.
pub fn normalize_extensions(values: &[String]) -> Vec<String> {
    let cleaned: Vec<String> = values
        .iter()
        .map(|v| v.trim().trim_start_matches('.').to_ascii_lowercase())
        .collect();
    normalize_list(&cleaned)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use entity::projects::Status;

    use super::*;

    fn input() -> ProjectInput {
        ProjectInput {
            name: "  Harbour wall ".into(),
            project_type: Some(" ".into()),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 9, 1),
            vendor: Some(" Acme ".into()),
            description: None,
            status: Status::Ongoing,
            completion_percentage: 10,
        }
    }

    #[test]
    fn normalizes_valid_forms() {
        let changes = validate_project(&input(), &[], &settings::Model::default()).unwrap();
        assert_eq!(changes.name, "Harbour wall");
        assert_eq!(changes.project_type, None);
        assert_eq!(changes.vendor.as_deref(), Some("Acme"));
    }

    #[test]
    fn collects_every_field_error() {
        let mut form = input();
        form.name = " ".into();
        form.completion_percentage = 120;
        form.end_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        let rows = vec![ActivityRow {
            name: "".into(),
            quantity: "-2".into(),
            ..Default::default()
        }];
        let errors = validate_project(&form, &rows, &settings::Model::default()).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "name",
                "completionPercentage",
                "endDate",
                "activities[0].name",
                "activities[0].quantity"
            ]
        );
    }

    #[test]
    fn project_types_follow_settings() {
        let settings = settings::Model {
            project_types: vec!["Civil".into()],
            ..Default::default()
        };
        let mut form = input();
        form.project_type = Some("Marine".into());
        assert!(validate_project(&form, &[], &settings).is_err());
        form.project_type = Some("Civil".into());
        assert!(validate_project(&form, &[], &settings).is_ok());
    }

    #[test]
    fn lists_are_trimmed_and_deduplicated() {
        let values = vec![" PDF".into(), ".pdf".into(), "".into(), "Docx ".into()];
        assert_eq!(normalize_extensions(&values), vec!["pdf", "docx"]);
        let vendors = vec!["Acme".into(), " Acme ".into(), "Beta".into()];
        assert_eq!(normalize_list(&vendors), vec!["Acme", "Beta"]);
    }
}
