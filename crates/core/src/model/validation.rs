//! Structural validation of progress documents before they are persisted.
//!
//! Validation works on the raw JSON value so it can report every problem in a
//! document that would not even deserialize into a typed `ProgressRecord`.
//! It never fails; problems are collected as human-readable strings.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};

/// Outcome of validating a progress document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    #[must_use]
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validate the shape and field types of a progress document.
#[must_use]
pub fn validate_progress_data(progress: &Value) -> ValidationReport {
    let Some(root) = progress.as_object() else {
        return ValidationReport::from_errors(vec!["progress must be an object".to_string()]);
    };

    let mut errors = Vec::new();

    if !is_non_negative_number(root.get("totalAttempts")) {
        errors.push("totalAttempts must be a non-negative number".to_string());
    }
    if !is_non_negative_number(root.get("totalTimeSpent")) {
        errors.push("totalTimeSpent must be a non-negative number".to_string());
    }
    if let Some(free_tries) = root.get("freeTries") {
        if !is_non_negative_number(Some(free_tries)) {
            errors.push("freeTries must be a non-negative number".to_string());
        }
    }

    match root.get("activeDays") {
        Some(Value::Array(days)) => {
            for day in days {
                if !day.as_str().is_some_and(is_parseable_date) {
                    errors.push(format!("Invalid timestamp in activeDays: {day}"));
                }
            }
        }
        _ => errors.push("activeDays must be an array".to_string()),
    }

    match root.get("levels") {
        Some(Value::Object(levels)) => {
            for (level_id, level) in levels {
                validate_level(level_id, level, &mut errors);
            }
        }
        _ => errors.push("levels must be an object".to_string()),
    }

    ValidationReport::from_errors(errors)
}

fn validate_level(level_id: &str, level: &Value, errors: &mut Vec<String>) {
    let Some(level) = level.as_object() else {
        errors.push(format!("Level {level_id}: must be an object"));
        return;
    };

    if let Some(locked) = level.get("locked") {
        if !locked.is_boolean() {
            errors.push(format!("Level {level_id}: locked must be a boolean"));
        }
    }

    let Some(units) = level.get("units").and_then(Value::as_object) else {
        errors.push(format!("Level {level_id}: units must be an object"));
        return;
    };

    for (unit_id, unit) in units {
        let Some(lessons) = unit
            .as_object()
            .and_then(|u| u.get("lessons"))
            .and_then(Value::as_object)
        else {
            errors.push(format!(
                "Level {level_id}, Unit {unit_id}: lessons must be an object"
            ));
            continue;
        };

        for (lesson_id, lesson) in lessons {
            let prefix = format!("Level {level_id}, Unit {unit_id}, Lesson {lesson_id}");
            match lesson.as_object() {
                Some(lesson) => validate_lesson(&prefix, lesson, errors),
                None => errors.push(format!("{prefix}: must be an object")),
            }
        }
    }
}

fn validate_lesson(prefix: &str, lesson: &Map<String, Value>, errors: &mut Vec<String>) {
    if !is_non_negative_number(lesson.get("attempts")) {
        errors.push(format!("{prefix}: attempts must be a non-negative number"));
    }

    let complete = lesson.get("complete").or_else(|| lesson.get("completed"));
    if !complete.is_some_and(Value::is_boolean) {
        errors.push(format!("{prefix}: complete must be a boolean"));
    }

    if let Some(time_spent) = lesson.get("timeSpent") {
        if !is_non_negative_number(Some(time_spent)) {
            errors.push(format!("{prefix}: timeSpent must be a non-negative number"));
        }
    }

    if let Some(last_accessed) = lesson.get("lastAccessed") {
        if !last_accessed.as_str().is_some_and(is_parseable_date) {
            errors.push(format!("{prefix}: lastAccessed must be a date"));
        }
    }
}

fn is_non_negative_number(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_f64)
        .is_some_and(|n| n.is_finite() && n >= 0.0)
}

/// Accepts plain dates, RFC 3339 timestamps and naive ISO date-times.
#[must_use]
pub fn is_parseable_date(raw: &str) -> bool {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(raw).is_ok()
        || NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_well_formed_document() {
        let doc = json!({
            "levels": { "1": { "units": { "1": { "lessons": {
                "yes": { "complete": true, "attempts": 2, "timeSpent": 30, "lastAccessed": "2024-03-01" }
            } } }, "locked": false } },
            "freeTries": 0,
            "totalAttempts": 2,
            "totalTimeSpent": 30,
            "activeDays": ["2024-03-01", "2024-03-02T10:00:00.000Z"]
        });

        let report = validate_progress_data(&doc);
        assert!(report.is_valid, "{:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn collects_every_problem() {
        let doc = json!({
            "levels": {
                "1": { "units": { "1": { "lessons": {
                    "yes": { "complete": "true", "attempts": -1 }
                } } } },
                "2": { "units": "none" },
                "3": { "units": { "4": { "lessons": null } } }
            },
            "totalAttempts": -5,
            "totalTimeSpent": "10",
            "activeDays": ["not a date", 42]
        });

        let report = validate_progress_data(&doc);
        assert!(!report.is_valid);
        assert!(report.errors.contains(&"totalAttempts must be a non-negative number".to_string()));
        assert!(report.errors.contains(&"totalTimeSpent must be a non-negative number".to_string()));
        assert!(report.errors.contains(&"Invalid timestamp in activeDays: \"not a date\"".to_string()));
        assert!(report.errors.contains(&"Invalid timestamp in activeDays: 42".to_string()));
        assert!(report.errors.contains(&"Level 2: units must be an object".to_string()));
        assert!(report.errors.contains(&"Level 3, Unit 4: lessons must be an object".to_string()));
        assert!(report.errors.contains(
            &"Level 1, Unit 1, Lesson yes: attempts must be a non-negative number".to_string()
        ));
        assert!(report.errors.contains(
            &"Level 1, Unit 1, Lesson yes: complete must be a boolean".to_string()
        ));
        assert_eq!(report.errors.len(), 8);
    }

    #[test]
    fn non_object_root_is_reported() {
        let report = validate_progress_data(&json!([1, 2, 3]));
        assert!(!report.is_valid);
        assert_eq!(report.errors, vec!["progress must be an object".to_string()]);
    }

    #[test]
    fn missing_collections_are_reported() {
        let report = validate_progress_data(&json!({ "totalAttempts": 0, "totalTimeSpent": 0 }));
        assert_eq!(
            report.errors,
            vec![
                "activeDays must be an array".to_string(),
                "levels must be an object".to_string()
            ]
        );
    }
}
