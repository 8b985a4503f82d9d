//! # csv
//!
//! why: export the log in a shape spreadsheet tools and downstream scripts already expect
//! relations: fed by LogService::export_csv, served as /log.csv by worklog-server
//! what: fixed column schema, value quoting, full-document rendering

use serde_json::Value;

use crate::LogEntry;

/// Columns of the csv export, in output order
///
/// the order is a compatibility contract with existing consumers; fields not
/// listed here are left out of the export, listed fields an entry lacks are
/// written as empty cells.
pub const CSV_COLUMNS: [&str; 17] = [
    "timestamp",
    "project",
    "sprint",
    "task",
    "elementType",
    "status",
    "duration",
    "elementDurationSeconds",
    "currentElementSeconds",
    "elementCountInTask",
    "taskTotalSeconds",
    "sprintTotalSeconds",
    "projectTotalSeconds",
    "taskStarted",
    "sprintStarted",
    "projectStarted",
    "projectDescription",
];

/// Render entries as a csv document
///
/// header first, one row per entry, rows joined by `\n` without a trailing
/// newline. an empty slice yields just the header row.
pub fn render(entries: &[LogEntry]) -> String {
    let header: Vec<String> = CSV_COLUMNS.iter().map(|c| quote(c)).collect();
    let mut csv = header.join(",");

    for entry in entries {
        let row: Vec<String> = CSV_COLUMNS
            .iter()
            .map(|column| entry.get(column).map(cell).unwrap_or_default())
            .collect();
        csv.push('\n');
        csv.push_str(&row.join(","));
    }

    csv
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => quote(s),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        // nested values are written as compact json, quoted like any text
        Value::Array(_) | Value::Object(_) => quote(&value.to_string()),
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(value: Value) -> LogEntry {
        LogEntry::from_value(value).unwrap()
    }

    #[test]
    fn empty_log_renders_header_only() {
        let csv = render(&[]);
        assert!(!csv.contains('\n'));
        assert!(csv.starts_with("\"timestamp\",\"project\""));
    }

    #[test]
    fn missing_fields_are_empty_cells() {
        let csv = render(&[entry(json!({ "timestamp": "t1" }))]);
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(row, format!("\"t1\"{}", ",".repeat(16)));
    }

    #[test]
    fn numbers_and_bools_are_bare() {
        let csv = render(&[entry(json!({
            "timestamp": 5,
            "elementDurationSeconds": 1500,
            "taskStarted": true,
        }))]);
        let row: Vec<&str> = csv.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(row[0], "5");
        assert_eq!(row[7], "1500");
        assert_eq!(row[13], "true");
    }

    #[test]
    fn quotes_are_doubled() {
        let csv = render(&[entry(json!({
            "timestamp": "t",
            "projectDescription": "the \"big\" one, mostly",
        }))]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.ends_with("\"the \"\"big\"\" one, mostly\""));
    }

    #[test]
    fn unknown_fields_are_dropped() {
        let csv = render(&[entry(json!({ "timestamp": "t", "secret": "x" }))]);
        assert!(!csv.contains("secret"));
        assert!(!csv.contains("\"x\""));
    }
}
