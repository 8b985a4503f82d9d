//! # comprehensive core tests
//!
//! why: verify entry validation and csv export behave the way clients rely on
//! relations: tests worklog-core crate
//! what: validation boundary, field pass-through, csv schema stability

use serde_json::{json, Value};
use worklog_core::{csv, LogEntry, ValidationError, CSV_COLUMNS};

fn full_entry() -> Value {
    json!({
        "timestamp": "2024-03-01T09:30:00.000Z",
        "project": "Atlas",
        "sprint": "Sprint 4",
        "task": "Write migration",
        "elementType": "element",
        "status": "completed",
        "duration": "25:00",
        "elementDurationSeconds": 1500,
        "currentElementSeconds": null,
        "elementCountInTask": 3,
        "taskTotalSeconds": 4500,
        "sprintTotalSeconds": 9000,
        "projectTotalSeconds": 18000,
        "taskStarted": "2024-03-01T08:00:00.000Z",
        "sprintStarted": "2024-02-26T08:00:00.000Z",
        "projectStarted": "2024-01-15T08:00:00.000Z",
        "projectDescription": "Storage rework"
    })
}

// =============================================================================
// SECTION 1: VALIDATION
// =============================================================================

mod validation {
    use super::*;

    #[test]
    fn fully_populated_entry_is_accepted() {
        let entry = LogEntry::from_value(full_entry()).unwrap();
        assert_eq!(entry.timestamp(), &json!("2024-03-01T09:30:00.000Z"));
    }

    #[test]
    fn timestamp_alone_is_enough() {
        assert!(LogEntry::from_value(json!({ "timestamp": "t" })).is_ok());
    }

    #[test]
    fn empty_object_is_rejected() {
        let err = LogEntry::from_value(json!({})).unwrap_err();
        assert_eq!(err, ValidationError::MissingTimestamp);
    }

    #[test]
    fn other_fields_without_timestamp_are_rejected() {
        let err = LogEntry::from_value(json!({ "project": "Atlas" })).unwrap_err();
        assert_eq!(err, ValidationError::MissingTimestamp);
    }

    #[test]
    fn array_body_is_rejected() {
        let err = LogEntry::from_value(json!([{ "timestamp": "t" }])).unwrap_err();
        assert_eq!(err, ValidationError::NotAnObject);
    }

    #[test]
    fn try_from_matches_from_value() {
        let entry: Result<LogEntry, _> = json!({ "timestamp": 1 }).try_into();
        assert!(entry.is_ok());
    }
}

// =============================================================================
// SECTION 2: FIELD PASS-THROUGH
// =============================================================================

mod pass_through {
    use super::*;

    #[test]
    fn unknown_fields_survive_a_json_round_trip() {
        let raw = json!({
            "timestamp": "t",
            "mood": "focused",
            "tags": ["a", "b"],
            "meta": { "client": "web", "version": 3 }
        });
        let entry = LogEntry::from_value(raw.clone()).unwrap();

        let text = serde_json::to_string(&entry).unwrap();
        let back: LogEntry = serde_json::from_str(&text).unwrap();

        assert_eq!(back.into_value(), raw);
    }

    #[test]
    fn field_order_is_preserved() {
        let entry = LogEntry::from_value(json!({ "z": 1, "timestamp": "t", "a": 2 })).unwrap();
        let keys: Vec<&str> = entry.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "timestamp", "a"]);
    }
}

// =============================================================================
// SECTION 3: CSV SCHEMA
// =============================================================================

mod csv_schema {
    use super::*;

    const EXPECTED_HEADER: &str = "\"timestamp\",\"project\",\"sprint\",\"task\",\"elementType\",\
\"status\",\"duration\",\"elementDurationSeconds\",\"currentElementSeconds\",\
\"elementCountInTask\",\"taskTotalSeconds\",\"sprintTotalSeconds\",\"projectTotalSeconds\",\
\"taskStarted\",\"sprintStarted\",\"projectStarted\",\"projectDescription\"";

    #[test]
    fn schema_has_seventeen_columns() {
        assert_eq!(CSV_COLUMNS.len(), 17);
        assert_eq!(CSV_COLUMNS[0], "timestamp");
        assert_eq!(CSV_COLUMNS[16], "projectDescription");
    }

    #[test]
    fn header_matches_schema_verbatim() {
        let entry = LogEntry::from_value(full_entry()).unwrap();
        let out = csv::render(&[entry]);

        assert_eq!(out.lines().next().unwrap(), EXPECTED_HEADER);
    }

    #[test]
    fn full_entry_row_follows_column_order() {
        let entry = LogEntry::from_value(full_entry()).unwrap();
        let out = csv::render(&[entry]);
        let row = out.lines().nth(1).unwrap();

        assert_eq!(
            row,
            "\"2024-03-01T09:30:00.000Z\",\"Atlas\",\"Sprint 4\",\"Write migration\",\
\"element\",\"completed\",\"25:00\",1500,,3,4500,9000,18000,\
\"2024-03-01T08:00:00.000Z\",\"2024-02-26T08:00:00.000Z\",\"2024-01-15T08:00:00.000Z\",\
\"Storage rework\""
        );
    }

    #[test]
    fn rows_follow_entry_order() {
        let entries: Vec<LogEntry> = (1..=3)
            .map(|i| LogEntry::from_value(json!({ "timestamp": format!("t{}", i) })).unwrap())
            .collect();
        let out = csv::render(&entries);
        let firsts: Vec<&str> = out
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap())
            .collect();

        assert_eq!(firsts, vec!["\"t1\"", "\"t2\"", "\"t3\""]);
    }

    #[test]
    fn no_trailing_newline() {
        let entry = LogEntry::from_value(json!({ "timestamp": "t" })).unwrap();
        assert!(!csv::render(&[entry]).ends_with('\n'));
    }

    #[test]
    fn nested_values_are_quoted_json() {
        let entry =
            LogEntry::from_value(json!({ "timestamp": "t", "status": { "k": "v" } })).unwrap();
        let out = csv::render(&[entry]);
        assert!(out.contains("\"{\"\"k\"\":\"\"v\"\"}\""));
    }
}
