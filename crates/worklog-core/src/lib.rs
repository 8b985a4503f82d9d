//! # worklog-core
//!
//! why: define the schema-loose log entry and its csv projection in pure, portable rust
//! relations: used by worklog-storage for persistence, worklog-server for the http surface
//! what: LogEntry, entry validation, fixed csv column schema and rendering

pub mod csv;
pub mod entry;

pub use csv::CSV_COLUMNS;
pub use entry::{LogEntry, ValidationError};
