//! Error taxonomy for the import pipeline
//!
//! Row-local failures (`ValidationError`, `ResolutionError`) never reach the
//! remote API and never abort a run. `ApiError` fails a single row.
//! `CacheError` (including `PaginationError`) aborts the run because every
//! later resolution would depend on an incomplete cache.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::services::entity_cache::EntityKind;

/// Timestamp could not be turned into a canonical instant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("timestamp is blank")]
    Empty,

    #[error("unrecognized date format: '{0}'")]
    Unrecognized(String),

    #[error("date out of range: '{0}'")]
    InvalidDate(String),

    #[error("time out of range: '{0}'")]
    InvalidTime(String),

    #[error("local time '{0}' does not exist in the configured timezone")]
    NonexistentLocalTime(String),
}

/// One problem with one field of a CSV row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
    pub original_value: Option<String>,
}

impl FieldIssue {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        original_value: Option<&str>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            original_value: original_value.map(str::to_string),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A row failed the validation gate. Carries every violation, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub row_number: usize,
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn has_field(&self, field: &str) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} failed validation: ", self.row_number)?;
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

/// A reference in a row has no match on the remote side
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} '{value}' not found in Syncro")]
pub struct ResolutionError {
    pub field: String,
    pub value: String,
}

impl ResolutionError {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Remote API call failed
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to Syncro failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Syncro returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected Syncro response: {0}")]
    Decode(String),
}

/// Remote enumeration did not terminate the way the continuation signal promised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("{kind} enumeration: page {page} pointed to non-advancing next page {next}")]
    NonAdvancing { kind: EntityKind, page: u32, next: u32 },

    #[error("{kind} enumeration exceeded {limit} pages without terminating")]
    PageLimit { kind: EntityKind, limit: u32 },
}

/// Entity cache population failed. Always fatal to the run.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Pagination(#[from] PaginationError),

    #[error("failed to enumerate {kind}: {source}")]
    Remote {
        kind: EntityKind,
        #[source]
        source: ApiError,
    },
}

/// CSV input could not be read as a whole
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to read CSV: {0}")]
    Read(#[from] csv::Error),

    #[error("CSV is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Fatal run-level failure
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Csv(#[from] CsvError),

    #[error(transparent)]
    Unresolved(#[from] ResolutionError),

    #[error(transparent)]
    Remote(#[from] ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_issue() {
        let err = ValidationError {
            row_number: 4,
            issues: vec![
                FieldIssue::new("ticket customer", "required field is blank", Some("")),
                FieldIssue::new("ticket created", "unrecognized date format: 'soon'", Some("soon")),
            ],
        };

        let msg = err.to_string();
        assert!(msg.starts_with("row 4 failed validation"));
        assert!(msg.contains("ticket customer: required field is blank"));
        assert!(msg.contains("ticket created"));
        assert!(err.has_field("ticket customer"));
        assert!(!err.has_field("tech"));
    }

    #[test]
    fn resolution_error_names_field_and_value() {
        let err = ResolutionError::new("customer", "Acme Corp");
        assert_eq!(err.to_string(), "customer 'Acme Corp' not found in Syncro");
    }

    #[test]
    fn missing_columns_are_joined() {
        let err = CsvError::MissingColumns(vec!["tech".into(), "ticket status".into()]);
        assert_eq!(err.to_string(), "CSV is missing required columns: tech, ticket status");
    }
}
