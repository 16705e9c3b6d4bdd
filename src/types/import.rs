//! Per-row outcomes and the run summary

use serde::Serialize;

use crate::error::{FieldIssue, ValidationError};

/// Problems shown in the text report before it is truncated
const REPORT_ISSUE_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Ticket,
    Comment,
    /// Tickets and their follow-up comments from one file
    Combined,
    TimeEntry,
    LaborEntry,
}

impl RecordKind {
    fn plural(self) -> &'static str {
        match self {
            RecordKind::Ticket => "tickets",
            RecordKind::Comment => "comments",
            RecordKind::Combined => "tickets and comments",
            RecordKind::TimeEntry => "time entries",
            RecordKind::LaborEntry => "labor entries",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ImportOutcome {
    Created {
        remote_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        ticket_number: Option<String>,
    },
    Skipped {
        reason: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        issues: Vec<FieldIssue>,
    },
    Failed {
        error: String,
    },
}

impl ImportOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        ImportOutcome::Skipped { reason: reason.into(), issues: Vec::new() }
    }

    pub fn invalid(error: ValidationError) -> Self {
        ImportOutcome::Skipped {
            reason: "validation failed".to_string(),
            issues: error.issues,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        ImportOutcome::Failed { error: error.to_string() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub row_number: usize,
    #[serde(flatten)]
    pub outcome: ImportOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub kind: RecordKind,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_calls: Option<u64>,
    pub results: Vec<ImportResult>,
}

impl RunSummary {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            created: 0,
            skipped: 0,
            failed: 0,
            api_calls: None,
            results: Vec::new(),
        }
    }

    pub fn record(&mut self, row_number: usize, outcome: ImportOutcome) {
        match &outcome {
            ImportOutcome::Created { .. } => self.created += 1,
            ImportOutcome::Skipped { .. } => self.skipped += 1,
            ImportOutcome::Failed { .. } => self.failed += 1,
        }
        self.results.push(ImportResult { row_number, outcome });
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn problems(&self) -> impl Iterator<Item = &ImportResult> {
        self.results
            .iter()
            .filter(|r| !matches!(r.outcome, ImportOutcome::Created { .. }))
    }

    /// Human-readable report
    pub fn render_report(&self) -> String {
        let mut report = String::new();
        report.push_str(&format!("=== {} import ===\n", self.kind.plural()));
        report.push_str(&format!("Rows processed: {}\n", self.total()));
        report.push_str(&format!("Created: {}\n", self.created));
        report.push_str(&format!("Skipped: {}\n", self.skipped));
        report.push_str(&format!("Failed: {}\n", self.failed));
        if let Some(calls) = self.api_calls {
            report.push_str(&format!("API calls: {}\n", calls));
        }

        let problems: Vec<&ImportResult> = self.problems().collect();
        if !problems.is_empty() {
            report.push_str("\nProblems:\n");
            for result in problems.iter().take(REPORT_ISSUE_LIMIT) {
                let row = result.row_number;
                let line = match &result.outcome {
                    ImportOutcome::Skipped { reason, issues } if !issues.is_empty() => {
                        let detail: Vec<String> = issues.iter().map(ToString::to_string).collect();
                        format!("  Row {}: skipped, {}: {}\n", row, reason, detail.join("; "))
                    }
                    ImportOutcome::Skipped { reason, .. } => {
                        format!("  Row {}: skipped, {}\n", row, reason)
                    }
                    ImportOutcome::Failed { error } => {
                        format!("  Row {}: failed, {}\n", row, error)
                    }
                    ImportOutcome::Created { .. } => continue,
                };
                report.push_str(&line);
            }
            if problems.len() > REPORT_ISSUE_LIMIT {
                let hidden = problems.len() - REPORT_ISSUE_LIMIT;
                report.push_str(&format!("  ... and {} more\n", hidden));
            }
        }

        report
    }
}
