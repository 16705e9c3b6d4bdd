//! CSV row types, from raw strings to fully resolved records

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, Utc};

use crate::types::remote::{CommentPayload, TicketPayload, TimeEntryPayload};

/// Subject of the comment that carries a ticket's initial issue
pub const INITIAL_ISSUE_SUBJECT: &str = "Initial Issue";

/// Subject of every comment created from the comments CSV
pub const IMPORTED_COMMENT_SUBJECT: &str = "CSV - API Import";

// ==========================================================================
// Raw input
// ==========================================================================

/// One CSV record, headers already lower-cased and trimmed
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    /// 1-based line number in the file, header included
    pub row_number: usize,
    pub fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new(row_number: usize, fields: HashMap<String, String>) -> Self {
        Self { row_number, fields }
    }

    /// Build from column/value pairs
    #[cfg(test)]
    pub fn from_pairs(row_number: usize, pairs: &[(&str, &str)]) -> Self {
        Self {
            row_number,
            fields: pairs.iter().map(|(k, v)| (k.to_lowercase(), v.to_string())).collect(),
        }
    }

    /// Value as written, if the column exists
    pub fn raw(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Trimmed value, `None` when absent or blank
    pub fn get(&self, column: &str) -> Option<&str> {
        self.raw(column).map(str::trim).filter(|v| !v.is_empty())
    }
}

// ==========================================================================
// Validated rows
// ==========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Urgent,
    High,
    Normal,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Urgent,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Priority::Urgent => "Urgent",
            Priority::High => "High",
            Priority::Normal => "Normal",
            Priority::Low => "Low",
        }
    }

    /// Label Syncro stores, e.g. `2 Normal`
    pub fn label(self) -> &'static str {
        match self {
            Priority::Urgent => "0 Urgent",
            Priority::High => "1 High",
            Priority::Normal => "2 Normal",
            Priority::Low => "3 Low",
        }
    }

    /// Exact match against the short name or the Syncro label
    pub fn from_exact(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == raw || p.label() == raw)
    }

    /// Match ignoring case, used to give a better hint on casing errors
    pub fn from_any_case(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(raw) || p.label().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TicketRow {
    pub row_number: usize,
    pub number: Option<String>,
    pub customer: String,
    pub tech: String,
    pub contact: Option<String>,
    pub subject: String,
    pub initial_issue: String,
    pub status: String,
    pub issue_type: String,
    pub priority: Option<Priority>,
    pub occurred_at: DateTime<FixedOffset>,
}

/// Who can see an imported comment. Syncro's public comments email the end
/// user, so only private comments are produced for now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum CommentVisibility {
    #[default]
    Private,
}

impl CommentVisibility {
    pub fn is_hidden(self) -> bool {
        match self {
            CommentVisibility::Private => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentRow {
    pub row_number: usize,
    pub ticket_number: String,
    pub body: String,
    pub author: String,
    pub customer: Option<String>,
    pub created: DateTime<FixedOffset>,
    pub visibility: CommentVisibility,
}

/// One line of the ticket labor CSV
#[derive(Debug, Clone, PartialEq)]
pub struct LaborRow {
    pub row_number: usize,
    pub ticket_number: String,
    /// Order of the entry within its ticket
    pub sequence: i64,
    pub tech: String,
    pub labor_type: String,
    pub minutes: u32,
    pub started_at: DateTime<FixedOffset>,
    pub notes: String,
    pub billable: Option<bool>,
    pub hidden: Option<bool>,
}

impl LaborRow {
    /// Timer entry covering `minutes` from the CSV start time
    pub fn to_payload(&self, user_id: &str, product_id: &str) -> TimeEntryPayload {
        TimeEntryPayload {
            start_at: self.started_at,
            end_at: self.started_at + Duration::minutes(i64::from(self.minutes)),
            duration_minutes: self.minutes,
            notes: self.notes.clone(),
            user_id: user_id.to_string(),
            product_id: product_id.to_string(),
            billable_override: self.billable,
            hidden: self.hidden,
        }
    }
}

// ==========================================================================
// Resolved rows
// ==========================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTicket {
    pub row_number: usize,
    pub number: Option<String>,
    pub customer_id: String,
    pub tech_id: String,
    pub tech_name: String,
    pub contact_id: Option<String>,
    pub contact_name: Option<String>,
    pub subject: String,
    pub initial_issue: String,
    pub status: String,
    pub issue_type: String,
    pub priority: Option<Priority>,
    pub occurred_at: DateTime<FixedOffset>,
}

impl ResolvedTicket {
    /// Ticket creation payload. The ticket itself is stamped with the import
    /// time; the initial issue keeps the time from the CSV.
    pub fn to_payload(&self, imported_at: DateTime<Utc>) -> TicketPayload {
        let author = self.contact_name.clone().unwrap_or_else(|| self.tech_name.clone());

        TicketPayload {
            customer_id: self.customer_id.clone(),
            subject: self.subject.clone(),
            user_id: self.tech_id.clone(),
            contact_id: self.contact_id.clone(),
            number: self.number.clone(),
            status: self.status.clone(),
            problem_type: self.issue_type.clone(),
            priority: self.priority.map(|p| p.label().to_string()),
            created_at: imported_at,
            comments_attributes: vec![CommentPayload {
                subject: INITIAL_ISSUE_SUBJECT.to_string(),
                body: self.initial_issue.clone(),
                tech: author,
                created_at: self.occurred_at,
                hidden: true,
                do_not_email: true,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedComment {
    pub row_number: usize,
    pub ticket_id: String,
    pub ticket_number: String,
    pub author: String,
    pub body: String,
    pub created: DateTime<FixedOffset>,
    pub visibility: CommentVisibility,
}

impl ResolvedComment {
    pub fn to_payload(&self) -> CommentPayload {
        CommentPayload {
            subject: IMPORTED_COMMENT_SUBJECT.to_string(),
            body: self.body.clone(),
            tech: self.author.clone(),
            created_at: self.created,
            hidden: self.visibility.is_hidden(),
            do_not_email: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn resolved(contact: Option<&str>) -> ResolvedTicket {
        ResolvedTicket {
            row_number: 2,
            number: Some("1042".into()),
            customer_id: "10".into(),
            tech_id: "3".into(),
            tech_name: "Dana Reyes".into(),
            contact_id: contact.map(|_| "100".into()),
            contact_name: contact.map(str::to_string),
            subject: "Printer offline".into(),
            initial_issue: "Printer shows error 49".into(),
            status: "New".into(),
            issue_type: "Hardware".into(),
            priority: Some(Priority::High),
            occurred_at: FixedOffset::west_opt(5 * 3600)
                .unwrap()
                .with_ymd_and_hms(2025, 1, 2, 9, 30, 0)
                .unwrap(),
        }
    }

    #[test]
    fn raw_row_treats_whitespace_as_blank() {
        let row = RawRow::from_pairs(2, &[("Ticket Customer", "  "), ("tech", " Dana ")]);
        assert_eq!(row.raw("ticket customer"), Some("  "));
        assert_eq!(row.get("ticket customer"), None);
        assert_eq!(row.get("tech"), Some("Dana"));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn priority_matches_names_and_labels_exactly() {
        assert_eq!(Priority::from_exact("High"), Some(Priority::High));
        assert_eq!(Priority::from_exact("3 Low"), Some(Priority::Low));
        assert_eq!(Priority::from_exact("high"), None);
        assert_eq!(Priority::from_any_case("high"), Some(Priority::High));
        assert_eq!(Priority::from_any_case("Critical"), None);
    }

    #[test]
    fn ticket_payload_keeps_csv_time_on_initial_issue() {
        let ticket = resolved(Some("Wile E. Coyote"));
        let imported_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let payload = ticket.to_payload(imported_at);
        let issue = &payload.comments_attributes[0];

        assert_eq!(payload.created_at, imported_at);
        assert_eq!(issue.created_at, ticket.occurred_at);
        assert_eq!(issue.subject, INITIAL_ISSUE_SUBJECT);
        assert_eq!(issue.tech, "Wile E. Coyote");
        assert!(issue.hidden && issue.do_not_email);
        assert_eq!(payload.priority.as_deref(), Some("1 High"));
    }

    #[test]
    fn initial_issue_falls_back_to_tech_as_author() {
        let payload = resolved(None).to_payload(Utc::now());
        assert_eq!(payload.comments_attributes[0].tech, "Dana Reyes");
        assert!(payload.contact_id.is_none());
    }

    #[test]
    fn labor_payload_ends_after_duration() {
        let row = LaborRow {
            row_number: 4,
            ticket_number: "1042".into(),
            sequence: 1,
            tech: "Dana Reyes".into(),
            labor_type: "Labor - Onsite".into(),
            minutes: 90,
            started_at: FixedOffset::west_opt(5 * 3600)
                .unwrap()
                .with_ymd_and_hms(2025, 1, 2, 23, 0, 0)
                .unwrap(),
            notes: "Rack install".into(),
            billable: Some(true),
            hidden: None,
        };

        let payload = row.to_payload("3", "77");
        assert_eq!(payload.end_at.to_rfc3339(), "2025-01-03T00:30:00-05:00");
        assert_eq!(payload.duration_minutes, 90);
        assert_eq!((payload.user_id.as_str(), payload.product_id.as_str()), ("3", "77"));
        assert_eq!(payload.billable_override, Some(true));
        assert_eq!(payload.hidden, None);
    }

    #[test]
    fn comment_payload_is_private_and_silent() {
        let comment = ResolvedComment {
            row_number: 3,
            ticket_id: "5001".into(),
            ticket_number: "1042".into(),
            author: "Hank Scorpio".into(),
            body: "Swapped the fuser".into(),
            created: FixedOffset::west_opt(4 * 3600)
                .unwrap()
                .with_ymd_and_hms(2025, 7, 4, 9, 0, 0)
                .unwrap(),
            visibility: CommentVisibility::Private,
        };

        let payload = comment.to_payload();
        assert_eq!(payload.subject, IMPORTED_COMMENT_SUBJECT);
        assert!(payload.hidden);
        assert!(payload.do_not_email);
        assert_eq!(payload.created_at.to_rfc3339(), "2025-07-04T09:00:00-04:00");
    }
}
