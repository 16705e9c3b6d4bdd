//! Row validation
//!
//! Runs before anything touches the API. A row either becomes a typed
//! `TicketRow`/`CommentRow`/`LaborRow` or is rejected with every problem it
//! has, so the operator can fix the whole line at once.

use chrono::{DateTime, FixedOffset};
use tracing::warn;

use crate::error::{FieldIssue, ValidationError};
use crate::services::timestamp::TimestampNormalizer;
use crate::types::rows::{
    CommentRow, CommentVisibility, LaborRow, Priority, RawRow, TicketRow,
};

// ==========================================================================
// Column layouts
// ==========================================================================

/// Header names of the tickets CSV (lower-case)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketColumns {
    pub number: String,
    pub customer: String,
    pub tech: String,
    pub contact: String,
    pub subject: String,
    pub initial_issue: String,
    pub status: String,
    pub issue_type: String,
    pub priority: String,
    pub created: String,
}

impl Default for TicketColumns {
    fn default() -> Self {
        Self {
            number: "ticket number".into(),
            customer: "ticket customer".into(),
            tech: "tech".into(),
            contact: "ticket contact".into(),
            subject: "ticket subject".into(),
            initial_issue: "ticket initial issue".into(),
            status: "ticket status".into(),
            issue_type: "ticket issue type".into(),
            priority: "ticket priority".into(),
            created: "ticket created".into(),
        }
    }
}

impl TicketColumns {
    pub fn required(&self) -> Vec<&str> {
        vec![
            &self.customer,
            &self.tech,
            &self.subject,
            &self.initial_issue,
            &self.status,
            &self.issue_type,
            &self.created,
        ]
    }
}

/// Header names of the comments CSV (lower-case)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentColumns {
    pub ticket_number: String,
    pub body: String,
    pub author: String,
    pub created: String,
    pub customer: String,
}

impl Default for CommentColumns {
    fn default() -> Self {
        Self {
            ticket_number: "ticket number".into(),
            body: "ticket comment".into(),
            author: "comment contact".into(),
            created: "comment created".into(),
            customer: "ticket customer".into(),
        }
    }
}

impl CommentColumns {
    pub fn required(&self) -> Vec<&str> {
        vec![&self.ticket_number, &self.body, &self.author, &self.created]
    }
}

/// Header names of the combined tickets-and-comments CSV (lower-case).
///
/// Every row carries the ticket columns; only the earliest row of a ticket
/// uses them. `timestamp` orders a ticket's rows and dates its comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedColumns {
    pub ticket_number: String,
    pub customer: String,
    pub tech: String,
    pub end_user: String,
    pub subject: String,
    pub description: String,
    pub timestamp: String,
    pub body: String,
    pub owner: String,
    pub status: String,
    pub issue_type: String,
    pub created: String,
    pub priority: String,
}

impl Default for CombinedColumns {
    fn default() -> Self {
        Self {
            ticket_number: "ticket number".into(),
            customer: "ticket customer".into(),
            tech: "tech".into(),
            end_user: "end user".into(),
            subject: "ticket subject".into(),
            description: "ticket description".into(),
            timestamp: "timestamp".into(),
            body: "email body".into(),
            owner: "comment owner".into(),
            status: "ticket status".into(),
            issue_type: "ticket issue type".into(),
            created: "ticket created date".into(),
            priority: "ticket priority".into(),
        }
    }
}

impl CombinedColumns {
    pub fn required(&self) -> Vec<&str> {
        vec![
            &self.ticket_number,
            &self.customer,
            &self.tech,
            &self.subject,
            &self.timestamp,
            &self.body,
            &self.status,
            &self.issue_type,
        ]
    }
}

/// Header names of the ticket labor CSV (lower-case)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaborColumns {
    pub ticket_number: String,
    pub sequence: String,
    pub tech: String,
    pub minutes: String,
    pub labor_type: String,
    pub created: String,
    pub notes: String,
    pub billable: String,
    pub visibility: String,
}

impl Default for LaborColumns {
    fn default() -> Self {
        Self {
            ticket_number: "ticket number".into(),
            sequence: "entry sequence".into(),
            tech: "tech".into(),
            minutes: "duration minutes".into(),
            labor_type: "labor type".into(),
            created: "created at".into(),
            notes: "notes".into(),
            billable: "billable status".into(),
            visibility: "visibility".into(),
        }
    }
}

impl LaborColumns {
    pub fn required(&self) -> Vec<&str> {
        vec![
            &self.ticket_number,
            &self.tech,
            &self.minutes,
            &self.labor_type,
            &self.created,
        ]
    }
}

// ==========================================================================
// Validator
// ==========================================================================

#[derive(Debug, Clone)]
pub struct RowValidator {
    normalizer: TimestampNormalizer,
    tickets: TicketColumns,
    comments: CommentColumns,
    combined: CombinedColumns,
    labor: LaborColumns,
    known_statuses: Vec<String>,
}

impl RowValidator {
    pub fn new(normalizer: TimestampNormalizer) -> Self {
        Self {
            normalizer,
            tickets: TicketColumns::default(),
            comments: CommentColumns::default(),
            combined: CombinedColumns::default(),
            labor: LaborColumns::default(),
            known_statuses: Vec::new(),
        }
    }

    /// Statuses the tenant knows, used to flag case-only mismatches
    pub fn set_known_statuses(&mut self, statuses: Vec<String>) {
        self.known_statuses = statuses;
    }

    pub fn normalizer(&self) -> &TimestampNormalizer {
        &self.normalizer
    }

    pub fn ticket_columns(&self) -> &TicketColumns {
        &self.tickets
    }

    pub fn comment_columns(&self) -> &CommentColumns {
        &self.comments
    }

    pub fn combined_columns(&self) -> &CombinedColumns {
        &self.combined
    }

    pub fn labor_columns(&self) -> &LaborColumns {
        &self.labor
    }

    pub fn validate_ticket(&self, row: &RawRow) -> Result<TicketRow, ValidationError> {
        let cols = &self.tickets;
        let mut check = FieldCheck::new(row, &self.normalizer);

        let customer = check.required(&cols.customer);
        let tech = check.required(&cols.tech);
        let subject = check.required(&cols.subject);
        let initial_issue = check.required(&cols.initial_issue);
        let status = check.required(&cols.status);
        let issue_type = check.required(&cols.issue_type);
        let occurred_at = check.required_date(&cols.created);
        let number = check.ticket_number(&cols.number, false);
        let contact = row.get(&cols.contact).map(str::to_string);
        let priority = check.priority(&cols.priority);

        if let Some(status) = &status {
            check.status_casing(&cols.status, status, &self.known_statuses);
        }

        let (
            Some(customer),
            Some(tech),
            Some(subject),
            Some(initial_issue),
            Some(status),
            Some(issue_type),
            Some(occurred_at),
        ) = (customer, tech, subject, initial_issue, status, issue_type, occurred_at)
        else {
            return Err(check.into_error());
        };
        if check.has_issues() {
            return Err(check.into_error());
        }

        Ok(TicketRow {
            row_number: row.row_number,
            number,
            customer,
            tech,
            contact,
            subject,
            initial_issue,
            status,
            issue_type,
            priority,
            occurred_at,
        })
    }

    pub fn validate_comment(&self, row: &RawRow) -> Result<CommentRow, ValidationError> {
        let cols = &self.comments;
        let mut check = FieldCheck::new(row, &self.normalizer);

        let ticket_number = check.ticket_number(&cols.ticket_number, true);
        let body = check.required(&cols.body);
        let author = check.required(&cols.author);
        let created = check.required_date(&cols.created);
        let customer = row.get(&cols.customer).map(str::to_string);

        let (Some(ticket_number), Some(body), Some(author), Some(created)) =
            (ticket_number, body, author, created)
        else {
            return Err(check.into_error());
        };
        if check.has_issues() {
            return Err(check.into_error());
        }

        Ok(CommentRow {
            row_number: row.row_number,
            ticket_number,
            body,
            author,
            customer,
            created,
            visibility: CommentVisibility::Private,
        })
    }

    /// Ticket number and timestamp of a combined row, the two values needed
    /// to place it in its ticket's timeline
    pub fn validate_combined_key(
        &self,
        row: &RawRow,
    ) -> Result<(String, DateTime<FixedOffset>), ValidationError> {
        let cols = &self.combined;
        let mut check = FieldCheck::new(row, &self.normalizer);

        let ticket_number = check.ticket_number(&cols.ticket_number, true);
        let timestamp = check.required_date(&cols.timestamp);

        match (ticket_number, timestamp) {
            (Some(number), Some(timestamp)) => Ok((number, timestamp)),
            _ => Err(check.into_error()),
        }
    }

    /// The earliest combined row of a ticket, read as the ticket itself.
    ///
    /// The initial issue is the description, or the email body when the
    /// description is blank. It is dated by the ticket created date when one
    /// is given, otherwise by the row's timestamp.
    pub fn validate_combined_ticket(
        &self,
        row: &RawRow,
        ticket_number: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<TicketRow, ValidationError> {
        let cols = &self.combined;
        let mut check = FieldCheck::new(row, &self.normalizer);

        let customer = check.required(&cols.customer);
        let tech = check.required(&cols.tech);
        let subject = check.required(&cols.subject);
        let status = check.required(&cols.status);
        let issue_type = check.required(&cols.issue_type);
        let initial_issue = match row.get(&cols.description).or_else(|| row.get(&cols.body)) {
            Some(text) => Some(text.to_string()),
            None => {
                check.issue(&cols.description, "ticket description and email body are both blank");
                None
            }
        };
        let occurred_at = check.optional_date(&cols.created).unwrap_or(timestamp);
        let contact = row.get(&cols.end_user).map(str::to_string);
        let priority = check.priority(&cols.priority);

        if let Some(status) = &status {
            check.status_casing(&cols.status, status, &self.known_statuses);
        }

        let (
            Some(customer),
            Some(tech),
            Some(subject),
            Some(initial_issue),
            Some(status),
            Some(issue_type),
        ) = (customer, tech, subject, initial_issue, status, issue_type)
        else {
            return Err(check.into_error());
        };
        if check.has_issues() {
            return Err(check.into_error());
        }

        Ok(TicketRow {
            row_number: row.row_number,
            number: Some(ticket_number.to_string()),
            customer,
            tech,
            contact,
            subject,
            initial_issue,
            status,
            issue_type,
            priority,
            occurred_at,
        })
    }

    /// A later combined row of a ticket, read as a comment on it. The author
    /// is the comment owner, falling back to the tech and then the end user.
    pub fn validate_combined_comment(
        &self,
        row: &RawRow,
        ticket_number: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<CommentRow, ValidationError> {
        let cols = &self.combined;
        let mut check = FieldCheck::new(row, &self.normalizer);

        let body = check.required(&cols.body);
        let author = [&cols.owner, &cols.tech, &cols.end_user]
            .into_iter()
            .find_map(|col| row.get(col))
            .map(str::to_string);
        if author.is_none() {
            check.issue(&cols.owner, "no comment owner, tech or end user to credit");
        }

        let (Some(body), Some(author)) = (body, author) else {
            return Err(check.into_error());
        };

        Ok(CommentRow {
            row_number: row.row_number,
            ticket_number: ticket_number.to_string(),
            body,
            author,
            customer: row.get(&cols.customer).map(str::to_string),
            created: timestamp,
            visibility: CommentVisibility::Private,
        })
    }

    pub fn validate_labor(&self, row: &RawRow) -> Result<LaborRow, ValidationError> {
        let cols = &self.labor;
        let mut check = FieldCheck::new(row, &self.normalizer);

        let ticket_number = check.ticket_number(&cols.ticket_number, true);
        let tech = check.required(&cols.tech);
        let labor_type = check.required(&cols.labor_type);
        let minutes = check.minutes(&cols.minutes);
        let started_at = check.required_date(&cols.created);
        let billable = check.flag(&cols.billable, parse_billable_status);
        let hidden = check.flag(&cols.visibility, parse_visibility);
        let sequence = entry_sequence(row, &cols.sequence);

        let (Some(ticket_number), Some(tech), Some(labor_type), Some(minutes), Some(started_at)) =
            (ticket_number, tech, labor_type, minutes, started_at)
        else {
            return Err(check.into_error());
        };
        if check.has_issues() {
            return Err(check.into_error());
        }

        Ok(LaborRow {
            row_number: row.row_number,
            ticket_number,
            sequence,
            tech,
            labor_type,
            minutes,
            started_at,
            notes: row.get(&cols.notes).unwrap_or_default().to_string(),
            billable,
            hidden,
        })
    }
}

/// Keep only the digits of a ticket reference, `#1042` → `1042`
pub fn clean_ticket_number(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    (!digits.is_empty()).then_some(digits)
}

/// Syncro's `hidden` flag from a visibility label
pub fn parse_visibility(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "private" | "internal" | "hidden" => Some(true),
        "public" | "customer" | "external" => Some(false),
        _ => None,
    }
}

/// Billable override from a billable status label
pub fn parse_billable_status(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "billable" | "billed" => Some(true),
        "non-billable" | "non billable" | "not billable" | "unbillable" => Some(false),
        _ => None,
    }
}

/// Entry sequence as a whole number. Spreadsheets export `2` as `2.0`; a
/// blank or unreadable sequence sorts first.
fn entry_sequence(row: &RawRow, field: &str) -> i64 {
    let Some(raw) = row.get(field) else {
        return 0;
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => value as i64,
        _ => {
            warn!("Row {}: {} '{}' is not a number, using 0", row.row_number, field, raw);
            0
        }
    }
}

/// Collects issues for one row
struct FieldCheck<'a> {
    row: &'a RawRow,
    normalizer: &'a TimestampNormalizer,
    issues: Vec<FieldIssue>,
}

impl<'a> FieldCheck<'a> {
    fn new(row: &'a RawRow, normalizer: &'a TimestampNormalizer) -> Self {
        Self {
            row,
            normalizer,
            issues: Vec::new(),
        }
    }

    fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    fn into_error(self) -> ValidationError {
        ValidationError {
            row_number: self.row.row_number,
            issues: self.issues,
        }
    }

    fn issue(&mut self, field: &str, message: impl Into<String>) {
        let original = self.row.raw(field);
        self.issues.push(FieldIssue::new(field, message, original));
    }

    fn required(&mut self, field: &str) -> Option<String> {
        match self.row.get(field) {
            Some(value) => Some(value.to_string()),
            None => {
                self.issue(field, "required field is blank");
                None
            }
        }
    }

    fn required_date(&mut self, field: &str) -> Option<DateTime<FixedOffset>> {
        let raw = self.required(field)?;
        match self.normalizer.normalize(&raw) {
            Ok(instant) => Some(instant),
            Err(e) => {
                self.issue(field, e.to_string());
                None
            }
        }
    }

    fn optional_date(&mut self, field: &str) -> Option<DateTime<FixedOffset>> {
        let raw = self.row.get(field)?.to_string();
        match self.normalizer.normalize(&raw) {
            Ok(instant) => Some(instant),
            Err(e) => {
                self.issue(field, e.to_string());
                None
            }
        }
    }

    fn minutes(&mut self, field: &str) -> Option<u32> {
        let raw = self.required(field)?;
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 1.0 && value <= f64::from(u32::MAX) => {
                Some(value as u32)
            }
            _ => {
                self.issue(field, "duration must be a positive number of minutes");
                None
            }
        }
    }

    /// Optional yes/no column read through `parse`
    fn flag(&mut self, field: &str, parse: fn(&str) -> Option<bool>) -> Option<bool> {
        let raw = self.row.get(field)?.to_string();
        let parsed = parse(&raw);
        if parsed.is_none() {
            self.issue(field, format!("unrecognized value '{}'", raw));
        }
        parsed
    }

    fn ticket_number(&mut self, field: &str, required: bool) -> Option<String> {
        let raw = if required {
            self.required(field)?
        } else {
            self.row.get(field)?.to_string()
        };
        let cleaned = clean_ticket_number(&raw);
        if cleaned.is_none() {
            self.issue(field, "ticket number contains no digits");
        }
        cleaned
    }

    fn priority(&mut self, field: &str) -> Option<Priority> {
        let raw = self.row.get(field)?.to_string();
        if let Some(priority) = Priority::from_exact(&raw) {
            return Some(priority);
        }
        match Priority::from_any_case(&raw) {
            Some(p) => {
                let message = format!("priority casing must be '{}' or '{}'", p.name(), p.label());
                self.issue(field, message);
            }
            None => self.issue(field, "priority must be one of Urgent, High, Normal, Low"),
        }
        None
    }

    fn status_casing(&mut self, field: &str, status: &str, known: &[String]) {
        if known.iter().any(|k| k == status) {
            return;
        }
        if let Some(expected) = known.iter().find(|k| k.eq_ignore_ascii_case(status)) {
            self.issue(field, format!("status casing must match '{}'", expected));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::timestamp::DateLocale;

    fn validator() -> RowValidator {
        let normalizer = TimestampNormalizer::new(DateLocale::Us, chrono_tz::America::New_York);
        let mut v = RowValidator::new(normalizer);
        v.set_known_statuses(vec!["New".into(), "In Progress".into()]);
        v
    }

    fn check_ticket(overrides: &[(&str, &str)]) -> Result<TicketRow, ValidationError> {
        validator().validate_ticket(&ticket_row(overrides))
    }

    fn check_comment(overrides: &[(&str, &str)]) -> Result<CommentRow, ValidationError> {
        validator().validate_comment(&comment_row(overrides))
    }

    fn ticket_row(overrides: &[(&str, &str)]) -> RawRow {
        let mut row = RawRow::from_pairs(
            2,
            &[
                ("ticket number", "#1042"),
                ("ticket customer", "Acme Corp"),
                ("tech", "Dana Reyes"),
                ("ticket contact", "Wile E. Coyote"),
                ("ticket subject", "Printer offline"),
                ("ticket initial issue", "Shows error 49"),
                ("ticket status", "New"),
                ("ticket issue type", "Hardware"),
                ("ticket priority", "High"),
                ("ticket created", "1/2/2025 9:30 AM"),
            ],
        );
        for (k, v) in overrides {
            row.fields.insert(k.to_string(), v.to_string());
        }
        row
    }

    fn comment_row(overrides: &[(&str, &str)]) -> RawRow {
        let mut row = RawRow::from_pairs(
            3,
            &[
                ("ticket number", "1042"),
                ("ticket comment", "Swapped the fuser"),
                ("comment contact", "Hank Scorpio"),
                ("comment created", "1/3/2025 14:05"),
            ],
        );
        for (k, v) in overrides {
            row.fields.insert(k.to_string(), v.to_string());
        }
        row
    }

    #[test]
    fn valid_ticket_row_is_fully_typed() {
        let row = validator().validate_ticket(&ticket_row(&[])).unwrap();

        assert_eq!(row.row_number, 2);
        assert_eq!(row.number.as_deref(), Some("1042"));
        assert_eq!(row.customer, "Acme Corp");
        assert_eq!(row.contact.as_deref(), Some("Wile E. Coyote"));
        assert_eq!(row.priority, Some(Priority::High));
        assert_eq!(row.occurred_at.to_rfc3339(), "2025-01-02T09:30:00-05:00");
    }

    #[test]
    fn optional_ticket_columns_may_be_blank() {
        let row = check_ticket(&[
            ("ticket number", ""),
            ("ticket contact", " "),
            ("ticket priority", ""),
        ])
        .unwrap();

        assert!(row.number.is_none());
        assert!(row.contact.is_none());
        assert!(row.priority.is_none());
    }

    #[test]
    fn blank_required_field_is_named() {
        let err = check_ticket(&[("ticket customer", "   ")]).unwrap_err();

        assert_eq!(err.row_number, 2);
        assert!(err.has_field("ticket customer"));
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].original_value.as_deref(), Some("   "));
    }

    #[test]
    fn all_violations_are_reported_together() {
        let err = validator()
            .validate_ticket(&ticket_row(&[
                ("tech", ""),
                ("ticket created", "next tuesday"),
                ("ticket priority", "high"),
                ("ticket number", "N/A"),
            ]))
            .unwrap_err();

        for field in ["tech", "ticket created", "ticket priority", "ticket number"] {
            assert!(err.has_field(field), "missing issue for {}", field);
        }
    }

    #[test]
    fn priority_casing_is_enforced() {
        let err = check_ticket(&[("ticket priority", "URGENT")]).unwrap_err();
        assert!(err.issues[0].message.contains("'Urgent'"));

        let row = check_ticket(&[("ticket priority", "0 Urgent")]).unwrap();
        assert_eq!(row.priority, Some(Priority::Urgent));

        let err = check_ticket(&[("ticket priority", "Whenever")]).unwrap_err();
        assert!(err.has_field("ticket priority"));
    }

    #[test]
    fn status_differing_only_by_case_is_rejected() {
        let err = check_ticket(&[("ticket status", "in progress")]).unwrap_err();
        assert!(err.has_field("ticket status"));
        assert!(err.issues[0].message.contains("'In Progress'"));

        // Unknown statuses are left for the resolver to report
        assert!(check_ticket(&[("ticket status", "Waiting")]).is_ok());
    }

    #[test]
    fn missing_column_counts_as_blank() {
        let mut row = ticket_row(&[]);
        row.fields.remove("ticket issue type");

        let err = validator().validate_ticket(&row).unwrap_err();
        assert!(err.has_field("ticket issue type"));
        assert_eq!(err.issues[0].original_value, None);
    }

    #[test]
    fn valid_comment_row_is_private() {
        let row = check_comment(&[("ticket customer", "Globex")]).unwrap();

        assert_eq!(row.ticket_number, "1042");
        assert_eq!(row.customer.as_deref(), Some("Globex"));
        assert_eq!(row.visibility, CommentVisibility::Private);
        assert_eq!(row.created.to_rfc3339(), "2025-01-03T14:05:00-05:00");
    }

    #[test]
    fn comment_requires_ticket_number_with_digits() {
        let err = check_comment(&[("ticket number", "")]).unwrap_err();
        assert!(err.has_field("ticket number"));

        let err = check_comment(&[("ticket number", "abc")]).unwrap_err();
        assert_eq!(err.issues[0].message, "ticket number contains no digits");
    }

    #[test]
    fn intl_locale_changes_comment_date() {
        let normalizer = TimestampNormalizer::new(DateLocale::Intl, chrono_tz::America::New_York);
        let v = RowValidator::new(normalizer);
        let row = v.validate_comment(&comment_row(&[("comment created", "1-2-2025")])).unwrap();
        assert_eq!(row.created.to_rfc3339(), "2025-02-01T00:00:00-05:00");
    }

    #[test]
    fn ticket_numbers_are_reduced_to_digits() {
        assert_eq!(clean_ticket_number("#1042").as_deref(), Some("1042"));
        assert_eq!(clean_ticket_number(" T-00917 ").as_deref(), Some("00917"));
        assert_eq!(clean_ticket_number("none"), None);
    }

    fn combined_row(overrides: &[(&str, &str)]) -> RawRow {
        let mut row = RawRow::from_pairs(
            5,
            &[
                ("ticket number", "T-2001"),
                ("ticket customer", "Acme Corp"),
                ("tech", "Dana Reyes"),
                ("end user", "Wile E. Coyote"),
                ("ticket subject", "VPN drops"),
                ("ticket description", "Disconnects every hour"),
                ("timestamp", "3/4/2025 10:15"),
                ("email body", "Can you take a look?"),
                ("comment owner", "Wile E. Coyote"),
                ("ticket status", "New"),
                ("ticket issue type", "Network"),
                ("ticket created date", ""),
                ("ticket priority", "Normal"),
            ],
        );
        for (k, v) in overrides {
            row.fields.insert(k.to_string(), v.to_string());
        }
        row
    }

    fn labor_row(overrides: &[(&str, &str)]) -> RawRow {
        let mut row = RawRow::from_pairs(
            6,
            &[
                ("customer", "Acme Corp"),
                ("ticket number", "#1042"),
                ("entry sequence", "2.0"),
                ("tech", "Dana Reyes"),
                ("duration minutes", "45"),
                ("visibility", "Internal"),
                ("billable status", "Non-Billable"),
                ("labor type", "Labor - Onsite"),
                ("created at", "3/4/2025 13:00"),
                ("notes", "Swapped switch"),
            ],
        );
        for (k, v) in overrides {
            row.fields.insert(k.to_string(), v.to_string());
        }
        row
    }

    #[test]
    fn combined_key_needs_number_and_timestamp() {
        let (number, at) = validator().validate_combined_key(&combined_row(&[])).unwrap();
        assert_eq!(number, "2001");
        assert_eq!(at.to_rfc3339(), "2025-03-04T10:15:00-05:00");

        let err = validator()
            .validate_combined_key(&combined_row(&[("timestamp", "soon"), ("ticket number", "")]))
            .unwrap_err();
        assert!(err.has_field("timestamp"));
        assert!(err.has_field("ticket number"));
    }

    #[test]
    fn combined_first_row_becomes_the_ticket() {
        let v = validator();
        let row = combined_row(&[]);
        let (number, at) = v.validate_combined_key(&row).unwrap();

        let ticket = v.validate_combined_ticket(&row, &number, at).unwrap();
        assert_eq!(ticket.number.as_deref(), Some("2001"));
        assert_eq!(ticket.contact.as_deref(), Some("Wile E. Coyote"));
        assert_eq!(ticket.initial_issue, "Disconnects every hour");
        assert_eq!(ticket.occurred_at, at);
        assert_eq!(ticket.priority, Some(Priority::Normal));

        // created date wins over the timestamp, email body fills a blank description
        let row = combined_row(&[("ticket created date", "3/1/2025"), ("ticket description", "")]);
        let ticket = v.validate_combined_ticket(&row, &number, at).unwrap();
        assert_eq!(ticket.occurred_at.to_rfc3339(), "2025-03-01T00:00:00-05:00");
        assert_eq!(ticket.initial_issue, "Can you take a look?");
    }

    #[test]
    fn combined_ticket_without_any_issue_text_is_rejected() {
        let v = validator();
        let row = combined_row(&[("ticket description", ""), ("email body", " ")]);
        let (number, at) = v.validate_combined_key(&row).unwrap();

        let err = v.validate_combined_ticket(&row, &number, at).unwrap_err();
        assert!(err.has_field("ticket description"));
    }

    #[test]
    fn combined_comment_author_falls_back_to_tech() {
        let v = validator();
        let row = combined_row(&[("comment owner", "")]);
        let (number, at) = v.validate_combined_key(&row).unwrap();

        let comment = v.validate_combined_comment(&row, &number, at).unwrap();
        assert_eq!(comment.author, "Dana Reyes");
        assert_eq!(comment.body, "Can you take a look?");
        assert_eq!(comment.customer.as_deref(), Some("Acme Corp"));
        assert_eq!(comment.created, at);

        let row = combined_row(&[("email body", "")]);
        let err = v.validate_combined_comment(&row, &number, at).unwrap_err();
        assert!(err.has_field("email body"));
    }

    #[test]
    fn labor_row_is_fully_typed() {
        let row = validator().validate_labor(&labor_row(&[])).unwrap();

        assert_eq!(row.ticket_number, "1042");
        assert_eq!(row.sequence, 2);
        assert_eq!(row.minutes, 45);
        assert_eq!(row.started_at.to_rfc3339(), "2025-03-04T13:00:00-05:00");
        assert_eq!(row.billable, Some(false));
        assert_eq!(row.hidden, Some(true));
        assert_eq!(row.notes, "Swapped switch");
    }

    #[test]
    fn labor_row_optional_columns_may_be_blank() {
        let row = validator()
            .validate_labor(&labor_row(&[
                ("entry sequence", "first"),
                ("visibility", ""),
                ("billable status", ""),
                ("notes", ""),
            ]))
            .unwrap();

        assert_eq!(row.sequence, 0);
        assert_eq!(row.hidden, None);
        assert_eq!(row.billable, None);
        assert_eq!(row.notes, "");
    }

    #[test]
    fn labor_row_needs_positive_duration_and_known_labels() {
        let err = validator()
            .validate_labor(&labor_row(&[
                ("duration minutes", "0"),
                ("visibility", "secret"),
                ("billable status", "maybe"),
            ]))
            .unwrap_err();

        for field in ["duration minutes", "visibility", "billable status"] {
            assert!(err.has_field(field), "missing issue for {}", field);
        }
        assert!(validator().validate_labor(&labor_row(&[("duration minutes", "-5")])).is_err());
    }

    #[test]
    fn visibility_and_billable_labels() {
        assert_eq!(parse_visibility(" Public "), Some(false));
        assert_eq!(parse_visibility("hidden"), Some(true));
        assert_eq!(parse_visibility("team"), None);
        assert_eq!(parse_billable_status("Billed"), Some(true));
        assert_eq!(parse_billable_status("not billable"), Some(false));
        assert_eq!(parse_billable_status("n/a"), None);
    }
}
