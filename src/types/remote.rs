//! Syncro REST API records and request payloads

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ==========================================================================
// Pagination
// ==========================================================================

/// `meta` block attached to every paginated Syncro listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub next_page: Option<u32>,
}

impl PageMeta {
    /// The page to request after `current`, or `None` when the listing is done.
    ///
    /// `next_page` wins whenever the server sends it. Older endpoints only
    /// report `page`/`total_pages`, which is still an explicit signal.
    pub fn continuation(&self, current: u32) -> Option<u32> {
        if let Some(next) = self.next_page {
            return Some(next);
        }
        match (self.page, self.total_pages) {
            (Some(page), Some(total)) if page < total => Some(page + 1),
            (None, Some(total)) if current < total => Some(current + 1),
            _ => None,
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, meta: PageMeta) -> Self {
        Self { items, meta }
    }

    /// A page that tells the caller nothing follows it
    pub fn last(items: Vec<T>) -> Self {
        Self { items, meta: PageMeta::default() }
    }
}

// ==========================================================================
// Listed entities
// ==========================================================================

/// A Syncro user. `/users` answers with `[id, name]` pairs on some tenants
/// and with objects on others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTech {
    pub id: i64,
    pub name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TechRecord {
    Pair(i64, Option<String>),
    Object {
        id: i64,
        #[serde(default)]
        full_name: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
}

impl<'de> Deserialize<'de> for RemoteTech {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tech = match TechRecord::deserialize(deserializer)? {
            TechRecord::Pair(id, name) => RemoteTech { id, name: name.unwrap_or_default() },
            TechRecord::Object { id, full_name, name } => RemoteTech {
                id,
                name: full_name.or(name).unwrap_or_default(),
            },
        };
        Ok(tech)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteCustomer {
    pub id: i64,
    #[serde(default)]
    pub business_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteContact {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub customer_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LaborProduct {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteComment {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteTicket {
    pub id: i64,
    #[serde(default, deserialize_with = "string_or_number")]
    pub number: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<FixedOffset>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub comments: Vec<RemoteComment>,
}

impl RemoteTicket {
    pub fn has_comment_body(&self, body: &str) -> bool {
        let body = body.trim();
        self.comments
            .iter()
            .filter_map(|c| c.body.as_deref())
            .any(|existing| existing.trim() == body)
    }
}

/// Ticket numbers come back as JSON numbers or strings depending on the tenant
fn string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Raw::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ==========================================================================
// Create payloads
// ==========================================================================

/// `POST /tickets`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketPayload {
    pub customer_id: String,
    pub subject: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    pub status: String,
    pub problem_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    pub created_at: DateTime<Utc>,
    pub comments_attributes: Vec<CommentPayload>,
}

/// `POST /tickets/{id}/comment`, also used for the initial issue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentPayload {
    pub subject: String,
    pub body: String,
    /// Author name shown in Syncro
    pub tech: String,
    pub created_at: DateTime<FixedOffset>,
    pub hidden: bool,
    pub do_not_email: bool,
}

/// `POST /tickets/{id}/timer_entry`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeEntryPayload {
    pub start_at: DateTime<FixedOffset>,
    pub end_at: DateTime<FixedOffset>,
    pub duration_minutes: u32,
    pub notes: String,
    pub user_id: String,
    pub product_id: String,
    /// Overrides the product's billable default when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billable_override: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tech_deserializes_from_pair_and_object() {
        let techs: Vec<RemoteTech> = serde_json::from_str(
            r#"[[12, "Dana Reyes"],
                {"id": 13, "full_name": "Sam Ortiz"},
                {"id": 14, "name": "Lee"}]"#,
        )
        .unwrap();

        assert_eq!(techs[0], RemoteTech { id: 12, name: "Dana Reyes".into() });
        assert_eq!(techs[1].name, "Sam Ortiz");
        assert_eq!(techs[2].name, "Lee");
    }

    #[test]
    fn ticket_number_accepts_string_or_number() {
        let a: RemoteTicket = serde_json::from_str(r#"{"id": 1, "number": 1042}"#).unwrap();
        let b: RemoteTicket =
            serde_json::from_str(r#"{"id": 2, "number": "1043", "comments": null}"#).unwrap();

        assert_eq!(a.number.as_deref(), Some("1042"));
        assert_eq!(b.number.as_deref(), Some("1043"));
        assert!(b.comments.is_empty());
    }

    #[test]
    fn comment_body_match_ignores_surrounding_whitespace() {
        let ticket: RemoteTicket = serde_json::from_str(
            r#"{"id": 1, "number": "7",
                "comments": [{"subject": "x", "body": "Replaced the toner \n"}]}"#,
        )
        .unwrap();

        assert!(ticket.has_comment_body("Replaced the toner"));
        assert!(!ticket.has_comment_body("Replaced the drum"));
    }

    #[test]
    fn continuation_prefers_next_page() {
        let meta = PageMeta { page: Some(1), total_pages: Some(9), next_page: Some(2) };
        assert_eq!(meta.continuation(1), Some(2));

        let done = PageMeta { page: Some(3), total_pages: Some(3), next_page: None };
        assert_eq!(done.continuation(3), None);
    }

    #[test]
    fn continuation_falls_back_to_total_pages() {
        let meta = PageMeta { page: Some(2), total_pages: Some(4), next_page: None };
        assert_eq!(meta.continuation(2), Some(3));
        assert_eq!(PageMeta::default().continuation(1), None);
    }

    #[test]
    fn time_entry_payload_omits_unset_overrides() {
        let start = DateTime::parse_from_rfc3339("2025-03-04T09:00:00-05:00").unwrap();
        let mut payload = TimeEntryPayload {
            start_at: start,
            end_at: start + chrono::Duration::minutes(45),
            duration_minutes: 45,
            notes: "Replaced fuser".into(),
            user_id: "3".into(),
            product_id: "77".into(),
            billable_override: None,
            hidden: None,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("billable_override").is_none());
        assert!(json.get("hidden").is_none());

        payload.billable_override = Some(false);
        payload.hidden = Some(true);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["billable_override"], false);
        assert_eq!(json["hidden"], true);
    }

    #[test]
    fn ticket_payload_omits_absent_optionals() {
        let payload = TicketPayload {
            customer_id: "10".into(),
            subject: "Printer offline".into(),
            user_id: "3".into(),
            contact_id: None,
            number: None,
            status: "New".into(),
            problem_type: "Hardware".into(),
            priority: None,
            created_at: Utc::now(),
            comments_attributes: vec![],
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("contact_id").is_none());
        assert!(json.get("priority").is_none());
        assert_eq!(json["problem_type"], "Hardware");
    }
}
