//! Reference resolution
//!
//! Turns validated rows into records that only carry Syncro identifiers.
//! Names go through the entity cache; ticket numbers are looked up remotely
//! once per run and remembered, together with the comment bodies already on
//! each ticket.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{ApiError, CacheError, ResolutionError};
use crate::services::api::SyncroApi;
use crate::services::entity_cache::{CacheEntry, EntityCache, Lookup};
use crate::types::remote::{RemoteComment, RemoteTicket};
use crate::types::rows::{CommentRow, ResolvedComment, ResolvedTicket, TicketRow};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Row-local, the row is skipped
    #[error(transparent)]
    Unresolved(#[from] ResolutionError),

    /// A single remote lookup failed, the row fails
    #[error(transparent)]
    Remote(#[from] ApiError),

    /// Cache population failed, the run stops
    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub struct Resolver<'a, A: SyncroApi + ?Sized> {
    api: &'a A,
    cache: &'a mut EntityCache,
    tickets: HashMap<String, Option<RemoteTicket>>,
}

impl<'a, A: SyncroApi + ?Sized> Resolver<'a, A> {
    pub fn new(api: &'a A, cache: &'a mut EntityCache) -> Self {
        Self { api, cache, tickets: HashMap::new() }
    }

    pub fn cache_mut(&mut self) -> &mut EntityCache {
        &mut *self.cache
    }

    /// Resolve one name to its cache entry or fail with the CSV field it came from
    pub async fn require(
        &mut self,
        lookup: Lookup<'_>,
        field: &str,
        raw: &str,
    ) -> Result<CacheEntry, ResolveError> {
        match self.cache.resolve(self.api, lookup).await? {
            Some(entry) => Ok(entry),
            None => Err(ResolutionError::new(field, raw).into()),
        }
    }

    pub async fn resolve_ticket(
        &mut self,
        row: &TicketRow,
    ) -> Result<ResolvedTicket, ResolveError> {
        let customer = self
            .require(Lookup::Customer(&row.customer), "customer", &row.customer)
            .await?;
        let tech = self.require(Lookup::Tech(&row.tech), "tech", &row.tech).await?;

        let contact = match &row.contact {
            Some(name) => {
                let lookup = Lookup::Contact { customer_id: &customer.remote_id, name };
                Some(self.require(lookup, "contact", name).await?)
            }
            None => None,
        };

        let issue_type = self
            .require(Lookup::IssueType(&row.issue_type), "issue type", &row.issue_type)
            .await?;
        let status = self.require(Lookup::Status(&row.status), "status", &row.status).await?;

        debug!(
            "Row {} resolved to customer {} tech {}",
            row.row_number, customer.remote_id, tech.remote_id
        );

        Ok(ResolvedTicket {
            row_number: row.row_number,
            number: row.number.clone(),
            customer_id: customer.remote_id,
            tech_id: tech.remote_id,
            tech_name: tech.display_name,
            contact_id: contact.as_ref().map(|c| c.remote_id.clone()),
            contact_name: contact.map(|c| c.display_name),
            subject: row.subject.clone(),
            initial_issue: row.initial_issue.clone(),
            status: status.remote_id,
            issue_type: issue_type.remote_id,
            priority: row.priority,
            occurred_at: row.occurred_at,
        })
    }

    pub async fn resolve_comment(
        &mut self,
        row: &CommentRow,
    ) -> Result<ResolvedComment, ResolveError> {
        let ticket_id = match self.lookup_ticket(&row.ticket_number).await? {
            Some(ticket) => ticket.id.to_string(),
            None => return Err(ResolutionError::new("ticket", &row.ticket_number).into()),
        };

        let author = match &row.customer {
            Some(customer_name) => {
                let customer = self
                    .require(Lookup::Customer(customer_name), "customer", customer_name)
                    .await?;
                let lookup = Lookup::Contact {
                    customer_id: &customer.remote_id,
                    name: &row.author,
                };
                self.require(lookup, "comment contact", &row.author).await?.display_name
            }
            None => row.author.clone(),
        };

        Ok(ResolvedComment {
            row_number: row.row_number,
            ticket_id,
            ticket_number: row.ticket_number.clone(),
            author,
            body: row.body.clone(),
            created: row.created,
            visibility: row.visibility,
        })
    }

    /// Comment for a ticket created earlier in this run. The author becomes
    /// the matching contact's display name when the row's customer has one;
    /// otherwise the name is kept as written.
    pub async fn resolve_thread_comment(
        &mut self,
        row: &CommentRow,
        ticket_id: &str,
    ) -> Result<ResolvedComment, ResolveError> {
        let mut author = row.author.clone();
        if let Some(customer_name) = &row.customer {
            match self.cache.resolve(self.api, Lookup::Customer(customer_name)).await? {
                Some(customer) => {
                    let lookup = Lookup::Contact {
                        customer_id: &customer.remote_id,
                        name: &row.author,
                    };
                    match self.cache.resolve(self.api, lookup).await? {
                        Some(contact) => author = contact.display_name,
                        None => warn!(
                            "Row {}: '{}' is not a contact of '{}', keeping the name as written",
                            row.row_number, row.author, customer_name
                        ),
                    }
                }
                None => warn!(
                    "Row {}: customer '{}' not found, keeping comment owner '{}'",
                    row.row_number, customer_name, row.author
                ),
            }
        }

        Ok(ResolvedComment {
            row_number: row.row_number,
            ticket_id: ticket_id.to_string(),
            ticket_number: row.ticket_number.clone(),
            author,
            body: row.body.clone(),
            created: row.created,
            visibility: row.visibility,
        })
    }

    /// Remote ticket by number, fetched at most once per run
    pub async fn lookup_ticket(&mut self, number: &str) -> Result<Option<&RemoteTicket>, ApiError> {
        if !self.tickets.contains_key(number) {
            let found = self.api.find_ticket(number).await?;
            debug!("Ticket {} {}", number, if found.is_some() { "found" } else { "not found" });
            self.tickets.insert(number.to_string(), found);
        }
        Ok(self.tickets.get(number).and_then(Option::as_ref))
    }

    /// Whether `body` is already on the ticket, as fetched or as created in this run
    pub fn has_comment(&self, ticket_number: &str, body: &str) -> bool {
        self.tickets
            .get(ticket_number)
            .and_then(Option::as_ref)
            .is_some_and(|t| t.has_comment_body(body))
    }

    /// Record a ticket created in this run. `number` is the one the ticket
    /// was created with; Syncro's response does not always echo it back.
    pub fn remember_ticket(&mut self, number: Option<String>, mut ticket: RemoteTicket) {
        let Some(number) = number.or_else(|| ticket.number.clone()) else {
            debug!("Created ticket {} has no number, not remembered", ticket.id);
            return;
        };
        ticket.number.get_or_insert_with(|| number.clone());
        self.tickets.insert(number, Some(ticket));
    }

    pub fn remember_comment(&mut self, ticket_number: &str, body: &str) {
        if let Some(Some(ticket)) = self.tickets.get_mut(ticket_number) {
            ticket.comments.push(RemoteComment { subject: None, body: Some(body.to_string()) });
        }
    }
}
