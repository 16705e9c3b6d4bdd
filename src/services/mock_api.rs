//! In-memory Syncro tenant for tests
//!
//! Serves listings in pages of `page_size`, records every create call and can
//! be told to reject specific tickets so failure isolation can be exercised.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::ApiError;
use crate::services::api::SyncroApi;
use crate::types::remote::{
    CommentPayload, LaborProduct, Page, PageMeta, RemoteComment, RemoteContact, RemoteCustomer,
    RemoteTech, RemoteTicket, TicketPayload, TimeEntryPayload,
};

const DEFAULT_PAGE_SIZE: usize = 25;

#[derive(Default)]
struct MockState {
    techs: Vec<RemoteTech>,
    customers: Vec<RemoteCustomer>,
    contacts: Vec<RemoteContact>,
    issue_types: Vec<String>,
    statuses: Vec<String>,
    labor_products: Vec<LaborProduct>,
    tickets: Vec<RemoteTicket>,
    next_ticket_id: i64,
    rejected_subjects: HashSet<String>,
    omit_created_numbers: bool,
    calls: HashMap<&'static str, usize>,
    created_tickets: Vec<TicketPayload>,
    created_comments: Vec<(String, CommentPayload)>,
    created_time_entries: Vec<(String, TimeEntryPayload)>,
}

pub struct MockSyncroApi {
    state: Mutex<MockState>,
    page_size: usize,
}

impl MockSyncroApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState { next_ticket_id: 5000, ..Default::default() }),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_tech(self, id: i64, name: &str) -> Self {
        self.state.lock().techs.push(RemoteTech { id, name: name.into() });
        self
    }

    pub fn with_customer(self, id: i64, name: &str) -> Self {
        self.state.lock().customers.push(RemoteCustomer { id, business_name: Some(name.into()) });
        self
    }

    pub fn with_contact(self, id: i64, customer_id: i64, name: &str) -> Self {
        self.state.lock().contacts.push(RemoteContact {
            id,
            name: Some(name.into()),
            customer_id: Some(customer_id),
        });
        self
    }

    pub fn with_issue_types(self, names: &[&str]) -> Self {
        self.state.lock().issue_types.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn with_statuses(self, names: &[&str]) -> Self {
        self.state.lock().statuses.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn with_labor_product(self, id: i64, name: &str) -> Self {
        self.state.lock().labor_products.push(LaborProduct {
            id,
            name: name.into(),
            disabled: false,
        });
        self
    }

    pub fn with_ticket(self, id: i64, number: &str, comment_bodies: &[&str]) -> Self {
        self.state.lock().tickets.push(RemoteTicket {
            id,
            number: Some(number.into()),
            subject: Some(format!("Ticket {}", number)),
            created_at: None,
            comments: comment_bodies
                .iter()
                .map(|b| RemoteComment { subject: None, body: Some(b.to_string()) })
                .collect(),
        });
        self
    }

    /// `create_ticket` answers 422 for payloads with this subject
    pub fn reject_ticket_subject(self, subject: &str) -> Self {
        self.state.lock().rejected_subjects.insert(subject.into());
        self
    }

    /// `create_ticket` answers without a `number`, as some tenants do
    pub fn omit_created_numbers(self) -> Self {
        self.state.lock().omit_created_numbers = true;
        self
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state.lock().calls.get(method).copied().unwrap_or(0)
    }

    pub fn created_tickets(&self) -> Vec<TicketPayload> {
        self.state.lock().created_tickets.clone()
    }

    pub fn created_comments(&self) -> Vec<(String, CommentPayload)> {
        self.state.lock().created_comments.clone()
    }

    pub fn created_time_entries(&self) -> Vec<(String, TimeEntryPayload)> {
        self.state.lock().created_time_entries.clone()
    }

    fn record(&self, method: &'static str) {
        *self.state.lock().calls.entry(method).or_default() += 1;
    }

    fn paginate<T: Clone>(&self, items: &[T], page: u32) -> Page<T> {
        let start = (page.saturating_sub(1) as usize) * self.page_size;
        let slice: Vec<T> = items.iter().skip(start).take(self.page_size).cloned().collect();
        let has_more = start + self.page_size < items.len();
        let total_pages = items.len().div_ceil(self.page_size).max(1) as u32;

        Page::new(
            slice,
            PageMeta {
                page: Some(page),
                total_pages: Some(total_pages),
                next_page: has_more.then_some(page + 1),
            },
        )
    }
}

impl Default for MockSyncroApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncroApi for MockSyncroApi {
    async fn list_techs(&self, page: u32) -> Result<Page<RemoteTech>, ApiError> {
        self.record("list_techs");
        let techs = self.state.lock().techs.clone();
        Ok(self.paginate(&techs, page))
    }

    async fn list_customers(&self, page: u32) -> Result<Page<RemoteCustomer>, ApiError> {
        self.record("list_customers");
        let customers = self.state.lock().customers.clone();
        Ok(self.paginate(&customers, page))
    }

    async fn list_contacts(
        &self,
        customer_id: &str,
        page: u32,
    ) -> Result<Page<RemoteContact>, ApiError> {
        self.record("list_contacts");
        let contacts: Vec<RemoteContact> = self
            .state
            .lock()
            .contacts
            .iter()
            .filter(|c| c.customer_id.map(|id| id.to_string()).as_deref() == Some(customer_id))
            .cloned()
            .collect();
        Ok(self.paginate(&contacts, page))
    }

    async fn list_issue_types(&self) -> Result<Vec<String>, ApiError> {
        self.record("list_issue_types");
        Ok(self.state.lock().issue_types.clone())
    }

    async fn list_statuses(&self) -> Result<Vec<String>, ApiError> {
        self.record("list_statuses");
        Ok(self.state.lock().statuses.clone())
    }

    async fn list_labor_products(&self) -> Result<Vec<LaborProduct>, ApiError> {
        self.record("list_labor_products");
        Ok(self.state.lock().labor_products.clone())
    }

    async fn find_ticket(&self, number: &str) -> Result<Option<RemoteTicket>, ApiError> {
        self.record("find_ticket");
        let state = self.state.lock();
        Ok(state.tickets.iter().find(|t| t.number.as_deref() == Some(number)).cloned())
    }

    async fn list_recent_tickets(&self, limit: usize) -> Result<Vec<RemoteTicket>, ApiError> {
        self.record("list_recent_tickets");
        let mut tickets = self.state.lock().tickets.clone();
        tickets.sort_by(|a, b| b.id.cmp(&a.id));
        tickets.truncate(limit);
        Ok(tickets)
    }

    async fn create_ticket(&self, payload: &TicketPayload) -> Result<RemoteTicket, ApiError> {
        self.record("create_ticket");
        let mut state = self.state.lock();

        if state.rejected_subjects.contains(&payload.subject) {
            return Err(ApiError::Status {
                status: 422,
                body: r#"{"message":["Subject rejected"]}"#.into(),
            });
        }

        state.next_ticket_id += 1;
        let id = state.next_ticket_id;
        let number = payload.number.clone().unwrap_or_else(|| id.to_string());
        let ticket = RemoteTicket {
            id,
            number: Some(number),
            subject: Some(payload.subject.clone()),
            created_at: None,
            comments: payload
                .comments_attributes
                .iter()
                .map(|c| RemoteComment {
                    subject: Some(c.subject.clone()),
                    body: Some(c.body.clone()),
                })
                .collect(),
        };
        state.tickets.push(ticket.clone());
        state.created_tickets.push(payload.clone());
        if state.omit_created_numbers {
            return Ok(RemoteTicket { number: None, ..ticket });
        }
        Ok(ticket)
    }

    async fn create_comment(
        &self,
        ticket_id: &str,
        payload: &CommentPayload,
    ) -> Result<(), ApiError> {
        self.record("create_comment");
        self.state.lock().created_comments.push((ticket_id.to_string(), payload.clone()));
        Ok(())
    }

    async fn create_time_entry(
        &self,
        ticket_id: &str,
        payload: &TimeEntryPayload,
    ) -> Result<(), ApiError> {
        self.record("create_time_entry");
        self.state.lock().created_time_entries.push((ticket_id.to_string(), payload.clone()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
