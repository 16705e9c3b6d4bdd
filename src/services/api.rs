//! Syncro API abstraction
//!
//! Every remote call the importer makes goes through [`SyncroApi`]:
//! - `SyncroClient` talks to a real tenant over HTTPS
//! - `PacedApi` wraps any implementation with a minimum interval between calls
//! - `MockSyncroApi` (tests only) keeps everything in memory

use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::remote::{
    CommentPayload, LaborProduct, Page, RemoteContact, RemoteCustomer, RemoteTech, RemoteTicket,
    TicketPayload, TimeEntryPayload,
};

#[async_trait]
pub trait SyncroApi: Send + Sync {
    /// `page` is 1-based, as on the wire
    async fn list_techs(&self, page: u32) -> Result<Page<RemoteTech>, ApiError>;

    async fn list_customers(&self, page: u32) -> Result<Page<RemoteCustomer>, ApiError>;

    /// Contacts belonging to one customer
    async fn list_contacts(
        &self,
        customer_id: &str,
        page: u32,
    ) -> Result<Page<RemoteContact>, ApiError>;

    async fn list_issue_types(&self) -> Result<Vec<String>, ApiError>;

    async fn list_statuses(&self) -> Result<Vec<String>, ApiError>;

    async fn list_labor_products(&self) -> Result<Vec<LaborProduct>, ApiError>;

    /// Look a ticket up by its human-facing number. Comments are included.
    async fn find_ticket(&self, number: &str) -> Result<Option<RemoteTicket>, ApiError>;

    /// Up to `limit` tickets, newest first
    async fn list_recent_tickets(&self, limit: usize) -> Result<Vec<RemoteTicket>, ApiError>;

    async fn create_ticket(&self, payload: &TicketPayload) -> Result<RemoteTicket, ApiError>;

    async fn create_comment(
        &self,
        ticket_id: &str,
        payload: &CommentPayload,
    ) -> Result<(), ApiError>;

    async fn create_time_entry(
        &self,
        ticket_id: &str,
        payload: &TimeEntryPayload,
    ) -> Result<(), ApiError>;

    /// Get the name of this implementation
    fn name(&self) -> &'static str;
}
