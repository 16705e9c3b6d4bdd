//! Request pacing
//!
//! Syncro throttles API keys aggressively. Every request the importer makes,
//! whether it is a read, a write or a follow-up page of a listing, draws its
//! slot from one shared [`Pacer`] schedule so that consecutive requests are at
//! least `min_interval` apart.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::ApiError;
use crate::services::api::SyncroApi;
use crate::types::remote::{
    CommentPayload, LaborProduct, Page, RemoteContact, RemoteCustomer, RemoteTech, RemoteTicket,
    TicketPayload, TimeEntryPayload,
};

/// Hands out request slots at least `min_interval` apart.
///
/// Clones share one schedule, so the [`PacedApi`] wrapper and the HTTP client
/// paging through a listing can never send two requests back to back.
#[derive(Debug, Clone)]
pub struct Pacer {
    /// Slot handed to the most recent caller
    last_slot: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_slot: Arc::new(Mutex::new(None)),
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Reserve the next free slot and sleep until it opens.
    ///
    /// The lock is only held while reserving, so concurrent callers queue up
    /// one interval apart instead of waking together.
    pub async fn wait(&self) {
        let slot = {
            let mut last = self.last_slot.lock().await;
            let now = Instant::now();
            let slot = match *last {
                Some(previous) => now.max(previous + self.min_interval),
                None => now,
            };
            *last = Some(slot);
            slot
        };

        if slot > Instant::now() {
            tokio::time::sleep_until(slot).await;
        }
    }
}

/// Paces every call of the wrapped API through a [`Pacer`]
pub struct PacedApi<A> {
    inner: A,
    pacer: Pacer,
}

impl<A: SyncroApi> PacedApi<A> {
    /// Wrap `inner`. Pass a clone of the pacer the inner client pages with, so
    /// both draw from the same schedule.
    pub fn new(inner: A, pacer: Pacer) -> Self {
        Self { inner, pacer }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

#[async_trait]
impl<A: SyncroApi> SyncroApi for PacedApi<A> {
    async fn list_techs(&self, page: u32) -> Result<Page<RemoteTech>, ApiError> {
        self.pacer.wait().await;
        self.inner.list_techs(page).await
    }

    async fn list_customers(&self, page: u32) -> Result<Page<RemoteCustomer>, ApiError> {
        self.pacer.wait().await;
        self.inner.list_customers(page).await
    }

    async fn list_contacts(
        &self,
        customer_id: &str,
        page: u32,
    ) -> Result<Page<RemoteContact>, ApiError> {
        self.pacer.wait().await;
        self.inner.list_contacts(customer_id, page).await
    }

    async fn list_issue_types(&self) -> Result<Vec<String>, ApiError> {
        self.pacer.wait().await;
        self.inner.list_issue_types().await
    }

    async fn list_statuses(&self) -> Result<Vec<String>, ApiError> {
        self.pacer.wait().await;
        self.inner.list_statuses().await
    }

    // Paginates internally; later pages wait on the shared pacer
    async fn list_labor_products(&self) -> Result<Vec<LaborProduct>, ApiError> {
        self.pacer.wait().await;
        self.inner.list_labor_products().await
    }

    async fn find_ticket(&self, number: &str) -> Result<Option<RemoteTicket>, ApiError> {
        self.pacer.wait().await;
        self.inner.find_ticket(number).await
    }

    // Paginates internally; later pages wait on the shared pacer
    async fn list_recent_tickets(&self, limit: usize) -> Result<Vec<RemoteTicket>, ApiError> {
        self.pacer.wait().await;
        self.inner.list_recent_tickets(limit).await
    }

    async fn create_ticket(&self, payload: &TicketPayload) -> Result<RemoteTicket, ApiError> {
        self.pacer.wait().await;
        self.inner.create_ticket(payload).await
    }

    async fn create_comment(
        &self,
        ticket_id: &str,
        payload: &CommentPayload,
    ) -> Result<(), ApiError> {
        self.pacer.wait().await;
        self.inner.create_comment(ticket_id, payload).await
    }

    async fn create_time_entry(
        &self,
        ticket_id: &str,
        payload: &TimeEntryPayload,
    ) -> Result<(), ApiError> {
        self.pacer.wait().await;
        self.inner.create_time_entry(ticket_id, payload).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
