//! Syncro REST client

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::ApiError;
use crate::services::api::SyncroApi;
use crate::services::pacing::Pacer;
use crate::types::remote::{
    CommentPayload, LaborProduct, Page, PageMeta, RemoteContact, RemoteCustomer, RemoteTech,
    RemoteTicket, TicketPayload, TimeEntryPayload,
};

/// Pages fetched for one `list_recent_tickets`/`list_labor_products` call at most
const MAX_LISTING_PAGES: u32 = 50;

// ==========================================================================
// Response envelopes
// ==========================================================================

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    users: Vec<RemoteTech>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Deserialize)]
struct CustomersResponse {
    #[serde(default)]
    customers: Vec<RemoteCustomer>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Deserialize)]
struct ContactsResponse {
    #[serde(default)]
    contacts: Vec<RemoteContact>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Deserialize)]
struct TicketsResponse {
    #[serde(default)]
    tickets: Vec<RemoteTicket>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Deserialize)]
struct ProductsResponse {
    #[serde(default)]
    products: Vec<LaborProduct>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Deserialize)]
struct TicketEnvelope {
    ticket: RemoteTicket,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsResponse {
    #[serde(default)]
    ticket: TicketSettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct TicketSettingsSection {
    #[serde(default)]
    problem_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TicketStatusResponse {
    #[serde(default)]
    ticket_status_list: Vec<String>,
}

// ==========================================================================
// Client
// ==========================================================================

/// Base URL for a tenant subdomain
pub fn tenant_base_url(subdomain: &str) -> String {
    format!("https://{}.syncromsp.com/api/v1", subdomain.trim())
}

pub struct SyncroClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    calls: AtomicU64,
    /// Spaces the follow-up pages of multi-page listings. Shared with
    /// `PacedApi`, which spaces the first page of every call.
    pacer: Pacer,
}

impl SyncroClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        pacer: Pacer,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("syncro-import/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            calls: AtomicU64::new(0),
            pacer,
        })
    }

    /// Number of HTTP requests issued so far
    pub fn api_calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, endpoint))
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T, ApiError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let response = request.send().await.map_err(|e| {
            error!("Request to {} failed: {}", endpoint, e);
            ApiError::Transport(e)
        })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Syncro returned {} for {}: {}", status, endpoint, body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("{} -> {} ({} bytes)", endpoint, status, body.len());
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body)
            .map_err(|e| ApiError::Decode(format!("{}: {}", endpoint, e)))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::GET, endpoint).query(query), endpoint)
            .await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::POST, endpoint).json(body), endpoint)
            .await
    }
}

#[async_trait]
impl SyncroApi for SyncroClient {
    async fn list_techs(&self, page: u32) -> Result<Page<RemoteTech>, ApiError> {
        let response: UsersResponse = self.get("/users", &[("page", page.to_string())]).await?;
        Ok(Page::new(response.users, response.meta))
    }

    async fn list_customers(&self, page: u32) -> Result<Page<RemoteCustomer>, ApiError> {
        let response: CustomersResponse =
            self.get("/customers", &[("page", page.to_string())]).await?;
        Ok(Page::new(response.customers, response.meta))
    }

    async fn list_contacts(
        &self,
        customer_id: &str,
        page: u32,
    ) -> Result<Page<RemoteContact>, ApiError> {
        let query = [
            ("customer_id", customer_id.to_string()),
            ("page", page.to_string()),
        ];
        let response: ContactsResponse = self.get("/contacts", &query).await?;
        Ok(Page::new(response.contacts, response.meta))
    }

    async fn list_issue_types(&self) -> Result<Vec<String>, ApiError> {
        let response: Option<SettingsResponse> = self.get("/settings", &[]).await?;
        Ok(response.unwrap_or_default().ticket.problem_types)
    }

    async fn list_statuses(&self) -> Result<Vec<String>, ApiError> {
        let response: TicketStatusResponse = self.get("/tickets/settings", &[]).await?;
        Ok(response.ticket_status_list)
    }

    async fn list_labor_products(&self) -> Result<Vec<LaborProduct>, ApiError> {
        let mut products = Vec::new();
        let mut page = 1;
        for _ in 0..MAX_LISTING_PAGES {
            if page > 1 {
                self.pacer.wait().await;
            }
            let query = [("category", "Labor".to_string()), ("page", page.to_string())];
            let response: ProductsResponse = self.get("/products", &query).await?;
            products.extend(response.products.into_iter().filter(|p| !p.disabled));
            match response.meta.continuation(page) {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        Ok(products)
    }

    async fn find_ticket(&self, number: &str) -> Result<Option<RemoteTicket>, ApiError> {
        let response: TicketsResponse =
            self.get("/tickets", &[("number", number.to_string())]).await?;

        // The search matches loosely, so insist on the exact number
        Ok(response
            .tickets
            .into_iter()
            .find(|t| t.number.as_deref() == Some(number)))
    }

    async fn list_recent_tickets(&self, limit: usize) -> Result<Vec<RemoteTicket>, ApiError> {
        let mut tickets = Vec::new();
        let mut page = 1;
        for _ in 0..MAX_LISTING_PAGES {
            if tickets.len() >= limit {
                break;
            }
            if page > 1 {
                self.pacer.wait().await;
            }
            let response: TicketsResponse =
                self.get("/tickets", &[("page", page.to_string())]).await?;
            tickets.extend(response.tickets);
            match response.meta.continuation(page) {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        tickets.truncate(limit);
        Ok(tickets)
    }

    async fn create_ticket(&self, payload: &TicketPayload) -> Result<RemoteTicket, ApiError> {
        let envelope: TicketEnvelope = self.post("/tickets", payload).await?;
        Ok(envelope.ticket)
    }

    async fn create_comment(
        &self,
        ticket_id: &str,
        payload: &CommentPayload,
    ) -> Result<(), ApiError> {
        let endpoint = format!("/tickets/{}/comment", ticket_id);
        let _: serde_json::Value = self.post(&endpoint, payload).await?;
        Ok(())
    }

    async fn create_time_entry(
        &self,
        ticket_id: &str,
        payload: &TimeEntryPayload,
    ) -> Result<(), ApiError> {
        let endpoint = format!("/tickets/{}/timer_entry", ticket_id);
        let _: serde_json::Value = self.post(&endpoint, payload).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "syncro"
    }
}
