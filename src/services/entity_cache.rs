//! Entity cache
//!
//! Maps human-readable names from the CSV to Syncro identifiers. Each entity
//! kind is enumerated from the API in full the first time it is needed and
//! never again for the rest of the run. Contacts are enumerated per customer.
//!
//! Enumeration follows the continuation signal in each page's `meta` block.
//! A next page that does not move forward, or a listing that runs past
//! `max_pages`, aborts with a `PaginationError` instead of looping or
//! returning a partial mapping.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::defaults::MAX_ENUMERATION_PAGES;
use crate::error::{ApiError, CacheError, PaginationError};
use crate::services::api::SyncroApi;
use crate::types::remote::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Tech,
    Customer,
    Contact,
    IssueType,
    Status,
}

impl EntityKind {
    /// Lookup key for a raw name. Statuses are compared exactly, everything
    /// else by trimmed lower-cased name.
    pub fn normalize(self, raw: &str) -> String {
        match self {
            EntityKind::Status => raw.trim().to_string(),
            _ => raw.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Tech => "techs",
            EntityKind::Customer => "customers",
            EntityKind::Contact => "contacts",
            EntityKind::IssueType => "issue types",
            EntityKind::Status => "ticket statuses",
        };
        f.write_str(label)
    }
}

/// What the CSV says, before it is turned into a lookup key
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    Tech(&'a str),
    Customer(&'a str),
    Contact { customer_id: &'a str, name: &'a str },
    IssueType(&'a str),
    Status(&'a str),
}

impl Lookup<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Lookup::Tech(_) => EntityKind::Tech,
            Lookup::Customer(_) => EntityKind::Customer,
            Lookup::Contact { .. } => EntityKind::Contact,
            Lookup::IssueType(_) => EntityKind::IssueType,
            Lookup::Status(_) => EntityKind::Status,
        }
    }

    pub fn key(&self) -> String {
        match self {
            Lookup::Contact { customer_id, name } => contact_key(customer_id, name),
            Lookup::Tech(raw)
            | Lookup::Customer(raw)
            | Lookup::IssueType(raw)
            | Lookup::Status(raw) => self.kind().normalize(raw),
        }
    }
}

fn contact_key(customer_id: &str, name: &str) -> String {
    format!("{}:{}", customer_id, EntityKind::Contact.normalize(name))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub lookup_key: String,
    pub remote_id: String,
    pub display_name: String,
}

/// On-disk form of the cache, see `CacheStore`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub tenant: String,
    pub entries: BTreeMap<EntityKind, Vec<CacheEntry>>,
    #[serde(default)]
    pub contact_scopes: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

pub struct EntityCache {
    tenant: String,
    entries: HashMap<EntityKind, HashMap<String, CacheEntry>>,
    /// Kinds that have been enumerated in full (contacts excluded)
    loaded: HashSet<EntityKind>,
    /// Customers whose contacts have been enumerated
    contact_scopes: HashSet<String>,
    max_pages: u32,
}

impl EntityCache {
    /// Empty cache bound to one tenant fingerprint
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            entries: HashMap::new(),
            loaded: HashSet::new(),
            contact_scopes: HashSet::new(),
            max_pages: MAX_ENUMERATION_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn is_loaded(&self, kind: EntityKind) -> bool {
        self.loaded.contains(&kind)
    }

    pub fn has_contact_scope(&self, customer_id: &str) -> bool {
        self.contact_scopes.contains(customer_id)
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.entries.get(&kind).map_or(0, HashMap::len)
    }

    /// Resolve one name, enumerating its entity kind first if needed.
    ///
    /// `Ok(None)` means the kind was fully enumerated and the name is not in it.
    pub async fn resolve<A>(
        &mut self,
        api: &A,
        lookup: Lookup<'_>,
    ) -> Result<Option<CacheEntry>, CacheError>
    where
        A: SyncroApi + ?Sized,
    {
        self.ensure_loaded(api, &lookup).await?;
        Ok(self.get(&lookup).cloned())
    }

    /// Display names of every entry of `kind`, sorted
    pub async fn display_names<A>(
        &mut self,
        api: &A,
        kind: EntityKind,
    ) -> Result<Vec<String>, CacheError>
    where
        A: SyncroApi + ?Sized,
    {
        if kind != EntityKind::Contact && !self.is_loaded(kind) {
            self.populate(api, kind).await?;
        }
        let mut names: Vec<String> = self
            .entries
            .get(&kind)
            .map(|m| m.values().map(|e| e.display_name.clone()).collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    /// Peek without touching the API
    pub fn get(&self, lookup: &Lookup<'_>) -> Option<&CacheEntry> {
        self.entries.get(&lookup.kind())?.get(&lookup.key())
    }

    /// Drop every mapping. The next lookup of any kind enumerates again.
    pub fn invalidate_all(&mut self) {
        info!("Invalidating entity cache ({} kinds loaded)", self.loaded.len());
        self.entries.clear();
        self.loaded.clear();
        self.contact_scopes.clear();
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let mut entries: BTreeMap<EntityKind, Vec<CacheEntry>> = BTreeMap::new();
        for kind in &self.loaded {
            entries.insert(*kind, self.sorted_entries(*kind));
        }
        if !self.contact_scopes.is_empty() {
            entries.insert(EntityKind::Contact, self.sorted_entries(EntityKind::Contact));
        }

        let mut contact_scopes: Vec<String> = self.contact_scopes.iter().cloned().collect();
        contact_scopes.sort();

        CacheSnapshot {
            tenant: self.tenant.clone(),
            entries,
            contact_scopes,
            saved_at: Utc::now(),
        }
    }

    pub fn from_snapshot(snapshot: CacheSnapshot) -> Self {
        let mut cache = Self::new(snapshot.tenant);
        for (kind, entries) in snapshot.entries {
            if kind != EntityKind::Contact {
                cache.loaded.insert(kind);
            }
            let map = cache.entries.entry(kind).or_default();
            for entry in entries {
                map.insert(entry.lookup_key.clone(), entry);
            }
        }
        cache.contact_scopes = snapshot.contact_scopes.into_iter().collect();
        cache
    }

    fn sorted_entries(&self, kind: EntityKind) -> Vec<CacheEntry> {
        let mut list: Vec<CacheEntry> = self
            .entries
            .get(&kind)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        list.sort_by(|a, b| a.lookup_key.cmp(&b.lookup_key));
        list
    }

    async fn ensure_loaded<A>(&mut self, api: &A, lookup: &Lookup<'_>) -> Result<(), CacheError>
    where
        A: SyncroApi + ?Sized,
    {
        match lookup {
            Lookup::Contact { customer_id, .. } => {
                if !self.has_contact_scope(customer_id) {
                    self.populate_contacts(api, customer_id).await?;
                }
            }
            other => {
                let kind = other.kind();
                if !self.is_loaded(kind) {
                    self.populate(api, kind).await?;
                }
            }
        }
        Ok(())
    }

    async fn populate<A>(&mut self, api: &A, kind: EntityKind) -> Result<(), CacheError>
    where
        A: SyncroApi + ?Sized,
    {
        let max_pages = self.max_pages;
        let records: Vec<(String, String)> = match kind {
            EntityKind::Tech => enumerate_pages(kind, max_pages, |page| api.list_techs(page))
                .await?
                .into_iter()
                .map(|t| (t.id.to_string(), t.name))
                .collect(),
            EntityKind::Customer => {
                enumerate_pages(kind, max_pages, |page| api.list_customers(page))
                    .await?
                    .into_iter()
                    .map(|c| (c.id.to_string(), c.business_name.unwrap_or_default()))
                    .collect()
            }
            // Syncro answers these with a flat list of names that double as ids
            EntityKind::IssueType => api
                .list_issue_types()
                .await
                .map_err(|source| CacheError::Remote { kind, source })?
                .into_iter()
                .map(|name| (name.clone(), name))
                .collect(),
            EntityKind::Status => api
                .list_statuses()
                .await
                .map_err(|source| CacheError::Remote { kind, source })?
                .into_iter()
                .map(|name| (name.clone(), name))
                .collect(),
            EntityKind::Contact => return Ok(()),
        };

        let map = self.entries.entry(kind).or_default();
        map.clear();
        for (remote_id, display_name) in records {
            insert_entry(map, kind, kind.normalize(&display_name), remote_id, display_name);
        }
        self.loaded.insert(kind);

        info!("Cached {} {}", self.len(kind), kind);
        Ok(())
    }

    async fn populate_contacts<A>(&mut self, api: &A, customer_id: &str) -> Result<(), CacheError>
    where
        A: SyncroApi + ?Sized,
    {
        let kind = EntityKind::Contact;
        let contacts =
            enumerate_pages(kind, self.max_pages, |page| api.list_contacts(customer_id, page))
                .await?;

        let map = self.entries.entry(kind).or_default();
        let mut stored = 0;
        for contact in contacts {
            let owner = contact.customer_id.map(|id| id.to_string());
            if owner.as_deref().is_some_and(|owner| owner != customer_id) {
                debug!(
                    "Ignoring contact {} listed under customer {} but owned by {:?}",
                    contact.id, customer_id, owner
                );
                continue;
            }
            let name = contact.name.unwrap_or_default();
            let key = contact_key(customer_id, &name);
            if insert_entry(map, kind, key, contact.id.to_string(), name) {
                stored += 1;
            }
        }
        self.contact_scopes.insert(customer_id.to_string());

        info!("Cached {} contacts for customer {}", stored, customer_id);
        Ok(())
    }
}

/// Store one remote record. Blank names are dropped; on a key collision the
/// first record wins.
fn insert_entry(
    map: &mut HashMap<String, CacheEntry>,
    kind: EntityKind,
    lookup_key: String,
    remote_id: String,
    display_name: String,
) -> bool {
    let display_name = display_name.trim().to_string();
    if display_name.is_empty() {
        debug!("Skipping {} record {} with blank name", kind, remote_id);
        return false;
    }
    if let Some(existing) = map.get(&lookup_key) {
        warn!(
            "Duplicate {} name '{}': keeping id {}, ignoring id {}",
            kind, display_name, existing.remote_id, remote_id
        );
        return false;
    }
    map.insert(
        lookup_key.clone(),
        CacheEntry { lookup_key, remote_id, display_name },
    );
    true
}

/// Walk a paginated listing from page 1 until the server stops pointing at a
/// next page.
async fn enumerate_pages<T, F, Fut>(
    kind: EntityKind,
    max_pages: u32,
    mut fetch: F,
) -> Result<Vec<T>, CacheError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let mut items = Vec::new();
    let mut page = 1;
    let mut fetched = 0;

    loop {
        if fetched >= max_pages {
            return Err(PaginationError::PageLimit { kind, limit: max_pages }.into());
        }

        let response = fetch(page).await.map_err(|source| CacheError::Remote { kind, source })?;
        fetched += 1;
        debug!("{} page {}: {} records", kind, page, response.items.len());
        items.extend(response.items);

        match response.meta.continuation(page) {
            None => break,
            Some(next) if next <= page => {
                return Err(PaginationError::NonAdvancing { kind, page, next }.into());
            }
            Some(next) => page = next,
        }
    }

    Ok(items)
}
