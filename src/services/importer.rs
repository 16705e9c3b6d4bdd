//! Import orchestration
//!
//! Rows are processed one remote call at a time, in file order for tickets
//! and comments and in timeline order for the combined and labor files. Each
//! row ends as created, skipped (bad data or unknown reference, nothing was
//! sent) or failed (Syncro rejected the call). Only a broken entity cache or
//! an unreadable labor product list stops the run, since every later row
//! would depend on it.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::error::{ImportError, ResolutionError};
use crate::services::api::SyncroApi;
use crate::services::entity_cache::{EntityCache, EntityKind, Lookup};
use crate::services::resolver::{ResolveError, Resolver};
use crate::services::time_entries::plan_entries;
use crate::services::validator::RowValidator;
use crate::types::import::{ImportOutcome, RecordKind, RunSummary};
use crate::types::remote::{LaborProduct, TimeEntryPayload};
use crate::types::rows::{LaborRow, RawRow, ResolvedComment, ResolvedTicket};

/// What to log time against in time-entry mode
#[derive(Debug, Clone)]
pub struct TimeEntryRequest {
    pub ticket_count: usize,
    pub tech: String,
    pub labor_product: String,
}

/// Rows of one ticket in the combined file, earliest first once sorted
struct TicketThread<'r> {
    number: String,
    rows: Vec<(DateTime<FixedOffset>, &'r RawRow)>,
}

pub struct Importer<'a, A: SyncroApi + ?Sized> {
    api: &'a A,
    validator: RowValidator,
    resolver: Resolver<'a, A>,
}

impl<'a, A: SyncroApi + ?Sized> Importer<'a, A> {
    pub fn new(api: &'a A, cache: &'a mut EntityCache, validator: RowValidator) -> Self {
        Self {
            api,
            validator,
            resolver: Resolver::new(api, cache),
        }
    }

    async fn load_known_statuses(&mut self) -> Result<(), ImportError> {
        let statuses = self
            .resolver
            .cache_mut()
            .display_names(self.api, EntityKind::Status)
            .await?;
        self.validator.set_known_statuses(statuses);
        Ok(())
    }

    // ==========================================================================
    // Tickets
    // ==========================================================================

    pub async fn import_tickets(&mut self, rows: &[RawRow]) -> Result<RunSummary, ImportError> {
        self.load_known_statuses().await?;

        let mut summary = RunSummary::new(RecordKind::Ticket);
        info!("Importing {} ticket rows", rows.len());

        for row in rows {
            let outcome = self.import_ticket(row).await?;
            record(&mut summary, row.row_number, outcome);
        }

        log_finished("Ticket", &summary);
        Ok(summary)
    }

    async fn import_ticket(&mut self, row: &RawRow) -> Result<ImportOutcome, ImportError> {
        let ticket = match self.validator.validate_ticket(row) {
            Ok(ticket) => ticket,
            Err(e) => return Ok(ImportOutcome::invalid(e)),
        };

        let resolved = match self.resolver.resolve_ticket(&ticket).await {
            Ok(resolved) => resolved,
            Err(e) => return row_level(e),
        };

        if let Some(number) = &resolved.number {
            match self.resolver.lookup_ticket(number).await {
                Ok(Some(_)) => {
                    let reason = format!("ticket number {} already exists", number);
                    return Ok(ImportOutcome::skipped(reason));
                }
                Ok(None) => {}
                Err(e) => return Ok(ImportOutcome::failed(e)),
            }
        }

        Ok(self.create_ticket(resolved).await)
    }

    /// Create the ticket and remember it under the number it was created
    /// with, so a later row reusing the number is caught without a search
    async fn create_ticket(&mut self, resolved: ResolvedTicket) -> ImportOutcome {
        let payload = resolved.to_payload(Utc::now());
        match self.api.create_ticket(&payload).await {
            Ok(created) => {
                let number = created.number.clone().or(resolved.number);
                let outcome = ImportOutcome::Created {
                    remote_id: created.id.to_string(),
                    ticket_number: number.clone(),
                };
                self.resolver.remember_ticket(number, created);
                outcome
            }
            Err(e) => ImportOutcome::failed(e),
        }
    }

    // ==========================================================================
    // Comments
    // ==========================================================================

    pub async fn import_comments(&mut self, rows: &[RawRow]) -> Result<RunSummary, ImportError> {
        let mut summary = RunSummary::new(RecordKind::Comment);
        info!("Importing {} comment rows", rows.len());

        for row in rows {
            let outcome = self.import_comment(row).await?;
            record(&mut summary, row.row_number, outcome);
        }

        log_finished("Comment", &summary);
        Ok(summary)
    }

    async fn import_comment(&mut self, row: &RawRow) -> Result<ImportOutcome, ImportError> {
        let comment = match self.validator.validate_comment(row) {
            Ok(comment) => comment,
            Err(e) => return Ok(ImportOutcome::invalid(e)),
        };

        let resolved = match self.resolver.resolve_comment(&comment).await {
            Ok(resolved) => resolved,
            Err(e) => return row_level(e),
        };

        Ok(self.create_comment(resolved).await)
    }

    /// Post the comment unless the same body is already on the ticket
    async fn create_comment(&mut self, resolved: ResolvedComment) -> ImportOutcome {
        if self.resolver.has_comment(&resolved.ticket_number, &resolved.body) {
            return ImportOutcome::skipped(format!(
                "comment already exists on ticket {}",
                resolved.ticket_number
            ));
        }

        match self.api.create_comment(&resolved.ticket_id, &resolved.to_payload()).await {
            Ok(()) => {
                self.resolver.remember_comment(&resolved.ticket_number, &resolved.body);
                ImportOutcome::Created {
                    remote_id: resolved.ticket_id,
                    ticket_number: Some(resolved.ticket_number),
                }
            }
            Err(e) => ImportOutcome::failed(e),
        }
    }

    // ==========================================================================
    // Combined tickets and comments
    // ==========================================================================

    /// Import a file holding whole ticket histories.
    ///
    /// Rows are grouped by ticket number, tickets in the order they first
    /// appear, and each ticket's rows are ordered by timestamp. The earliest
    /// row creates the ticket and every later row becomes a comment on it. A
    /// ticket number that already exists in Syncro skips all of its rows.
    pub async fn import_combined(&mut self, rows: &[RawRow]) -> Result<RunSummary, ImportError> {
        self.load_known_statuses().await?;

        let mut summary = RunSummary::new(RecordKind::Combined);
        info!("Importing {} combined rows", rows.len());

        let mut threads: Vec<TicketThread<'_>> = Vec::new();
        let mut by_number: HashMap<String, usize> = HashMap::new();
        for row in rows {
            match self.validator.validate_combined_key(row) {
                Ok((number, at)) => {
                    let idx = *by_number.entry(number.clone()).or_insert_with(|| {
                        threads.push(TicketThread { number, rows: Vec::new() });
                        threads.len() - 1
                    });
                    threads[idx].rows.push((at, row));
                }
                Err(e) => record(&mut summary, row.row_number, ImportOutcome::invalid(e)),
            }
        }
        info!("Combined file holds {} tickets", threads.len());

        for mut thread in threads {
            // stable, rows sharing a timestamp keep their file order
            thread.rows.sort_by_key(|(at, _)| *at);
            self.import_thread(&thread, &mut summary).await?;
        }

        log_finished("Combined", &summary);
        Ok(summary)
    }

    async fn import_thread(
        &mut self,
        thread: &TicketThread<'_>,
        summary: &mut RunSummary,
    ) -> Result<(), ImportError> {
        let number = thread.number.as_str();
        let Some(((first_at, first), rest)) = thread.rows.split_first() else {
            return Ok(());
        };

        match self.resolver.lookup_ticket(number).await {
            Ok(None) => {}
            Ok(Some(_)) => {
                info!("Ticket {} already exists, skipping {} rows", number, thread.rows.len());
                let reason = format!("ticket number {} already exists", number);
                for (_, row) in &thread.rows {
                    record(summary, row.row_number, ImportOutcome::skipped(reason.clone()));
                }
                return Ok(());
            }
            Err(e) => {
                let error = e.to_string();
                for (_, row) in &thread.rows {
                    record(summary, row.row_number, ImportOutcome::failed(&error));
                }
                return Ok(());
            }
        }

        let outcome = match self.validator.validate_combined_ticket(first, number, *first_at) {
            Ok(ticket) => match self.resolver.resolve_ticket(&ticket).await {
                Ok(resolved) => self.create_ticket(resolved).await,
                Err(e) => row_level(e)?,
            },
            Err(e) => ImportOutcome::invalid(e),
        };
        let ticket_id = match &outcome {
            ImportOutcome::Created { remote_id, .. } => Some(remote_id.clone()),
            _ => None,
        };
        record(summary, first.row_number, outcome);

        let Some(ticket_id) = ticket_id else {
            let reason = format!("ticket {} was not created", number);
            for (_, row) in rest {
                record(summary, row.row_number, ImportOutcome::skipped(reason.clone()));
            }
            return Ok(());
        };

        for (at, row) in rest {
            let outcome = match self.validator.validate_combined_comment(row, number, *at) {
                Ok(comment) => {
                    match self.resolver.resolve_thread_comment(&comment, &ticket_id).await {
                        Ok(resolved) => self.create_comment(resolved).await,
                        Err(e) => row_level(e)?,
                    }
                }
                Err(e) => ImportOutcome::invalid(e),
            };
            record(summary, row.row_number, outcome);
        }

        Ok(())
    }

    // ==========================================================================
    // Labor entries
    // ==========================================================================

    /// Import timer entries from the ticket labor file, ordered by ticket
    /// number and then by entry sequence
    pub async fn import_labor(&mut self, rows: &[RawRow]) -> Result<RunSummary, ImportError> {
        let mut summary = RunSummary::new(RecordKind::LaborEntry);
        info!("Importing {} labor rows", rows.len());

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            match self.validator.validate_labor(row) {
                Ok(entry) => entries.push(entry),
                Err(e) => record(&mut summary, row.row_number, ImportOutcome::invalid(e)),
            }
        }
        if entries.is_empty() {
            warn!("No valid labor rows");
            return Ok(summary);
        }

        entries.sort_by(|a, b| {
            ticket_order(&a.ticket_number, &b.ticket_number).then(a.sequence.cmp(&b.sequence))
        });

        let products = self.api.list_labor_products().await?;
        debug!("{} labor products available", products.len());

        for entry in &entries {
            let outcome = self.import_labor_entry(entry, &products).await?;
            record(&mut summary, entry.row_number, outcome);
        }

        log_finished("Labor", &summary);
        Ok(summary)
    }

    async fn import_labor_entry(
        &mut self,
        entry: &LaborRow,
        products: &[LaborProduct],
    ) -> Result<ImportOutcome, ImportError> {
        let number = &entry.ticket_number;
        let ticket_id = match self.resolver.lookup_ticket(number).await {
            Ok(Some(ticket)) => ticket.id.to_string(),
            Ok(None) => {
                return Ok(ImportOutcome::skipped(
                    ResolutionError::new("ticket", number).to_string(),
                ))
            }
            Err(e) => return Ok(ImportOutcome::failed(e)),
        };

        let lookup = Lookup::Tech(&entry.tech);
        let tech = match self.resolver.require(lookup, "tech", &entry.tech).await {
            Ok(tech) => tech,
            Err(e) => return row_level(e),
        };

        let Some(product) = find_labor_product(products, &entry.labor_type) else {
            let error = ResolutionError::new("labor product", entry.labor_type.trim());
            return Ok(ImportOutcome::skipped(error.to_string()));
        };

        let payload = entry.to_payload(&tech.remote_id, &product.id.to_string());
        match self.api.create_time_entry(&ticket_id, &payload).await {
            Ok(()) => Ok(ImportOutcome::Created {
                remote_id: ticket_id,
                ticket_number: Some(number.clone()),
            }),
            Err(e) => Ok(ImportOutcome::failed(e)),
        }
    }

    // ==========================================================================
    // Time entries
    // ==========================================================================

    /// Log planned labor against the most recent tickets. The tech and the
    /// labor product must both exist, otherwise nothing is created.
    pub async fn generate_time_entries<R: Rng>(
        &mut self,
        request: &TimeEntryRequest,
        rng: &mut R,
    ) -> Result<RunSummary, ImportError> {
        let tech = match self
            .resolver
            .require(Lookup::Tech(&request.tech), "tech", &request.tech)
            .await
        {
            Ok(tech) => tech,
            Err(ResolveError::Unresolved(e)) => return Err(e.into()),
            Err(ResolveError::Remote(e)) => return Err(e.into()),
            Err(ResolveError::Cache(e)) => return Err(e.into()),
        };

        let products = self.api.list_labor_products().await?;
        let product = find_labor_product(&products, &request.labor_product)
            .ok_or_else(|| ResolutionError::new("labor product", request.labor_product.trim()))?;

        let tickets = self.api.list_recent_tickets(request.ticket_count).await?;
        let mut summary = RunSummary::new(RecordKind::TimeEntry);
        if tickets.is_empty() {
            warn!("No recent tickets, nothing to log time against");
            return Ok(summary);
        }

        let timezone = self.validator.normalizer().timezone();
        let plan = plan_entries(&tickets, timezone, Utc::now(), rng);
        info!(
            "Planned {} time entries for {} as '{}'",
            plan.len(),
            tech.display_name,
            product.name
        );

        for (idx, entry) in plan.into_iter().enumerate() {
            let payload = TimeEntryPayload {
                start_at: entry.start_at,
                end_at: entry.end_at,
                duration_minutes: entry.minutes,
                notes: entry.notes,
                user_id: tech.remote_id.clone(),
                product_id: product.id.to_string(),
                billable_override: None,
                hidden: None,
            };

            let outcome = match self.api.create_time_entry(&entry.ticket_id, &payload).await {
                Ok(()) => ImportOutcome::Created {
                    remote_id: entry.ticket_id,
                    ticket_number: entry.ticket_number,
                },
                Err(e) => ImportOutcome::failed(e),
            };
            record(&mut summary, idx + 1, outcome);
        }

        Ok(summary)
    }
}

/// Labor product by name, ignoring case and surrounding whitespace
fn find_labor_product<'p>(products: &'p [LaborProduct], name: &str) -> Option<&'p LaborProduct> {
    let wanted = name.trim();
    products.iter().find(|p| p.name.trim().eq_ignore_ascii_case(wanted))
}

/// Order digit-only ticket numbers by value, `998` before `1042`
fn ticket_order(a: &str, b: &str) -> Ordering {
    let (a_digits, b_digits) = (a.trim_start_matches('0'), b.trim_start_matches('0'));
    a_digits
        .len()
        .cmp(&b_digits.len())
        .then_with(|| a_digits.cmp(b_digits))
        .then_with(|| a.cmp(b))
}

/// Map a resolver error onto the row outcome, or stop the run for cache failures
fn row_level(error: ResolveError) -> Result<ImportOutcome, ImportError> {
    match error {
        ResolveError::Unresolved(e) => Ok(ImportOutcome::skipped(e.to_string())),
        ResolveError::Remote(e) => Ok(ImportOutcome::failed(e)),
        ResolveError::Cache(e) => {
            error!("Entity cache failed, aborting run: {}", e);
            Err(e.into())
        }
    }
}

fn record(summary: &mut RunSummary, row_number: usize, outcome: ImportOutcome) {
    log_outcome(row_number, &outcome);
    summary.record(row_number, outcome);
}

fn log_outcome(row_number: usize, outcome: &ImportOutcome) {
    match outcome {
        ImportOutcome::Created { remote_id, ticket_number } => {
            debug!("Row {}: created {} (ticket {:?})", row_number, remote_id, ticket_number)
        }
        ImportOutcome::Skipped { reason, issues } if issues.is_empty() => {
            warn!("Row {}: skipped, {}", row_number, reason)
        }
        ImportOutcome::Skipped { reason, issues } => {
            let detail: Vec<String> = issues.iter().map(ToString::to_string).collect();
            warn!("Row {}: skipped, {}: {}", row_number, reason, detail.join("; "))
        }
        ImportOutcome::Failed { error } => error!("Row {}: failed, {}", row_number, error),
    }
}

fn log_finished(mode: &str, summary: &RunSummary) {
    info!(
        "{} import finished: {} created, {} skipped, {} failed",
        mode, summary.created, summary.skipped, summary.failed
    );
}
