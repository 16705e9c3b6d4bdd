//! Time entry planning
//!
//! Lays out one labor entry per ticket inside a working day, so a tenant
//! seeded from CSV also shows plausible billable time. Tickets are grouped by
//! the local date they were created on; each day's entries run back to back
//! from a random start inside 07:00-18:00 and fill 30-80% of the day.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use rand::Rng;
use tracing::warn;

use crate::types::remote::RemoteTicket;

pub const WORKDAY_START_HOUR: u32 = 7;
pub const WORKDAY_END_HOUR: u32 = 18;
pub const WORKDAY_MINUTES: u32 = (WORKDAY_END_HOUR - WORKDAY_START_HOUR) * 60;
pub const MIN_UTILIZATION: f64 = 0.30;
pub const MAX_UTILIZATION: f64 = 0.80;
pub const MIN_ENTRY_MINUTES: u32 = 15;
pub const MAX_ENTRY_MINUTES: u32 = 240;

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedEntry {
    pub ticket_id: String,
    pub ticket_number: Option<String>,
    pub start_at: DateTime<FixedOffset>,
    pub end_at: DateTime<FixedOffset>,
    pub minutes: u32,
    pub notes: String,
}

/// Split a day's worth of work into `count` entry lengths.
///
/// Every entry is between `MIN_ENTRY_MINUTES` and `MAX_ENTRY_MINUTES`. The
/// total stays inside the utilization band unless there are too many tickets
/// to fit, in which case every entry gets the minimum.
pub fn generate_durations<R: Rng>(count: usize, rng: &mut R) -> Vec<u32> {
    if count == 0 {
        return Vec::new();
    }
    let count_u32 = u32::try_from(count).unwrap_or(u32::MAX);

    let floor = count_u32.saturating_mul(MIN_ENTRY_MINUTES);
    let min_total = ((WORKDAY_MINUTES as f64 * MIN_UTILIZATION) as u32).max(floor);
    let max_total = ((WORKDAY_MINUTES as f64 * MAX_UTILIZATION) as u32)
        .min(count_u32.saturating_mul(MAX_ENTRY_MINUTES))
        .max(floor);
    let min_total = min_total.min(max_total);

    let target = rng.gen_range(min_total..=max_total);
    let mut remaining = target;
    let mut durations = Vec::with_capacity(count);

    for idx in 0..count_u32 {
        let left = count_u32 - idx;
        let minutes = if left == 1 {
            remaining
        } else {
            // leave enough for the rest to stay within the per-entry bounds
            let lower = remaining
                .saturating_sub(MAX_ENTRY_MINUTES.saturating_mul(left - 1))
                .max(MIN_ENTRY_MINUTES);
            let upper = remaining
                .saturating_sub(MIN_ENTRY_MINUTES.saturating_mul(left - 1))
                .min(MAX_ENTRY_MINUTES);
            if upper <= lower {
                lower
            } else {
                rng.gen_range(lower..=upper)
            }
        };
        durations.push(minutes);
        remaining = remaining.saturating_sub(minutes);
    }

    durations
}

pub fn build_note(ticket: &RemoteTicket) -> String {
    let subject = ticket
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("General work");
    let number = ticket.number.clone().unwrap_or_else(|| ticket.id.to_string());
    format!("Worked on ticket {}: {}", number, subject)
}

/// Plan entries for `tickets`. Tickets without a creation time count as
/// created at `now`.
pub fn plan_entries<R: Rng>(
    tickets: &[RemoteTicket],
    timezone: Tz,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<PlannedEntry> {
    let mut by_day: BTreeMap<NaiveDate, Vec<(DateTime<Tz>, &RemoteTicket)>> = BTreeMap::new();
    for ticket in tickets {
        let created = ticket
            .created_at
            .map(|c| c.with_timezone(&timezone))
            .unwrap_or_else(|| now.with_timezone(&timezone));
        by_day.entry(created.date_naive()).or_default().push((created, ticket));
    }

    let workday_start = NaiveTime::from_hms_opt(WORKDAY_START_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
    let mut planned = Vec::with_capacity(tickets.len());

    for (day, mut day_tickets) in by_day {
        let local_start = timezone.from_local_datetime(&day.and_time(workday_start));
        let Some(start_of_day) = local_start.earliest() else {
            warn!(
                "No {:02}:00 on {} in {}, skipping {} tickets",
                WORKDAY_START_HOUR,
                day,
                timezone,
                day_tickets.len()
            );
            continue;
        };

        day_tickets.sort_by(|a, b| a.0.cmp(&b.0));
        let durations = generate_durations(day_tickets.len(), rng);
        let total = durations.iter().fold(0u32, |sum, d| sum.saturating_add(*d));
        let slack = WORKDAY_MINUTES.saturating_sub(total);
        let mut offset = if slack > 0 { rng.gen_range(0..=slack) } else { 0 };

        for (minutes, (_, ticket)) in durations.into_iter().zip(day_tickets) {
            let start = start_of_day + Duration::minutes(offset as i64);
            let end = start + Duration::minutes(minutes as i64);
            offset += minutes;

            planned.push(PlannedEntry {
                ticket_id: ticket.id.to_string(),
                ticket_number: ticket.number.clone(),
                start_at: start.with_timezone(&start.offset().fix()),
                end_at: end.with_timezone(&end.offset().fix()),
                minutes,
                notes: build_note(ticket),
            });
        }
    }

    planned
}
