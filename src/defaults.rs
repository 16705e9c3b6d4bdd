use chrono_tz::Tz;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::New_York;
pub const DEFAULT_PACING_MS: u64 = 380;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CACHE_FILE: &str = "syncro_temp_data.json";
pub const DEFAULT_TICKETS_CSV: &str = "tickets.csv";
pub const DEFAULT_COMMENTS_CSV: &str = "ticket_comments.csv";
pub const DEFAULT_COMBINED_CSV: &str = "tickets_and_comments_combined.csv";
pub const DEFAULT_LABOR_CSV: &str = "ticket_labor_entries.csv";
pub const DEFAULT_LOGS_DIR: &str = "logs";

/// Upper bound on pages walked for one entity listing
pub const MAX_ENUMERATION_PAGES: u32 = 1000;

/// Tickets to log time against when `--count` is not given
pub const DEFAULT_TIME_ENTRY_TICKETS: usize = 25;

/// Largest `--count` accepted by the time-entry command
pub const MAX_TIME_ENTRY_TICKETS: u64 = 1000;
