//! Configuration management

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tz::Tz;

use crate::defaults::{
    DEFAULT_CACHE_FILE, DEFAULT_COMBINED_CSV, DEFAULT_COMMENTS_CSV, DEFAULT_LABOR_CSV,
    DEFAULT_PACING_MS, DEFAULT_TICKETS_CSV, DEFAULT_TIMEOUT_SECS, DEFAULT_TIMEZONE,
    MAX_ENUMERATION_PAGES,
};
use crate::services::syncro::tenant_base_url;
use crate::services::timestamp::DateLocale;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Syncro account subdomain, `acme` for acme.syncromsp.com
    pub subdomain: Option<String>,

    pub api_key: Option<String>,

    /// Full API base URL, overrides the one derived from the subdomain
    pub base_url: Option<String>,

    /// Zone CSV timestamps are written in
    pub timezone: Tz,

    pub date_locale: DateLocale,

    /// Minimum gap between two API calls
    pub pacing: Duration,

    pub request_timeout: Duration,

    /// Ceiling on pages walked while enumerating one entity kind
    pub max_pages: u32,

    pub cache_file: PathBuf,
    pub tickets_csv: PathBuf,
    pub comments_csv: PathBuf,
    pub combined_csv: PathBuf,
    pub labor_csv: PathBuf,

    /// Tech and labor product used by the time-entry command
    pub timer_tech: Option<String>,
    pub timer_labor_product: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timezone = match get("SYNCRO_TIMEZONE") {
            Some(name) => name.parse::<Tz>().map_err(|e| {
                anyhow::anyhow!("SYNCRO_TIMEZONE '{}' is not an IANA timezone: {}", name, e)
            })?,
            None => DEFAULT_TIMEZONE,
        };

        let date_locale = match get("TIMESTAMP_FORMAT") {
            Some(raw) => raw.parse::<DateLocale>().map_err(anyhow::Error::msg)?,
            None => DateLocale::Us,
        };

        let number = |key: &str, default: u64| parse_number(get(key), key, default);
        let pacing_ms = number("SYNCRO_PACING_MS", DEFAULT_PACING_MS)?;
        let timeout_secs = number("SYNCRO_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let max_pages = number("SYNCRO_MAX_PAGES", MAX_ENUMERATION_PAGES.into())?;
        let max_pages = u32::try_from(max_pages).context("SYNCRO_MAX_PAGES is too large")?;
        let path = |key: &str, default: &str| {
            PathBuf::from(get(key).unwrap_or_else(|| default.to_string()))
        };

        Ok(Self {
            subdomain: get("SYNCRO_SUBDOMAIN"),
            api_key: get("SYNCRO_API_KEY"),
            base_url: get("SYNCRO_BASE_URL"),
            timezone,
            date_locale,
            pacing: Duration::from_millis(pacing_ms),
            request_timeout: Duration::from_secs(timeout_secs),
            max_pages,
            cache_file: path("SYNCRO_CACHE_FILE", DEFAULT_CACHE_FILE),
            tickets_csv: path("TICKETS_CSV_PATH", DEFAULT_TICKETS_CSV),
            comments_csv: path("COMMENTS_CSV_PATH", DEFAULT_COMMENTS_CSV),
            combined_csv: path("COMBINED_CSV_PATH", DEFAULT_COMBINED_CSV),
            labor_csv: path("LABOR_CSV_PATH", DEFAULT_LABOR_CSV),
            timer_tech: get("TIMER_TECH"),
            timer_labor_product: get("TIMER_LABOR_PRODUCT"),
        })
    }

    /// Ask on the terminal for whatever credentials the environment did not provide
    pub fn prompt_missing_credentials(&mut self) -> Result<()> {
        if self.subdomain.is_none() && self.base_url.is_none() {
            let subdomain = prompt_line("Syncro subdomain: ")?;
            if subdomain.is_empty() {
                anyhow::bail!("A Syncro subdomain is required");
            }
            self.subdomain = Some(subdomain);
        }
        if self.api_key.is_none() {
            let key = rpassword::prompt_password("Syncro API key: ")
                .context("Failed to read API key")?;
            if key.trim().is_empty() {
                anyhow::bail!("A Syncro API key is required");
            }
            self.api_key = Some(key.trim().to_string());
        }
        Ok(())
    }

    pub fn api_base_url(&self) -> Result<String> {
        if let Some(url) = &self.base_url {
            return Ok(url.clone());
        }
        self.subdomain
            .as_deref()
            .map(tenant_base_url)
            .context("SYNCRO_SUBDOMAIN or SYNCRO_BASE_URL must be set")
    }

    pub fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().context("SYNCRO_API_KEY must be set")
    }

    /// Identity the entity cache is bound to
    pub fn tenant_name(&self) -> String {
        self.subdomain.clone().or_else(|| self.base_url.clone()).unwrap_or_default()
    }
}

fn parse_number(raw: Option<String>, key: &str, default: u64) -> Result<u64> {
    match raw {
        Some(v) => v
            .parse()
            .with_context(|| format!("{} must be a whole number, got '{}'", key, v)),
        None => Ok(default),
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(prompt.as_bytes())?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("Failed to read from terminal")?;
    Ok(line.trim().to_string())
}
