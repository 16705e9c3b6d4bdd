//! Business logic services

pub mod api;
pub mod cache_store;
pub mod csv_source;
pub mod entity_cache;
pub mod importer;
#[cfg(test)]
pub mod mock_api;
pub mod pacing;
pub mod resolver;
pub mod syncro;
pub mod time_entries;
pub mod timestamp;
pub mod validator;
