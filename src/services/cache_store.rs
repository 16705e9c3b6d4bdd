//! Disk persistence for the entity cache
//!
//! The snapshot is a single JSON file. A file written for a different tenant,
//! or one that no longer parses, is ignored with a warning and the run starts
//! with an empty cache.

use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::services::entity_cache::{CacheSnapshot, EntityCache};

/// Fingerprint of the Syncro account a cache belongs to. The API key never
/// reaches the disk in clear.
pub fn tenant_fingerprint(subdomain: &str, api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subdomain.trim().to_lowercase().as_bytes());
    hasher.update([0u8]);
    hasher.update(api_key.trim().as_bytes());
    hex::encode(hasher.finalize())
}

pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cache for `tenant`, if a usable one exists
    pub fn load(&self, tenant: &str) -> Option<EntityCache> {
        if !self.path.exists() {
            debug!("No cache file at {}", self.path.display());
            return None;
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read cache file {}: {}", self.path.display(), e);
                return None;
            }
        };

        let snapshot = match serde_json::from_str::<CacheSnapshot>(&content) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", self.path.display(), e);
                return None;
            }
        };

        if snapshot.tenant != tenant {
            warn!(
                "Cache file {} belongs to a different Syncro account, ignoring it",
                self.path.display()
            );
            return None;
        }

        info!("Loaded entity cache saved at {}", snapshot.saved_at);
        Some(EntityCache::from_snapshot(snapshot))
    }

    pub fn save(&self, cache: &EntityCache) -> io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&cache.snapshot()).map_err(io::Error::other)?;
        std::fs::write(&self.path, json)?;
        debug!("Saved entity cache to {}", self.path.display());
        Ok(())
    }

    /// Remove the cache file. Returns whether there was one.
    pub fn clear(&self) -> io::Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
