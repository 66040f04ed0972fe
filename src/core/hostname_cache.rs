//! Disk-persisted TTL cache of appliance hostnames
//!
//! Maps a target's configuration name to the hostname the appliance reports
//! about itself, so downstream consumers can label results with the real
//! device name without paying a live query on every dispatch.
//!
//! # Persistence
//!
//! The store is a flat JSON file, `target_id -> {hostname, cached_at,
//! expires_at}` with ISO-8601 timestamps, loaded once at construction and
//! rewritten in full on every update. Persistence failures are logged and
//! swallowed: a stale or missing hostname is cosmetic and must never fail
//! the caller's original operation.
//!
//! # Concurrency
//!
//! The store is the only resource shared by concurrent dispatch workers.
//! The read-modify-write-persist sequence runs under a mutex; the live
//! refresh query runs outside it, so two workers refreshing the same id may
//! both query and the later insert wins. Entries expire lazily at read time;
//! there is no background sweep and no active eviction.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CacheSettings;
use crate::logger;
use crate::utils::ApplianceError;

use super::session::ApplianceSession;

/// One cached hostname with its validity window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hostname: String,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Process-wide hostname cache with whole-file write-through persistence
pub struct HostnameCache {
    enabled: bool,
    ttl: Duration,
    path: PathBuf,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl HostnameCache {
    /// Build the cache from settings, loading existing entries from disk.
    ///
    /// When caching is disabled no disk I/O happens at all.
    pub fn new(settings: &CacheSettings) -> Self {
        let entries = if settings.enabled {
            let loaded = load_store(&settings.cache_file);
            logger::log_debug(&format!(
                "Hostname cache initialized with {} entries, TTL={}h",
                loaded.len(),
                settings.ttl_hours
            ));
            loaded
        } else {
            HashMap::new()
        };

        Self {
            enabled: settings.enabled,
            ttl: Duration::hours(settings.ttl_hours),
            path: settings.cache_file.clone(),
            entries: Mutex::new(entries),
        }
    }

    /// Resolve a target's hostname. Never fails: on any internal failure the
    /// target id itself is returned.
    ///
    /// Disabled cache: returns the id with no I/O. Valid entry: cached
    /// hostname. Otherwise one live query through the target's own session;
    /// the refresh is not retried — a stale identifier is cosmetic.
    pub async fn get_hostname(&self, target_id: &str, session: &dyn ApplianceSession) -> String {
        if !self.enabled {
            return target_id.to_string();
        }

        if let Some(hostname) = self.cached(target_id) {
            logger::log_debug(&format!(
                "Using cached hostname for {}: {}",
                target_id, hostname
            ));
            return hostname;
        }

        logger::log_debug(&format!(
            "Hostname cache miss/expired for {}, refreshing...",
            target_id
        ));

        match session.fetch_hostname().await {
            Ok(hostname) => {
                self.insert(target_id, &hostname);
                hostname
            }
            Err(e) => {
                logger::log_warn(&format!(
                    "Failed to refresh hostname for {}: {}. Falling back to target id.",
                    target_id, e
                ));
                target_id.to_string()
            }
        }
    }

    /// Look up a valid (unexpired) cached hostname. An expired entry behaves
    /// identically to a missing one.
    pub fn cached(&self, target_id: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let entries = self.lock_entries();
        let entry = entries.get(target_id)?;
        if entry.is_valid(Utc::now()) {
            Some(entry.hostname.clone())
        } else {
            None
        }
    }

    /// Insert or overwrite an entry and persist the whole store.
    pub fn insert(&self, target_id: &str, hostname: &str) {
        let now = Utc::now();
        let entry = CacheEntry {
            hostname: hostname.to_string(),
            cached_at: now,
            expires_at: now + self.ttl,
        };

        let mut entries = self.lock_entries();
        entries.insert(target_id.to_string(), entry);
        self.persist(&entries);
    }

    /// Number of entries currently held, valid or expired
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|p| {
            logger::log_warn(
                "Recovered from poisoned hostname cache mutex - previous thread panicked",
            );
            p.into_inner()
        })
    }

    /// Whole-file write-through. Failures are logged and swallowed.
    fn persist(&self, entries: &HashMap<String, CacheEntry>) {
        if !self.enabled {
            return;
        }
        if let Err(e) = write_store(&self.path, entries) {
            logger::log_warn(&format!(
                "Failed to save hostname cache to {}: {}",
                self.path.display(),
                e
            ));
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_entry(&self, target_id: &str, entry: CacheEntry) {
        let mut entries = self.lock_entries();
        entries.insert(target_id.to_string(), entry);
        self.persist(&entries);
    }
}

fn load_store(path: &PathBuf) -> HashMap<String, CacheEntry> {
    if !path.exists() {
        logger::log_debug(&format!(
            "No existing hostname cache file found at {}",
            path.display()
        ));
        return HashMap::new();
    }

    let result = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()));

    match result {
        Ok(entries) => entries,
        Err(e) => {
            logger::log_warn(&format!(
                "Failed to load hostname cache: {}. Starting with empty cache.",
                e
            ));
            HashMap::new()
        }
    }
}

fn write_store(
    path: &PathBuf,
    entries: &HashMap<String, CacheEntry>,
) -> Result<(), ApplianceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ApplianceError::Configuration(e.to_string()))?;
        }
    }
    let raw = serde_json::to_string_pretty(entries)
        .map_err(|e| ApplianceError::Configuration(e.to_string()))?;
    std::fs::write(path, raw).map_err(|e| ApplianceError::Configuration(e.to_string()))
}
