use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::ContentCollection;
use crate::utils::format_age;

use super::LocalStorage;

/// Storage keys holding one feed's payload and its fetch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    pub payload: String,
    pub timestamp: String,
}

impl CacheKeys {
    pub fn new(payload: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            timestamp: timestamp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub payload: ContentCollection,
    /// Missing when the timestamp key was absent or unreadable; such an
    /// entry is never fresh but still serves as a fallback.
    pub timestamp: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.timestamp.map(|ts| now - ts)
    }

    pub fn is_fresh(&self, interval: Duration, now: DateTime<Utc>) -> bool {
        let Some(ts) = self.timestamp else {
            return false;
        };
        let Ok(interval) = chrono::Duration::from_std(interval) else {
            return false;
        };
        now - ts < interval
    }

    /// Relative age for display, "unknown" without a timestamp.
    pub fn age_display(&self) -> String {
        match self.age(Utc::now()) {
            Some(age) => format_age(age.num_minutes()),
            None => "unknown".to_string(),
        }
    }
}

/// Cache of fetched collections, one payload/timestamp pair per feed.
#[derive(Clone)]
pub struct ContentCache {
    storage: LocalStorage,
}

impl ContentCache {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    /// Read the cached entry. Unreadable or unparseable data counts as absent.
    pub fn get(&self, keys: &CacheKeys) -> Option<CacheEntry> {
        let raw = match self.storage.get_item(&keys.payload) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(cache = %keys.payload, error = %e, "Failed to read cached payload");
                return None;
            }
        };

        let payload: ContentCollection = match serde_json::from_str(&raw) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(cache = %keys.payload, error = %e, "Failed to parse cached payload");
                return None;
            }
        };

        let timestamp = match self.storage.get_item(&keys.timestamp) {
            Ok(Some(raw)) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_millis),
            Ok(None) => None,
            Err(e) => {
                debug!(cache = %keys.timestamp, error = %e, "Failed to read cache timestamp");
                None
            }
        };

        Some(CacheEntry { payload, timestamp })
    }

    /// Write the payload and stamp it with the current time.
    pub fn set(&self, keys: &CacheKeys, payload: &ContentCollection) -> Result<()> {
        self.set_at(keys, payload, Utc::now())
    }

    pub fn set_at(&self, keys: &CacheKeys, payload: &ContentCollection, at: DateTime<Utc>) -> Result<()> {
        let contents = serde_json::to_string(payload)?;
        self.storage
            .set_item(&keys.payload, &contents)
            .with_context(|| format!("Failed to cache payload: {}", keys.payload))?;
        self.storage
            .set_item(&keys.timestamp, &at.timestamp_millis().to_string())
            .with_context(|| format!("Failed to cache timestamp: {}", keys.timestamp))?;
        Ok(())
    }

    pub fn clear(&self, keys: &CacheKeys) -> Result<()> {
        self.storage.remove_item(&keys.payload)?;
        self.storage.remove_item(&keys.timestamp)?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
