//! Tiered expiry cache for fetched records.
//!
//! One in-process LRU map holds every entry with its insertion instant. The
//! tier a lookup asks for only changes the maximum age it accepts:
//!
//! - hot: in memory, ~10s
//! - warm: in memory, then the optional persisted [`WarmStore`], ~300s
//! - cold: in memory, stale data for outages, ~3600s
//!
//! Reads refresh LRU recency but never the insertion instant, so no entry is
//! served past its tier's age no matter how often it is read.

use crate::error::CacheError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Lifetimes and size bound of the cache tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePolicy {
    pub hot_ttl: Duration,
    pub warm_ttl: Duration,
    pub cold_ttl: Duration,
    /// Bound on in-memory entries across all tiers
    pub max_entries: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            hot_ttl: Duration::from_secs(10),
            warm_ttl: Duration::from_secs(300),
            cold_ttl: Duration::from_secs(3600),
            max_entries: 1000,
        }
    }
}

/// Persisted backing for the warm tier
#[async_trait]
pub trait WarmStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    /// Store with an expiry; the store must not return the value after `ttl`
    async fn put(&self, key: &str, value: &serde_json::Value, ttl: Duration)
        -> Result<(), CacheError>;
}

struct Entry {
    value: serde_json::Value,
    stored_at: Instant,
    last_used: u64,
}

#[derive(Default)]
struct MemoryTier {
    entries: HashMap<String, Entry>,
    tick: u64,
}

impl MemoryTier {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn purge_older_than(&mut self, max_age: Duration, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.stored_at) < max_age);
        before - self.entries.len()
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            tracing::debug!(key = %key, "Evicting least recently used cache entry");
            self.entries.remove(&key);
        }
    }
}

pub struct TieredCache {
    policy: CachePolicy,
    memory: Mutex<MemoryTier>,
    warm_store: Option<Arc<dyn WarmStore>>,
}

impl TieredCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            memory: Mutex::new(MemoryTier::default()),
            warm_store: None,
        }
    }

    pub fn with_warm_store(mut self, store: Arc<dyn WarmStore>) -> Self {
        self.warm_store = Some(store);
        self
    }

    // A panic while holding the lock cannot leave the map half-updated
    fn memory(&self) -> MutexGuard<'_, MemoryTier> {
        self.memory.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lookup<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Option<T> {
        let now = Instant::now();
        let mut memory = self.memory();

        let age = now.duration_since(memory.entries.get(key)?.stored_at);
        if age >= self.policy.cold_ttl {
            memory.entries.remove(key);
            return None;
        }
        if age >= max_age {
            return None;
        }

        let tick = memory.next_tick();
        let entry = memory.entries.get_mut(key)?;
        entry.last_used = tick;

        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    pub fn get_hot<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key, self.policy.hot_ttl)
    }

    /// In-memory entry younger than the warm lifetime, else the warm store
    pub async fn get_warm<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if let Some(value) = self.lookup(key, self.policy.warm_ttl) {
            return Some(value);
        }

        let store = self.warm_store.as_ref()?;
        match store.get(key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Persisted value has unexpected shape");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Warm store read failed");
                None
            }
        }
    }

    /// Anything younger than the cold lifetime, for serving during outages
    pub fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key, self.policy.cold_ttl)
    }

    pub async fn insert<T: Serialize>(&self, key: &str, value: &T) {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Value not cacheable");
                return;
            }
        };

        {
            let now = Instant::now();
            let mut memory = self.memory();
            let tick = memory.next_tick();
            memory.entries.insert(
                key.to_string(),
                Entry {
                    value: json.clone(),
                    stored_at: now,
                    last_used: tick,
                },
            );

            if memory.entries.len() > self.policy.max_entries {
                memory.purge_older_than(self.policy.cold_ttl, now);
            }
            while memory.entries.len() > self.policy.max_entries {
                memory.evict_lru();
            }
        }

        if let Some(store) = &self.warm_store {
            if let Err(e) = store.put(key, &json, self.policy.warm_ttl).await {
                tracing::warn!(key = %key, error = %e, "Warm store write failed");
            }
        }
    }

    /// Drop entries past the cold lifetime; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let cold_ttl = self.policy.cold_ttl;
        self.memory().purge_older_than(cold_ttl, Instant::now())
    }

    pub fn len(&self) -> usize {
        self.memory().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TieredCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}
