use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::config::CachePolicy;
use crate::error::Error;

/// Semantic cache key. One entry per fetched collection or detail resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Missions,
    Registrations,
    Mission(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missions => write!(f, "missions"),
            Self::Registrations => write!(f, "registrations"),
            Self::Mission(id) => write!(f, "mission:{id}"),
        }
    }
}

impl CacheKey {
    fn staleness(&self, policy: &CachePolicy) -> Duration {
        let secs = match self {
            Self::Missions | Self::Mission(_) => policy.missions_stale_secs,
            Self::Registrations => policy.registrations_stale_secs,
        };
        Duration::seconds(secs as i64)
    }
}

/// A cached value plus whether it has outlived its staleness window (or was
/// explicitly invalidated) and should be refetched.
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub value: T,
    pub is_stale: bool,
}

/// Proof that a fetch was started for a key. A token is only honoured at
/// completion if the key's generation has not moved since it was issued, so a
/// cancelled fetch's late result can never clobber newer state.
#[derive(Debug)]
pub struct FetchToken {
    key: CacheKey,
    generation: u64,
}

#[derive(Default)]
struct Entry {
    value: Option<Value>,
    fetched_at: Option<OffsetDateTime>,
    invalidated: bool,
    generation: u64,
    in_flight: bool,
}

/// Key-based in-memory store of fetched collections. The single piece of
/// shared mutable state in the crate; every component coordinates through its
/// key-scoped operations.
pub struct CacheStore {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    policy: CachePolicy,
}

impl CacheStore {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            policy,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value for `key`, if any, with its staleness flag.
    pub fn get(&self, key: &CacheKey) -> Option<Cached<Value>> {
        let entries = self.lock();
        let entry = entries.get(key)?;
        let value = entry.value.clone()?;
        let expired = match entry.fetched_at {
            Some(at) => OffsetDateTime::now_utc() - at >= key.staleness(&self.policy),
            None => true,
        };
        Some(Cached {
            value,
            is_stale: entry.invalidated || expired,
        })
    }

    /// Typed view of `get`. A payload that no longer decodes is treated as
    /// absent (it will be refetched) rather than an error.
    pub fn get_as<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<Cached<T>> {
        let cached = self.get(key)?;
        match serde_json::from_value::<T>(cached.value) {
            Ok(value) => Some(Cached {
                value,
                is_stale: cached.is_stale,
            }),
            Err(e) => {
                warn!(%key, error = %e, "cached payload failed to decode, dropping");
                None
            }
        }
    }

    /// Synchronous overwrite. Used by both the fetch-completion path and the
    /// optimistic-mutation path.
    pub fn set(&self, key: &CacheKey, value: Value) {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_default();
        entry.value = Some(value);
        entry.fetched_at = Some(OffsetDateTime::now_utc());
        entry.invalidated = false;
    }

    /// Mark the entry stale so the next read refetches authoritative data.
    pub fn invalidate(&self, key: &CacheKey) {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.invalidated = true;
        }
        debug!(%key, "cache invalidated");
    }

    /// Raw value for rollback bookkeeping; `None` when nothing is cached.
    pub fn snapshot(&self, key: &CacheKey) -> Option<Value> {
        self.lock().get(key).and_then(|e| e.value.clone())
    }

    /// Put a snapshot back. Restoring `None` removes the value entirely.
    pub fn restore(&self, key: &CacheKey, snapshot: Option<Value>) {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_default();
        entry.value = snapshot;
        entry.invalidated = false;
    }

    /// Claim the in-flight slot for `key`. Returns `None` when a fetch is
    /// already running, deduplicating concurrent fetches for the same key.
    pub fn begin_fetch(&self, key: &CacheKey) -> Option<FetchToken> {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_default();
        if entry.in_flight {
            return None;
        }
        entry.in_flight = true;
        Some(FetchToken {
            key: key.clone(),
            generation: entry.generation,
        })
    }

    /// Apply a finished fetch. Returns false (and discards the value) when the
    /// key's generation moved while the fetch was in flight.
    pub fn complete_fetch(&self, token: FetchToken, value: Value) -> bool {
        let mut entries = self.lock();
        let entry = entries.entry(token.key.clone()).or_default();
        if entry.generation != token.generation {
            debug!(key = %token.key, "discarding superseded fetch result");
            return false;
        }
        entry.in_flight = false;
        entry.value = Some(value);
        entry.fetched_at = Some(OffsetDateTime::now_utc());
        entry.invalidated = false;
        true
    }

    /// Release the in-flight slot without applying a value (fetch failed).
    pub fn abort_fetch(&self, token: FetchToken) {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(&token.key) {
            if entry.generation == token.generation {
                entry.in_flight = false;
            }
        }
    }

    /// Supersede any in-flight fetch for `key`. Called before an optimistic
    /// mutation so a late-arriving stale read cannot overwrite it.
    pub fn cancel_fetches(&self, key: &CacheKey) {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_default();
        entry.generation += 1;
        entry.in_flight = false;
    }
}

/// Serve fresh cached data, otherwise fetch under a token. When another fetch
/// already owns the key, stale cached data is served instead of piling on.
pub async fn read_through<T, F, Fut>(
    cache: &CacheStore,
    key: &CacheKey,
    fetch: F,
) -> Result<T, Error>
where
    T: DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, Error>>,
{
    if let Some(cached) = cache.get(key) {
        if !cached.is_stale {
            return Ok(serde_json::from_value(cached.value)?);
        }
    }

    match cache.begin_fetch(key) {
        Some(token) => match fetch().await {
            Ok(value) => {
                if !cache.complete_fetch(token, value.clone()) {
                    // A mutation superseded this fetch; its state wins.
                    if let Some(current) = cache.get(key) {
                        return Ok(serde_json::from_value(current.value)?);
                    }
                }
                Ok(serde_json::from_value(value)?)
            }
            Err(e) => {
                cache.abort_fetch(token);
                Err(e)
            }
        },
        None => {
            if let Some(cached) = cache.get(key) {
                return Ok(serde_json::from_value(cached.value)?);
            }
            // Cold cache and the slot is taken: fetch for this caller only,
            // without touching the shared entry.
            Ok(serde_json::from_value(fetch().await?)?)
        }
    }
}
