use crate::backend::{BackendError, BackendResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: u16,
    pub body: Value,
    pub fetched_at: Instant,
    pub fetched_at_wall: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Freshness {
    /// Served from cache inside the dedupe window.
    Cached,
    /// Fetched just now.
    Revalidated,
    /// Revalidation failed; previous data returned with the error.
    Stale,
}

#[derive(Debug, Clone)]
pub struct Loaded {
    pub key: String,
    pub status: u16,
    pub body: Value,
    pub freshness: Freshness,
    pub fetched_at: DateTime<Utc>,
    pub error: Option<BackendError>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub stale_served: u64,
}

/// Stale-while-revalidate store for list reads, keyed by path + sorted query.
pub struct SwrCache {
    entries: HashMap<String, CacheEntry>,
    dedupe: Duration,
    stats: CacheStats,
}

impl SwrCache {
    pub fn new(dedupe: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            dedupe,
            stats: CacheStats::default(),
        }
    }

    pub fn key(path: &str, query: &[(String, String)]) -> String {
        if query.is_empty() {
            return path.to_string();
        }
        let mut pairs: Vec<&(String, String)> = query.iter().collect();
        pairs.sort();
        let qs: Vec<String> = pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("{}?{}", path, qs.join("&"))
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn load<F>(&mut self, key: &str, force: bool, fetch: F) -> Result<Loaded, BackendError>
    where
        F: FnOnce() -> Result<BackendResponse, BackendError>,
    {
        if !force {
            if let Some(e) = self.entries.get(key) {
                if e.fetched_at.elapsed() < self.dedupe {
                    self.stats.hits += 1;
                    tracing::debug!(key, "cache hit");
                    return Ok(Loaded {
                        key: key.to_string(),
                        status: e.status,
                        body: e.body.clone(),
                        freshness: Freshness::Cached,
                        fetched_at: e.fetched_at_wall,
                        error: None,
                    });
                }
            }
        }

        self.stats.misses += 1;
        match fetch() {
            Ok(resp) => {
                let now = Utc::now();
                self.entries.insert(
                    key.to_string(),
                    CacheEntry {
                        status: resp.status,
                        body: resp.body.clone(),
                        fetched_at: Instant::now(),
                        fetched_at_wall: now,
                    },
                );
                Ok(Loaded {
                    key: key.to_string(),
                    status: resp.status,
                    body: resp.body,
                    freshness: Freshness::Revalidated,
                    fetched_at: now,
                    error: None,
                })
            }
            Err(err) => match self.entries.get(key) {
                Some(e) => {
                    self.stats.stale_served += 1;
                    tracing::warn!(key, error = %err, "revalidation failed, serving stale data");
                    Ok(Loaded {
                        key: key.to_string(),
                        status: e.status,
                        body: e.body.clone(),
                        freshness: Freshness::Stale,
                        fetched_at: e.fetched_at_wall,
                        error: Some(err),
                    })
                }
                None => Err(err),
            },
        }
    }

    /// Drop every key under `prefix` (e.g. `/alumnos` after a student mutation).
    pub fn invalidate_prefix(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| !k.starts_with(prefix));
        before - self.entries.len()
    }

    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            ..self.stats
        }
    }
}
