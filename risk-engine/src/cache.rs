//! Advisory decision cache
//!
//! Scores and routing choices are memoized by a content hash of the request.
//! Entries may be stale within their TTL, and every cache failure is treated
//! by callers as a miss.

use crate::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use tracing::debug;

/// Cache TTL defaults (in seconds)
pub mod ttl {
    /// Fraud probability
    pub const RISK_SCORE: u64 = 1800; // 30 minutes
    /// Routing decision
    pub const ROUTING_DECISION: u64 = 900; // 15 minutes
}

/// Cache key prefixes
pub mod keys {
    /// Fraud probability by request fingerprint
    pub const RISK_SCORE: &str = "risk";
    /// Gateway name by context hash
    pub const ROUTING_DECISION: &str = "route";
}

/// First 16 hex characters of the SHA-256 of `input`
pub fn content_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}

/// Key-value store with per-entry expiry
#[async_trait]
pub trait DecisionCache: Send + Sync {
    /// Read a live entry
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write an entry that expires after `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Release any connection held by the cache
    async fn close(&self) -> Result<()>;

    /// Cached fraud probability for a request fingerprint
    async fn get_risk_score(&self, fingerprint: &str) -> Result<Option<f64>> {
        let raw = self
            .get(&format!("{}:{}", keys::RISK_SCORE, fingerprint))
            .await?;
        Ok(raw.and_then(|v| v.parse::<f64>().ok()).filter(|v| v.is_finite()))
    }

    /// Store a fraud probability
    async fn put_risk_score(&self, fingerprint: &str, score: f64, ttl: Duration) -> Result<()> {
        self.set(
            &format!("{}:{}", keys::RISK_SCORE, fingerprint),
            &score.to_string(),
            ttl,
        )
        .await
    }

    /// Cached gateway name for a context hash
    async fn get_route(&self, context_hash: &str) -> Result<Option<String>> {
        self.get(&format!("{}:{}", keys::ROUTING_DECISION, context_hash))
            .await
    }

    /// Store a gateway name
    async fn put_route(&self, context_hash: &str, gateway: &str, ttl: Duration) -> Result<()> {
        self.set(
            &format!("{}:{}", keys::ROUTING_DECISION, context_hash),
            gateway,
            ttl,
        )
        .await
    }
}

/// Process-local cache, used when no Redis is configured and in tests
pub struct InMemoryCache {
    entries: DashMap<String, (String, Instant)>,
    max_entries: usize,
    last_sweep: Mutex<Option<Instant>>,
}

/// Minimum spacing between full expiry sweeps of a full cache
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

impl InMemoryCache {
    /// Create a cache holding at most `max_entries` live entries
    pub fn new(max_entries: usize) -> Self {
        InMemoryCache {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            last_sweep: Mutex::new(None),
        }
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries, at most once per `SWEEP_INTERVAL`
    fn evict_expired(&self) {
        let now = Instant::now();
        {
            let mut last = self.last_sweep.lock();
            if matches!(*last, Some(at) if now.duration_since(at) < SWEEP_INTERVAL) {
                return;
            }
            *last = Some(now);
        }
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl DecisionCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let hit = self
            .entries
            .get(key)
            .filter(|entry| entry.value().1 > Instant::now())
            .map(|entry| entry.value().0.clone());

        if hit.is_none() {
            self.entries
                .remove_if(key, |_, (_, expires_at)| *expires_at <= Instant::now());
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(key) {
            self.evict_expired();
            if self.entries.len() >= self.max_entries {
                debug!("In-memory cache full ({} entries), skipping {}", self.max_entries, key);
                return Ok(());
            }
        }

        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| Error::Cache(format!("ttl out of range: {:?}", ttl)))?;
        self.entries
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}
