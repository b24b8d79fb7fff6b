use crate::metrics::{CACHE_HITS, CACHE_MISSES};
use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use risk_engine::{DecisionCache, Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

fn cache_error(e: redis::RedisError) -> Error {
    Error::Cache(e.to_string())
}

/// Redis-backed decision cache
///
/// The connection is released by `close`; later calls fail with a cache error.
pub struct RedisDecisionCache {
    redis: Mutex<Option<ConnectionManager>>,
}

impl RedisDecisionCache {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(cache_error)?;
        let redis = ConnectionManager::new(client).await.map_err(cache_error)?;
        info!("Connected to Redis decision cache");
        Ok(RedisDecisionCache {
            redis: Mutex::new(Some(redis)),
        })
    }

    fn connection(&self) -> Result<ConnectionManager> {
        self.redis
            .lock()
            .clone()
            .ok_or_else(|| Error::Cache("Redis decision cache is closed".to_string()))
    }
}

#[async_trait]
impl DecisionCache for RedisDecisionCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.connection()?
            .get::<_, Option<String>>(key)
            .await
            .map_err(|e| {
                error!("Redis error getting {}: {}", key, e);
                cache_error(e)
            })
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let seconds = ttl.as_secs().max(1);
        let _: () = self
            .connection()?
            .set_ex(key, value, seconds)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.redis.lock().take().is_some() {
            info!("Closed Redis decision cache connection");
        }
        Ok(())
    }
}

/// Records hit and miss counters around another cache
pub struct MeteredCache {
    inner: Arc<dyn DecisionCache>,
}

impl MeteredCache {
    pub fn new(inner: Arc<dyn DecisionCache>) -> Self {
        MeteredCache { inner }
    }
}

fn kind_of(key: &str) -> &str {
    key.split(':').next().unwrap_or("unknown")
}

#[async_trait]
impl DecisionCache for MeteredCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let result = self.inner.get(key).await;
        match &result {
            Ok(Some(_)) => CACHE_HITS.with_label_values(&[kind_of(key)]).inc(),
            _ => CACHE_MISSES.with_label_values(&[kind_of(key)]).inc(),
        }
        result
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use risk_engine::InMemoryCache;

    #[tokio::test]
    async fn test_metered_cache_counts() {
        let cache = MeteredCache::new(Arc::new(InMemoryCache::default()));
        let hits = CACHE_HITS.with_label_values(&["route"]).get();
        let misses = CACHE_MISSES.with_label_values(&["route"]).get();

        assert_eq!(cache.get_route("ctx").await.unwrap(), None);
        cache.put_route("ctx", "Solana", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get_route("ctx").await.unwrap().as_deref(), Some("Solana"));

        assert!(CACHE_HITS.with_label_values(&["route"]).get() >= hits + 1);
        assert!(CACHE_MISSES.with_label_values(&["route"]).get() >= misses + 1);
    }

    #[tokio::test]
    async fn test_closed_redis_cache_rejects_calls() {
        let cache = RedisDecisionCache {
            redis: Mutex::new(None),
        };

        cache.close().await.unwrap();
        assert!(matches!(cache.get("risk:abc").await, Err(Error::Cache(_))));
        assert!(matches!(
            cache.set("risk:abc", "0.5", Duration::from_secs(60)).await,
            Err(Error::Cache(_))
        ));
    }

    #[test]
    fn test_kind_of_key() {
        assert_eq!(kind_of("risk:abc"), "risk");
        assert_eq!(kind_of("route:abc"), "route");
    }
}
