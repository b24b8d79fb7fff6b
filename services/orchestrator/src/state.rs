use crate::cache::{MeteredCache, RedisDecisionCache};
use crate::config::{CacheBackend, Config, InferenceMode};
use anyhow::Context;
use risk_engine::{
    default_catalog, DecisionCache, EpsilonGreedyPolicy, GatewaySelector, InMemoryCache,
    InferenceConfig, RemoteBanditPolicy, RemoteInferenceBackend, RiskScorer, RoutingPolicy,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Components shared by every worker, chosen once at startup
pub struct AppState {
    pub scorer: RiskScorer,
    pub selector: GatewaySelector,
    pub cache: Arc<dyn DecisionCache>,
    pub environment: String,
    pub show_error_details: bool,
}

impl AppState {
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store: Arc<dyn DecisionCache> = match config.cache.backend {
            CacheBackend::Redis => {
                info!("Using Redis decision cache at {}", config.cache.redis_url);
                Arc::new(
                    RedisDecisionCache::connect(&config.cache.redis_url)
                        .await
                        .context("Redis connection failed")?,
                )
            }
            CacheBackend::Memory => {
                info!("Using in-memory decision cache ({} entries)", config.cache.max_entries);
                Arc::new(InMemoryCache::new(config.cache.max_entries))
            }
        };

        Self::with_cache(config, store)
    }

    pub fn with_cache(config: &Config, store: Arc<dyn DecisionCache>) -> anyhow::Result<Self> {
        let cache: Arc<dyn DecisionCache> = Arc::new(MeteredCache::new(store));
        let timeout = Duration::from_millis(config.inference.timeout_ms);

        let (scorer, policy): (RiskScorer, Arc<dyn RoutingPolicy>) = match config.inference.mode {
            InferenceMode::Remote => {
                info!(
                    "Remote inference: fraud={} routing={}",
                    config.inference.fraud_endpoint, config.inference.routing_endpoint
                );
                let backend = RemoteInferenceBackend::new(InferenceConfig {
                    endpoint: config.inference.fraud_endpoint.clone(),
                    timeout,
                })?;
                let bandit = RemoteBanditPolicy::new(InferenceConfig {
                    endpoint: config.inference.routing_endpoint.clone(),
                    timeout,
                })?;
                (RiskScorer::new(Arc::new(backend)), Arc::new(bandit))
            }
            InferenceMode::Local => {
                info!("Local inference: heuristic scorer and epsilon-greedy routing");
                (
                    RiskScorer::local(),
                    Arc::new(EpsilonGreedyPolicy::new(config.routing.epsilon)),
                )
            }
        };

        let scorer = scorer.with_cache(
            cache.clone(),
            Duration::from_secs(config.cache.risk_ttl_seconds),
        );

        let selector = GatewaySelector::new(default_catalog(), policy)?
            .with_fallback(EpsilonGreedyPolicy::new(config.routing.epsilon))
            .with_jitter(config.routing.simulate_jitter)
            .with_cache(
                cache.clone(),
                Duration::from_secs(config.cache.route_ttl_seconds),
            );

        Ok(AppState {
            scorer,
            selector,
            cache,
            environment: config.server.environment.clone(),
            show_error_details: config.server.is_development(),
        })
    }
}
