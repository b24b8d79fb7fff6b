//! Fraud risk scoring
//!
//! [`RiskScorer`] asks a [`ScoringBackend`] for a fraud probability and maps
//! it onto a [`ScoringResult`]. Any failure on the backend path falls back to
//! the deterministic [`HeuristicBackend`], so scoring never fails the caller.

use crate::cache::{content_hash, ttl, DecisionCache};
use crate::features::{Clock, FeatureTables, FeatureVector, SystemClock};
use crate::types::{clamp_finite, ModelSource, ScoringRequest, ScoringResult};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Weight of the single model in the ensemble
const MODEL_WEIGHT: f64 = 1.0;

/// Strategy producing a fraud probability in `[0, 1]`
#[async_trait]
pub trait ScoringBackend: Send + Sync {
    /// Backend name, for logs
    fn name(&self) -> &str;

    /// Source reported when this backend's answer is used
    fn source(&self) -> ModelSource;

    /// Fraud probability for a request and its encoded features
    async fn predict(&self, request: &ScoringRequest, features: &FeatureVector) -> Result<f64>;
}

/// Additive rule-based scorer used when no model is reachable
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicBackend;

impl HeuristicBackend {
    /// Deterministic fraud probability for a request
    pub fn probability(&self, request: &ScoringRequest) -> f64 {
        let mut score = 0.1;

        if request.amount > 5_000.0 {
            score += 0.2;
        }
        if request.amount > 10_000.0 {
            score += 0.3;
        }
        if request.previous_declines() > 2 {
            score += 0.25;
        }
        if request.velocity_last_hour() > 5 {
            score += 0.15;
        }

        match request.merchant_category.as_str() {
            "gambling" => score += 0.4,
            "luxury_goods" => score += 0.2,
            _ => {}
        }

        clamp_finite(score, 0.0, 1.0)
    }
}

#[async_trait]
impl ScoringBackend for HeuristicBackend {
    fn name(&self) -> &str {
        "local_heuristic"
    }

    fn source(&self) -> ModelSource {
        ModelSource::LocalFallback
    }

    async fn predict(&self, request: &ScoringRequest, _features: &FeatureVector) -> Result<f64> {
        Ok(self.probability(request))
    }
}

/// Combine model outputs into one probability
fn ensemble(model_score: f64) -> f64 {
    clamp_finite(model_score * MODEL_WEIGHT, 0.0, 1.0)
}

/// Fraud risk scorer
pub struct RiskScorer {
    backend: Arc<dyn ScoringBackend>,
    fallback: HeuristicBackend,
    tables: FeatureTables,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<dyn DecisionCache>>,
    cache_ttl: Duration,
}

impl RiskScorer {
    /// Create a scorer over `backend` with default tables and no cache
    pub fn new(backend: Arc<dyn ScoringBackend>) -> Self {
        RiskScorer {
            backend,
            fallback: HeuristicBackend,
            tables: FeatureTables::default(),
            clock: Arc::new(SystemClock),
            cache: None,
            cache_ttl: Duration::from_secs(ttl::RISK_SCORE),
        }
    }

    /// Scorer that only uses the local heuristic
    pub fn local() -> Self {
        Self::new(Arc::new(HeuristicBackend))
    }

    /// Memoize probabilities in `cache` for `ttl`
    pub fn with_cache(mut self, cache: Arc<dyn DecisionCache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    /// Replace the feature lookup tables
    pub fn with_tables(mut self, tables: FeatureTables) -> Self {
        self.tables = tables;
        self
    }

    /// Replace the clock used for temporal features
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Feature tables in use
    pub fn tables(&self) -> &FeatureTables {
        &self.tables
    }

    /// Cache fingerprint of a request
    pub fn fingerprint(request: &ScoringRequest) -> String {
        content_hash(&format!(
            "{}_{}_{}_{}",
            request.user_id, request.card_id, request.amount, request.merchant_category
        ))
    }

    /// Score a transaction. Never fails.
    pub async fn score(&self, request: &ScoringRequest) -> ScoringResult {
        let fingerprint = Self::fingerprint(request);

        if let Some(cache) = &self.cache {
            match cache.get_risk_score(&fingerprint).await {
                Ok(Some(probability)) => {
                    debug!("Fraud score for {} served from cache", fingerprint);
                    return ScoringResult::from_probability(probability, ModelSource::Cached);
                }
                Ok(None) => {}
                Err(e) => warn!("Risk cache lookup failed, scoring anyway: {}", e),
            }
        }

        let features = FeatureVector::extract(request, &self.tables, self.clock.now());

        let (probability, source, cacheable) =
            match self.backend.predict(request, &features).await {
                Ok(score) if score.is_finite() => (ensemble(score), self.backend.source(), true),
                Ok(score) => {
                    warn!(
                        "Backend {} returned non-finite score {}, using heuristic",
                        self.backend.name(),
                        score
                    );
                    (self.fallback.probability(request), ModelSource::LocalFallback, false)
                }
                Err(e) => {
                    warn!("Backend {} failed, using heuristic: {}", self.backend.name(), e);
                    (self.fallback.probability(request), ModelSource::LocalFallback, false)
                }
            };

        if cacheable {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache
                    .put_risk_score(&fingerprint, probability, self.cache_ttl)
                    .await
                {
                    warn!("Failed to cache fraud score {}: {}", fingerprint, e);
                }
            }
        }

        let result = ScoringResult::from_probability(probability, source);

        info!(
            "Fraud score calculated: {:.2} (recommendation: {:?}, source: {:?}) for transaction {}",
            result.risk_score,
            result.recommendation,
            result.model_source,
            request.transaction_id.as_deref().unwrap_or("unknown")
        );

        result
    }
}
