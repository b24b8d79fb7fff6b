//! Payment gateway selection
//!
//! [`GatewaySelector`] asks a [`RoutingPolicy`] which gateway to use for a
//! routing context, then ranks the remaining gateways as alternatives. A
//! failing policy is replaced by [`EpsilonGreedyPolicy`], and a policy answer
//! that cannot be used is replaced by static rules, so selection never fails
//! the caller.

use crate::cache::{content_hash, ttl, DecisionCache};
use crate::features::{AmountBucket, Clock, ContextFeatures, SystemClock};
use crate::gateways::{GatewayMetrics, GatewayProfile, MetricsSampler};
use crate::types::{
    clamp_finite, BanditDecision, DecisionContext, DecisionModel, GatewayCandidate,
    RoutingContext, RoutingDecision,
};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default exploration rate
pub const DEFAULT_EPSILON: f64 = 0.1;

/// Strategy choosing one gateway out of the catalog
#[async_trait]
pub trait RoutingPolicy: Send + Sync {
    /// Policy name, for logs
    fn name(&self) -> &str;

    /// Choose a catalog index given the context and per-gateway metrics
    async fn decide(
        &self,
        context: &ContextFeatures,
        catalog: &[GatewayProfile],
        metrics: &[GatewayMetrics],
    ) -> Result<BanditDecision>;
}

/// Epsilon-greedy choice over the gateways eligible for the context
pub struct EpsilonGreedyPolicy {
    epsilon: f64,
    rng: Mutex<StdRng>,
}

impl EpsilonGreedyPolicy {
    /// Policy exploring with probability `epsilon`
    pub fn new(epsilon: f64) -> Self {
        Self::with_rng(epsilon, StdRng::from_entropy())
    }

    /// Policy with a reproducible random stream
    pub fn with_seed(epsilon: f64, seed: u64) -> Self {
        Self::with_rng(epsilon, StdRng::seed_from_u64(seed))
    }

    fn with_rng(epsilon: f64, rng: StdRng) -> Self {
        EpsilonGreedyPolicy {
            epsilon: clamp_finite(epsilon, 0.0, 1.0),
            rng: Mutex::new(rng),
        }
    }

    /// Exploration rate
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Pick a gateway. Infallible.
    pub fn choose(
        &self,
        context: &ContextFeatures,
        catalog: &[GatewayProfile],
        metrics: &[GatewayMetrics],
    ) -> BanditDecision {
        let candidates = eligible_indices(context, catalog, metrics.len());
        if candidates.is_empty() {
            return BanditDecision {
                chosen_action: 0,
                action_probability: 0.0,
                exploration: false,
                expected_reward: 0.0,
            };
        }

        let mut rng = self.rng.lock();
        if rng.gen::<f64>() < self.epsilon {
            let pick = candidates[rng.gen_range(0..candidates.len())];
            return BanditDecision {
                chosen_action: pick,
                action_probability: 1.0 / candidates.len() as f64,
                exploration: true,
                expected_reward: 0.5,
            };
        }
        drop(rng);

        let mut scores: Vec<(usize, f64)> = candidates
            .iter()
            .map(|&idx| (idx, exploitation_score(idx, context, &metrics[idx])))
            .collect();
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let (best, score) = scores[0];
        BanditDecision {
            chosen_action: best,
            action_probability: 0.9,
            exploration: false,
            expected_reward: score,
        }
    }
}

#[async_trait]
impl RoutingPolicy for EpsilonGreedyPolicy {
    fn name(&self) -> &str {
        "epsilon_greedy"
    }

    async fn decide(
        &self,
        context: &ContextFeatures,
        catalog: &[GatewayProfile],
        metrics: &[GatewayMetrics],
    ) -> Result<BanditDecision> {
        Ok(self.choose(context, catalog, metrics))
    }
}

/// Indices of gateways that serve the region and accept the amount.
/// When nothing qualifies every gateway is a candidate.
fn eligible_indices(context: &ContextFeatures, catalog: &[GatewayProfile], n_metrics: usize) -> Vec<usize> {
    let n = catalog.len().min(n_metrics);
    let eligible: Vec<usize> = (0..n)
        .filter(|&idx| catalog[idx].is_eligible(&context.region, context.amount))
        .collect();

    if eligible.is_empty() {
        (0..n).collect()
    } else {
        eligible
    }
}

fn exploitation_score(idx: usize, context: &ContextFeatures, metrics: &GatewayMetrics) -> f64 {
    let mut score = metrics.success_rate / 100.0;

    // cheaper is better
    score += (5.0 - metrics.cost) / 10.0;

    // latency only matters when the transaction is clearly safe
    if context.risk_score < 0.3 {
        score += (1000.0 - metrics.latency) / 2000.0;
    }

    if context.amount_bucket == AmountBucket::Large && idx == 0 {
        score += 0.1;
    }
    if context.amount_bucket == AmountBucket::Small && idx == 2 {
        score += 0.15;
    }

    score
}

/// Score used to rank alternatives, `[0, 100]`
pub fn alternative_score(profile: &GatewayProfile, metrics: &GatewayMetrics, ctx: &RoutingContext) -> f64 {
    let mut score = metrics.success_rate;
    score -= (metrics.cost - 1.0) * 5.0;
    score -= (metrics.latency - 100.0) / 50.0;

    match profile.name.as_str() {
        "Stripe" if ctx.amount > 5_000.0 => score += 10.0,
        "Solana" if ctx.amount < 100.0 => score += 15.0,
        "AmazonPay" if ctx.risk_score > 50.0 => score -= 5.0,
        _ => {}
    }

    clamp_finite(score, 0.0, 100.0)
}

fn generate_reason(gateway: &str, ctx: &RoutingContext, exploration: bool) -> String {
    match gateway {
        "Stripe" => format!(
            "Best for ${} transactions with {:.1}% risk - enterprise reliability",
            ctx.amount, ctx.risk_score
        ),
        "AmazonPay" => format!(
            "Optimal for {} with trusted checkout experience",
            ctx.merchant_type
        ),
        "Solana" => format!(
            "Most cost-effective for ${} - {} low-cost option",
            ctx.amount,
            if exploration { "exploring" } else { "proven" }
        ),
        _ => "Recommended based on current context and ML optimization".to_string(),
    }
}

fn candidate(
    profile: &GatewayProfile,
    metrics: &GatewayMetrics,
    score: f64,
    reason: String,
    confidence: Option<f64>,
) -> GatewayCandidate {
    GatewayCandidate {
        id: profile.id,
        name: profile.name.clone(),
        success_rate: metrics.success_rate,
        cost: metrics.cost,
        latency: metrics.latency,
        features: profile.features.clone(),
        regions: profile.regions.clone(),
        score,
        reason,
        confidence,
    }
}

fn sort_by_score_desc(candidates: &mut [GatewayCandidate]) {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

/// Gateway selector
pub struct GatewaySelector {
    catalog: Vec<GatewayProfile>,
    policy: Arc<dyn RoutingPolicy>,
    fallback: EpsilonGreedyPolicy,
    sampler: MetricsSampler,
    rng: Mutex<StdRng>,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<dyn DecisionCache>>,
    cache_ttl: Duration,
}

impl GatewaySelector {
    /// Create a selector over a non-empty catalog
    pub fn new(catalog: Vec<GatewayProfile>, policy: Arc<dyn RoutingPolicy>) -> Result<Self> {
        if catalog.is_empty() {
            return Err(Error::InvalidConfig("gateway catalog is empty".to_string()));
        }
        if catalog.iter().enumerate().any(|(idx, g)| g.id != idx) {
            return Err(Error::InvalidConfig(
                "gateway ids must match catalog positions".to_string(),
            ));
        }

        Ok(GatewaySelector {
            catalog,
            policy,
            fallback: EpsilonGreedyPolicy::new(DEFAULT_EPSILON),
            sampler: MetricsSampler::new(true),
            rng: Mutex::new(StdRng::from_entropy()),
            clock: Arc::new(SystemClock),
            cache: None,
            cache_ttl: Duration::from_secs(ttl::ROUTING_DECISION),
        })
    }

    /// Replace the policy used when the primary policy fails
    pub fn with_fallback(mut self, fallback: EpsilonGreedyPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Enable or disable cosmetic metric jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.sampler = MetricsSampler::new(jitter);
        self
    }

    /// Memoize chosen gateways in `cache` for `ttl`
    pub fn with_cache(mut self, cache: Arc<dyn DecisionCache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    /// Replace the clock used for temporal features
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Gateway catalog
    pub fn catalog(&self) -> &[GatewayProfile] {
        &self.catalog
    }

    /// Fingerprint of a routing context
    pub fn context_hash(ctx: &RoutingContext) -> String {
        content_hash(&format!(
            "{}_{}_{}_{}_{}",
            ctx.amount, ctx.currency, ctx.risk_score, ctx.merchant_type, ctx.region
        ))
    }

    /// Select a gateway. Never fails.
    pub async fn select(&self, ctx: &RoutingContext) -> RoutingDecision {
        let ctx = ctx.normalized();
        let context_hash = Self::context_hash(&ctx);

        if let Some(cache) = &self.cache {
            match cache.get_route(&context_hash).await {
                Ok(Some(name)) => {
                    debug!("Routing decision for {} served from cache", context_hash);
                    return self.cached_decision(&name, context_hash);
                }
                Ok(None) => {}
                Err(e) => warn!("Route cache lookup failed, selecting anyway: {}", e),
            }
        }

        let features = ContextFeatures::extract(&ctx, self.clock.now());
        let metrics = {
            let mut rng = self.rng.lock();
            self.sampler.sample(&self.catalog, &mut *rng)
        };

        let decision = match self.policy.decide(&features, &self.catalog, &metrics).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!("Routing policy {} failed, using epsilon-greedy: {}", self.policy.name(), e);
                self.fallback.choose(&features, &self.catalog, &metrics)
            }
        };

        let response = match self.build_decision(&decision, &metrics, &ctx, context_hash.clone()) {
            Ok(response) => response,
            Err(e) => {
                warn!("Unusable routing decision, applying static rules: {}", e);
                return self.rule_based_fallback(&ctx, context_hash);
            }
        };

        if let Some(cache) = &self.cache {
            if let Err(e) = cache
                .put_route(&context_hash, &response.recommended.name, self.cache_ttl)
                .await
            {
                warn!("Failed to cache routing decision {}: {}", context_hash, e);
            }
        }

        info!(
            "Gateway selected for context {}: {} (score: {:.2}, model: {:?})",
            context_hash,
            response.recommended.name,
            response.recommended.score,
            response.decision_context.model
        );

        response
    }

    fn build_decision(
        &self,
        decision: &BanditDecision,
        metrics: &[GatewayMetrics],
        ctx: &RoutingContext,
        context_hash: String,
    ) -> Result<RoutingDecision> {
        let idx = decision.chosen_action;
        let (chosen, chosen_metrics) = self
            .catalog
            .get(idx)
            .zip(metrics.get(idx))
            .ok_or(Error::UnknownAction(idx))?;

        let probability = clamp_finite(decision.action_probability, 0.0, 1.0);

        let recommended = candidate(
            chosen,
            chosen_metrics,
            clamp_finite(decision.expected_reward * 100.0, 0.0, 100.0),
            generate_reason(&chosen.name, ctx, decision.exploration),
            Some(probability * 100.0),
        );

        let mut alternatives: Vec<GatewayCandidate> = self
            .catalog
            .iter()
            .zip(metrics)
            .filter(|(g, _)| g.name != recommended.name)
            .map(|(g, m)| {
                candidate(
                    g,
                    m,
                    alternative_score(g, m, ctx),
                    generate_reason(&g.name, ctx, false),
                    None,
                )
            })
            .collect();
        sort_by_score_desc(&mut alternatives);

        Ok(RoutingDecision {
            recommended,
            alternatives,
            decision_context: DecisionContext {
                model: if decision.exploration {
                    DecisionModel::Exploration
                } else {
                    DecisionModel::Exploitation
                },
                confidence: probability,
                context_hash,
            },
        })
    }

    fn find(&self, name: &str) -> &GatewayProfile {
        self.catalog
            .iter()
            .find(|g| g.name == name)
            .unwrap_or(&self.catalog[0])
    }

    fn cached_decision(&self, name: &str, context_hash: String) -> RoutingDecision {
        let gateway = self.find(name);

        RoutingDecision {
            recommended: candidate(
                gateway,
                &GatewayMetrics::baseline(gateway),
                85.0,
                format!("Cached recommendation for {}", gateway.name),
                Some(90.0),
            ),
            alternatives: Vec::new(),
            decision_context: DecisionContext {
                model: DecisionModel::Cached,
                confidence: 0.9,
                context_hash,
            },
        }
    }

    /// Static selection used when the policy answer cannot be used
    pub fn rule_based_fallback(&self, ctx: &RoutingContext, context_hash: String) -> RoutingDecision {
        let chosen = if ctx.amount < 100.0 && ctx.risk_score < 30.0 {
            self.find("Solana")
        } else if ctx.merchant_type == "e-commerce" && ctx.risk_score < 50.0 {
            self.find("AmazonPay")
        } else {
            &self.catalog[0]
        };

        let alternatives = self
            .catalog
            .iter()
            .filter(|g| g.name != chosen.name)
            .map(|g| {
                candidate(
                    g,
                    &GatewayMetrics::baseline(g),
                    60.0,
                    "Alternative option".to_string(),
                    None,
                )
            })
            .collect();

        RoutingDecision {
            recommended: candidate(
                chosen,
                &GatewayMetrics::baseline(chosen),
                75.0,
                "Rule-based fallback recommendation".to_string(),
                Some(60.0),
            ),
            alternatives,
            decision_context: DecisionContext {
                model: DecisionModel::RuleBasedFallback,
                confidence: 0.6,
                context_hash,
            },
        }
    }
}
