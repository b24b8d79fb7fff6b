//! Core types for risk engine

use serde::{Deserialize, Serialize};

/// Risk score (0-100) above which a transaction is blocked
pub const HIGH_RISK_THRESHOLD: f64 = 70.0;

/// Risk score (0-100) above which a transaction goes to manual review
pub const MEDIUM_RISK_THRESHOLD: f64 = 40.0;

/// Clamp a value into `[min, max]`, mapping NaN to `min`
pub fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.max(min).min(max)
    }
}

// ===== Fraud scoring =====

/// Card transaction submitted for fraud scoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringRequest {
    /// Card holder
    #[serde(default)]
    pub user_id: String,

    /// Card used for the payment
    #[serde(default)]
    pub card_id: String,

    /// Transaction amount in major units
    pub amount: f64,

    /// Merchant category, e.g. `online_retail` or `gambling`
    #[serde(default)]
    pub merchant_category: String,

    /// Free-form location string reported by the client
    #[serde(default)]
    pub location: String,

    /// Free-form device fingerprint reported by the client
    #[serde(default)]
    pub device_info: String,

    /// Caller supplied transaction reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    /// Declines seen on this card recently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_declines: Option<u32>,

    /// Transactions on this card in the last hour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_last_hour: Option<u32>,
}

impl ScoringRequest {
    /// Previous declines, treating a missing value as none
    pub fn previous_declines(&self) -> u32 {
        self.previous_declines.unwrap_or(0)
    }

    /// Hourly velocity, treating a missing value as the current transaction only
    pub fn velocity_last_hour(&self) -> u32 {
        self.velocity_last_hour.unwrap_or(1)
    }
}

/// Risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Low risk
    Low,
    /// Medium risk
    Medium,
    /// High risk
    High,
}

impl RiskLevel {
    /// Bucket a fraud probability in `[0, 1]`
    pub fn from_probability(p: f64) -> Self {
        Self::from_score(p * 100.0)
    }

    /// Bucket a risk score in `[0, 100]`
    pub fn from_score(score: f64) -> Self {
        if score > HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else if score > MEDIUM_RISK_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Action recommended to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    /// Low risk, proceed
    Approve,
    /// Manual review needed
    Review,
    /// High risk, block
    Block,
}

impl From<RiskLevel> for Recommendation {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => Recommendation::Approve,
            RiskLevel::Medium => Recommendation::Review,
            RiskLevel::High => Recommendation::Block,
        }
    }
}

/// Where the final fraud probability came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    /// Remote model ensemble
    MlEnsemble,
    /// Local deterministic heuristic
    LocalFallback,
    /// Previously computed score
    Cached,
}

/// Coarse anomaly indicators derived from the final probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyFlags {
    /// Amount looks unusual
    pub amount_anomaly: bool,
    /// Location looks unusual
    pub location_anomaly: bool,
    /// Velocity looks unusual
    pub velocity_anomaly: bool,
    /// Device looks unusual
    pub device_anomaly: bool,
}

/// Fraud scoring outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringResult {
    /// Risk score in `[0, 100]`
    pub risk_score: f64,
    /// Risk level
    pub risk_level: RiskLevel,
    /// Recommended action
    pub recommendation: Recommendation,
    /// Confidence in `[75, 95]`
    pub confidence: f64,
    /// Anomaly indicators
    pub features: AnomalyFlags,
    /// Source of the probability
    pub model_source: ModelSource,
}

impl ScoringResult {
    /// Map a fraud probability to the full result tuple.
    ///
    /// The probability is clamped into `[0, 1]` first, so every derived value
    /// stays inside its documented range. The level is bucketed from the
    /// reported `risk_score`, so the two always agree after rounding.
    pub fn from_probability(p: f64, model_source: ModelSource) -> Self {
        let p = clamp_finite(p, 0.0, 1.0);
        let risk_score = p * 100.0;
        let risk_level = RiskLevel::from_score(risk_score);

        ScoringResult {
            risk_score,
            risk_level,
            recommendation: Recommendation::from(risk_level),
            confidence: (75.0 + p * 20.0).min(95.0),
            features: AnomalyFlags {
                amount_anomaly: p > 0.6,
                location_anomaly: p > 0.5,
                velocity_anomaly: p > 0.4,
                device_anomaly: p > 0.7,
            },
            model_source,
        }
    }
}

// ===== Gateway routing =====

/// Context a routing decision is made for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingContext {
    /// Transaction amount in major units
    pub amount: f64,
    /// ISO currency code
    pub currency: String,
    /// Risk score from the fraud scorer, `[0, 100]`
    pub risk_score: f64,
    /// Merchant type, e.g. `e-commerce`
    pub merchant_type: String,
    /// Region code, e.g. `US`
    pub region: String,
}

impl RoutingContext {
    /// Copy of the context with amount and risk score forced into range
    pub fn normalized(&self) -> Self {
        RoutingContext {
            amount: clamp_finite(self.amount, 0.0, f64::MAX),
            risk_score: clamp_finite(self.risk_score, 0.0, 100.0),
            ..self.clone()
        }
    }
}

/// A gateway as presented to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCandidate {
    /// Catalog index
    pub id: usize,
    /// Gateway name
    pub name: String,
    /// Observed success rate, percent
    pub success_rate: f64,
    /// Observed cost, percent of amount
    pub cost: f64,
    /// Observed latency, milliseconds
    pub latency: f64,
    /// Capabilities advertised by the gateway
    pub features: Vec<String>,
    /// Regions served
    pub regions: Vec<String>,
    /// Suitability score in `[0, 100]`
    pub score: f64,
    /// Human readable explanation
    pub reason: String,
    /// Decision confidence, only set on the recommended gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// How the recommended gateway was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionModel {
    /// Policy tried a gateway to learn about it
    Exploration,
    /// Policy picked the best known gateway
    Exploitation,
    /// Served from the decision cache
    Cached,
    /// Static rules after the policy output could not be used
    RuleBasedFallback,
}

/// Metadata about a routing decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionContext {
    /// Decision model
    pub model: DecisionModel,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    /// Fingerprint of the routing context
    pub context_hash: String,
}

/// Selector output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    /// Gateway to use
    pub recommended: GatewayCandidate,
    /// Remaining gateways, best first
    pub alternatives: Vec<GatewayCandidate>,
    /// Decision metadata
    pub decision_context: DecisionContext,
}

/// Raw choice returned by a routing policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanditDecision {
    /// Index into the gateway catalog
    pub chosen_action: usize,
    /// Probability the policy assigned to the action
    pub action_probability: f64,
    /// Whether the action was exploratory
    pub exploration: bool,
    /// Expected reward of the action
    pub expected_reward: f64,
}
