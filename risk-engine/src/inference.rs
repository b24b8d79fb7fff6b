//! HTTP clients for the remote fraud model and routing bandit

use crate::features::{ContextFeatures, FeatureVector};
use crate::gateways::{GatewayMetrics, GatewayProfile};
use crate::routing::RoutingPolicy;
use crate::scoring::ScoringBackend;
use crate::types::{BanditDecision, ModelSource, ScoringRequest};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Default request timeout (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 2_000;

/// Remote endpoint configuration
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Endpoint URL
    pub endpoint: String,
    /// Request timeout
    pub timeout: Duration,
}

impl InferenceConfig {
    /// Configuration with the default timeout
    pub fn new(endpoint: impl Into<String>) -> Self {
        InferenceConfig {
            endpoint: endpoint.into(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

fn build_client(config: &InferenceConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| Error::InvalidConfig(format!("http client: {}", e)))
}

async fn post_json<T: DeserializeOwned>(
    client: &Client,
    endpoint: &str,
    body: &serde_json::Value,
) -> Result<T> {
    let response = client.post(endpoint).json(body).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(Error::Inference(format!("{} returned {}: {}", endpoint, status, body)));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| Error::Inference(format!("malformed response from {}: {}", endpoint, e)))
}

#[derive(Debug, Deserialize)]
struct Prediction {
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

/// Fraud model served over HTTP
pub struct RemoteInferenceBackend {
    config: InferenceConfig,
    client: Client,
}

impl RemoteInferenceBackend {
    /// Create a client for `config.endpoint`
    pub fn new(config: InferenceConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ScoringBackend for RemoteInferenceBackend {
    fn name(&self) -> &str {
        "remote_fraud_model"
    }

    fn source(&self) -> ModelSource {
        ModelSource::MlEnsemble
    }

    async fn predict(&self, _request: &ScoringRequest, features: &FeatureVector) -> Result<f64> {
        let body = json!({ "instances": [features] });
        let response: PredictionResponse =
            post_json(&self.client, &self.config.endpoint, &body).await?;

        let score = response
            .predictions
            .first()
            .and_then(|p| p.score)
            .ok_or_else(|| Error::Inference("response carried no prediction".to_string()))?;

        if !score.is_finite() {
            return Err(Error::Inference(format!("non-finite score {}", score)));
        }

        debug!("Remote fraud model scored {:.4}", score);
        Ok(score)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionFeatures {
    success_rate: f64,
    cost: f64,
    latency: f64,
    supports_region: bool,
    supports_amount: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Action {
    action_id: usize,
    features: ActionFeatures,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BanditResponse {
    #[serde(default, alias = "chosenAction", alias = "chosen_action")]
    action_id: Option<i64>,
    #[serde(default, alias = "action_probability")]
    probability: Option<f64>,
    #[serde(default)]
    exploration: Option<bool>,
    #[serde(default, alias = "expected_reward")]
    expected_reward: Option<f64>,
}

impl From<BanditResponse> for BanditDecision {
    fn from(r: BanditResponse) -> Self {
        BanditDecision {
            // negative ids can never index the catalog
            chosen_action: r
                .action_id
                .map_or(0, |id| usize::try_from(id).unwrap_or(usize::MAX)),
            action_probability: r.probability.unwrap_or(0.5),
            exploration: r.exploration.unwrap_or(false),
            expected_reward: r.expected_reward.unwrap_or(0.8),
        }
    }
}

/// Contextual bandit served over HTTP
pub struct RemoteBanditPolicy {
    config: InferenceConfig,
    client: Client,
}

impl RemoteBanditPolicy {
    /// Create a client for `config.endpoint`
    pub fn new(config: InferenceConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl RoutingPolicy for RemoteBanditPolicy {
    fn name(&self) -> &str {
        "remote_bandit"
    }

    async fn decide(
        &self,
        context: &ContextFeatures,
        catalog: &[GatewayProfile],
        metrics: &[GatewayMetrics],
    ) -> Result<BanditDecision> {
        let actions: Vec<Action> = catalog
            .iter()
            .zip(metrics)
            .enumerate()
            .map(|(idx, (gateway, m))| Action {
                action_id: idx,
                features: ActionFeatures {
                    success_rate: m.success_rate,
                    cost: m.cost,
                    latency: m.latency,
                    supports_region: gateway.supports_region(&context.region),
                    supports_amount: gateway.supports_amount(context.amount),
                },
            })
            .collect();

        let body = json!({ "contextFeatures": context, "actions": actions });
        let response: BanditResponse =
            post_json(&self.client, &self.config.endpoint, &body).await?;

        let decision = BanditDecision::from(response);
        debug!(
            "Remote bandit chose action {} (p={:.2})",
            decision.chosen_action, decision.action_probability
        );
        Ok(decision)
    }
}
