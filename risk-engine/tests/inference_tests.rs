//! Remote inference clients against a mock HTTP server

use chrono::{TimeZone, Utc};
use risk_engine::features::FixedClock;
use risk_engine::{
    default_catalog, DecisionModel, InferenceConfig, ModelSource, RemoteBanditPolicy,
    RemoteInferenceBackend, RiskScorer, RoutingContext, ScoringRequest,
};
use risk_engine::{GatewaySelector, Recommendation};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()))
}

fn request() -> ScoringRequest {
    ScoringRequest {
        user_id: "user_remote".to_string(),
        card_id: "card_remote".to_string(),
        amount: 45.20,
        merchant_category: "online_retail".to_string(),
        location: "San Francisco, CA".to_string(),
        device_info: "Chrome/Mac".to_string(),
        transaction_id: Some("txn_1".to_string()),
        previous_declines: Some(0),
        velocity_last_hour: Some(2),
    }
}

fn routing_context() -> RoutingContext {
    RoutingContext {
        amount: 50.0,
        currency: "USD".to_string(),
        risk_score: 15.0,
        merchant_type: "retail".to_string(),
        region: "US".to_string(),
    }
}

fn config(server: &MockServer, endpoint: &str) -> InferenceConfig {
    InferenceConfig {
        endpoint: format!("{}{}", server.uri(), endpoint),
        timeout: Duration::from_millis(500),
    }
}

#[tokio::test]
async fn test_remote_score_is_used() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fraud"))
        .and(body_partial_json(json!({ "instances": [{ "amount": 45.2 }] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "predictions": [{ "score": 0.82 }] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let backend = RemoteInferenceBackend::new(config(&server, "/fraud")).unwrap();
    let scorer = RiskScorer::new(Arc::new(backend)).with_clock(clock());
    let result = scorer.score(&request()).await;

    assert_eq!(result.model_source, ModelSource::MlEnsemble);
    assert!((result.risk_score - 82.0).abs() < 1e-9);
    assert_eq!(result.recommendation, Recommendation::Block);
}

#[tokio::test]
async fn test_server_error_falls_back_to_heuristic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fraud"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&server)
        .await;

    let backend = RemoteInferenceBackend::new(config(&server, "/fraud")).unwrap();
    let scorer = RiskScorer::new(Arc::new(backend)).with_clock(clock());
    let result = scorer.score(&request()).await;

    assert_eq!(result.model_source, ModelSource::LocalFallback);
    assert!((result.risk_score - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_garbage_body_falls_back_to_heuristic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fraud"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let backend = RemoteInferenceBackend::new(config(&server, "/fraud")).unwrap();
    let scorer = RiskScorer::new(Arc::new(backend)).with_clock(clock());

    assert_eq!(scorer.score(&request()).await.model_source, ModelSource::LocalFallback);
}

#[tokio::test]
async fn test_slow_model_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fraud"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "predictions": [{ "score": 0.9 }] }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let backend = RemoteInferenceBackend::new(InferenceConfig {
        endpoint: format!("{}/fraud", server.uri()),
        timeout: Duration::from_millis(100),
    })
    .unwrap();
    let scorer = RiskScorer::new(Arc::new(backend)).with_clock(clock());

    assert_eq!(scorer.score(&request()).await.model_source, ModelSource::LocalFallback);
}

#[tokio::test]
async fn test_remote_bandit_choice_is_used() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/routing"))
        .and(body_partial_json(json!({
            "actions": [
                { "actionId": 0, "features": { "supportsRegion": true, "supportsAmount": true } },
                { "actionId": 1 },
                { "actionId": 2 }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "actionId": 0,
            "probability": 0.7,
            "exploration": false,
            "expectedReward": 0.88
        })))
        .mount(&server)
        .await;

    let policy = RemoteBanditPolicy::new(config(&server, "/routing")).unwrap();
    let selector = GatewaySelector::new(default_catalog(), Arc::new(policy))
        .unwrap()
        .with_jitter(false)
        .with_clock(clock());

    let decision = selector.select(&routing_context()).await;

    assert_eq!(decision.recommended.name, "Stripe");
    assert_eq!(decision.decision_context.model, DecisionModel::Exploitation);
    assert!((decision.recommended.score - 88.0).abs() < 1e-9);
    assert!((decision.decision_context.confidence - 0.7).abs() < 1e-9);
}

#[tokio::test]
async fn test_out_of_range_action_uses_rules() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/routing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "chosenAction": 9 })))
        .mount(&server)
        .await;

    let policy = RemoteBanditPolicy::new(config(&server, "/routing")).unwrap();
    let selector = GatewaySelector::new(default_catalog(), Arc::new(policy))
        .unwrap()
        .with_clock(clock());

    let decision = selector.select(&routing_context()).await;

    assert_eq!(decision.decision_context.model, DecisionModel::RuleBasedFallback);
    assert_eq!(decision.recommended.name, "Solana");
    assert_eq!(decision.decision_context.confidence, 0.6);
}

#[tokio::test]
async fn test_unreachable_bandit_uses_epsilon_greedy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/routing"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let policy = RemoteBanditPolicy::new(config(&server, "/routing")).unwrap();
    let selector = GatewaySelector::new(default_catalog(), Arc::new(policy))
        .unwrap()
        .with_fallback(risk_engine::EpsilonGreedyPolicy::with_seed(0.0, 5))
        .with_jitter(false)
        .with_clock(clock());

    let decision = selector.select(&routing_context()).await;

    assert_eq!(decision.decision_context.model, DecisionModel::Exploitation);
    assert_eq!(decision.recommended.name, "Solana");
}
