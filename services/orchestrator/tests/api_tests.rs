use actix_web::{http::StatusCode, test, web, App};
use jsonwebtoken::{encode, EncodingKey, Header};
use payment_orchestrator::config::{CacheBackend, Config, InferenceMode};
use payment_orchestrator::middleware::Claims;
use payment_orchestrator::{handlers, metrics, AppState};
use risk_engine::InMemoryCache;
use serde_json::{json, Value};
use std::sync::Arc;

const SECRET: &str = "api-test-secret";

fn test_config() -> Config {
    let mut config = Config::from_env().unwrap();
    config.auth.jwt_secret = SECRET.to_string();
    config.inference.mode = InferenceMode::Local;
    config.cache.backend = CacheBackend::Memory;
    config.routing.simulate_jitter = false;
    config.server.environment = "test".to_string();
    config
}

fn bearer() -> String {
    let claims = Claims {
        sub: "user-42".to_string(),
        email: Some("user42@example.com".to_string()),
        username: Some("user42".to_string()),
        exp: None,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
    format!("Bearer {}", token)
}

fn fraud_body() -> Value {
    json!({
        "userId": "user_local_test_123",
        "cardId": "card_4242424242424242",
        "amount": 45.20,
        "merchantCategory": "online_retail",
        "location": "San Francisco, CA",
        "deviceInfo": "Chrome/Mac",
        "previousDeclines": 0,
        "velocityLastHour": 2
    })
}

fn route_body() -> Value {
    json!({
        "amount": 50.0,
        "currency": "USD",
        "riskScore": 15.0,
        "merchantType": "retail",
        "region": "US"
    })
}

macro_rules! app {
    () => {{
        metrics::init();
        let config = test_config();
        let state = Arc::new(AppState::with_cache(&config, Arc::new(InMemoryCache::default())).unwrap());
        test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(|cfg| handlers::configure_routes(cfg, SECRET)),
        )
        .await
    }};
}

#[actix_web::test]
async fn test_health_needs_no_token() {
    let app = app!();
    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "test");
    assert!(body["timestamp"].is_string());
}

#[actix_web::test]
async fn test_fraud_requires_token() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/fraud")
        .set_json(fraud_body())
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": "Unauthorized" }));
}

#[actix_web::test]
async fn test_bad_signature_is_unauthorized() {
    let app = app!();
    let forged = encode(
        &Header::default(),
        &json!({ "sub": "intruder" }),
        &EncodingKey::from_secret(b"not-the-secret"),
    )
    .unwrap();
    let req = test::TestRequest::post()
        .uri("/api/route")
        .insert_header(("Authorization", format!("Bearer {}", forged)))
        .set_json(route_body())
        .to_request();

    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_fraud_missing_field() {
    let app = app!();
    let mut body = fraud_body();
    body.as_object_mut().unwrap().remove("deviceInfo");

    let req = test::TestRequest::post()
        .uri("/api/fraud")
        .insert_header(("Authorization", bearer()))
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Missing required fields");
    assert_eq!(body["required"].as_array().unwrap().len(), 6);
}

#[actix_web::test]
async fn test_fraud_scores_low_risk() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/fraud")
        .insert_header(("Authorization", bearer()))
        .set_json(fraud_body())
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["recommendation"], "APPROVE");
    assert_eq!(body["riskLevel"], "low");
    assert_eq!(body["modelSource"], "local_fallback");
    assert!((body["riskScore"].as_f64().unwrap() - 10.0).abs() < 1e-9);
}

#[actix_web::test]
async fn test_route_missing_region() {
    let app = app!();
    let mut body = route_body();
    body.as_object_mut().unwrap().remove("region");

    let req = test::TestRequest::post()
        .uri("/api/route")
        .insert_header(("Authorization", bearer()))
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["required"],
        json!(["amount", "currency", "riskScore", "merchantType", "region"])
    );
}

#[actix_web::test]
async fn test_route_returns_decision() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/route")
        .insert_header(("Authorization", bearer()))
        .set_json(route_body())
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;

    let recommended = body["recommended"]["name"].as_str().unwrap();
    let alternatives = body["alternatives"].as_array().unwrap();
    assert_eq!(alternatives.len(), 2);
    assert!(alternatives.iter().all(|a| a["name"] != recommended));
    assert_eq!(body["decisionContext"]["contextHash"].as_str().unwrap().len(), 16);
}

#[actix_web::test]
async fn test_repeated_route_is_cached() {
    let app = app!();
    let send = || {
        test::TestRequest::post()
            .uri("/api/route")
            .insert_header(("Authorization", bearer()))
            .set_json(route_body())
            .to_request()
    };

    let first: Value = test::call_and_read_body_json(&app, send()).await;
    let second: Value = test::call_and_read_body_json(&app, send()).await;

    assert_eq!(second["decisionContext"]["model"], "cached");
    assert_eq!(first["recommended"]["name"], second["recommended"]["name"]);
}

#[actix_web::test]
async fn test_malformed_json_is_bad_request() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/fraud")
        .insert_header(("Authorization", bearer()))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"amount\": \"lots\"")
        .to_request();

    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_mock_inference_endpoints() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/ml/fraud/predict")
        .set_json(json!({ "instances": [] }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let score = body["predictions"][0]["score"].as_f64().unwrap();
    assert!((0.1..0.4).contains(&score));

    let req = test::TestRequest::post()
        .uri("/ml/routing/predict")
        .set_json(json!({ "actions": [] }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["chosenAction"].as_u64().unwrap() < 3);
    assert!(body["recommendedGateway"].is_string());
}

#[actix_web::test]
async fn test_metrics_exposed() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/route")
        .insert_header(("Authorization", bearer()))
        .set_json(route_body())
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let body = test::call_and_read_body(&app, req).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("routing_decisions_total"));
}
