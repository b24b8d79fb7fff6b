use crate::errors::{ApiError, ApiResult};
use crate::metrics::{self, FRAUD_DECISIONS, ROUTING_DECISIONS, UPSTREAM_FALLBACKS};
use crate::middleware::{Claims, JwtAuth};
use crate::models::*;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use rand::Rng;
use risk_engine::{DecisionModel, ModelSource};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

fn label<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

// ===== Health Check =====
pub async fn health_check(state: web::Data<Arc<AppState>>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.environment.clone(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

// ===== Prometheus Metrics =====
pub async fn prometheus_metrics(state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let body = metrics::metrics_handler().map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        ApiError::internal(e.to_string(), state.show_error_details)
    })?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

// ===== Fraud Detection =====
pub async fn analyze_fraud(
    body: web::Json<FraudCheckRequest>,
    claims: Option<web::ReqData<Claims>>,
    state: web::Data<Arc<AppState>>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner().validate()?;
    let transaction_id = request.transaction_id.clone().unwrap_or_default();

    info!(
        "Processing fraud detection request {} (amount: {}, category: {}, user: {})",
        transaction_id,
        request.amount,
        request.merchant_category,
        claims.as_ref().map_or("anonymous", |c| c.sub.as_str())
    );

    let result = state.scorer.score(&request).await;

    FRAUD_DECISIONS
        .with_label_values(&[&label(&result.recommendation), &label(&result.model_source)])
        .inc();
    if result.model_source == ModelSource::LocalFallback {
        UPSTREAM_FALLBACKS.with_label_values(&["fraud_heuristic"]).inc();
    }

    info!(
        "Fraud analysis completed for {}: risk score {:.2}, recommendation {:?}",
        transaction_id, result.risk_score, result.recommendation
    );

    Ok(HttpResponse::Ok().json(result))
}

// ===== Routing Optimization =====
pub async fn optimize_routing(
    body: web::Json<RouteRequest>,
    state: web::Data<Arc<AppState>>,
) -> ApiResult<HttpResponse> {
    let context = body.into_inner().validate()?;

    info!(
        "Processing routing optimization request (amount: {}, currency: {}, risk: {}, merchant: {})",
        context.amount, context.currency, context.risk_score, context.merchant_type
    );

    let decision = state.selector.select(&context).await;
    let model = decision.decision_context.model;

    ROUTING_DECISIONS
        .with_label_values(&[&decision.recommended.name, &label(&model)])
        .inc();
    if model == DecisionModel::RuleBasedFallback {
        UPSTREAM_FALLBACKS.with_label_values(&["routing_rules"]).inc();
    }

    info!(
        "Routing optimization completed: {} (score: {:.1}, model: {:?})",
        decision.recommended.name, decision.recommended.score, model
    );

    Ok(HttpResponse::Ok().json(decision))
}

// ===== Mock Inference Endpoints =====
pub async fn mock_fraud_predict(_body: web::Json<Value>) -> HttpResponse {
    let score = 0.1 + rand::thread_rng().gen::<f64>() * 0.3;

    HttpResponse::Ok().json(MockFraudResponse {
        predictions: vec![MockPrediction { score }],
        model: "local-mock-fraud-detector".to_string(),
    })
}

pub async fn mock_routing_predict(
    _body: web::Json<Value>,
    state: web::Data<Arc<AppState>>,
) -> HttpResponse {
    let catalog = state.selector.catalog();
    let mut rng = rand::thread_rng();
    let chosen = rng.gen_range(0..catalog.len());

    HttpResponse::Ok().json(MockRoutingResponse {
        chosen_action: chosen,
        probability: 0.7 + rng.gen::<f64>() * 0.25,
        exploration: rng.gen::<f64>() < 0.3,
        expected_reward: 0.8 + rng.gen::<f64>() * 0.15,
        recommended_gateway: catalog[chosen].name.clone(),
    })
}

fn json_error_handler(
    err: actix_web::error::JsonPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    ApiError::InvalidBody(err.to_string()).into()
}

// ===== Route Configuration =====
pub fn configure_routes(cfg: &mut web::ServiceConfig, jwt_secret: &str) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(prometheus_metrics))
        .service(
            web::scope("/api")
                .wrap(JwtAuth::new(jwt_secret))
                .route("/fraud", web::post().to(analyze_fraud))
                .route("/route", web::post().to(optimize_routing)),
        )
        .service(
            web::scope("/ml")
                .route("/fraud/predict", web::post().to(mock_fraud_predict))
                .route("/routing/predict", web::post().to(mock_routing_predict)),
        );
}
