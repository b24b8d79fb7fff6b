use actix_cors::Cors;
use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use payment_orchestrator::{
    config::Config,
    handlers, metrics,
    middleware::{RateLimiter, RequestMetrics},
    AppState,
};
use risk_engine::DecisionCache;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn cors(origin: &str) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

    if origin == "*" {
        cors.allow_any_origin()
    } else {
        cors.allowed_origin(origin).supports_credentials()
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    info!("Starting Payment Orchestrator...");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "Configuration loaded (environment: {}, inference: {:?}, cache: {:?})",
        config.server.environment, config.inference.mode, config.cache.backend
    );

    metrics::init();

    let state = Arc::new(AppState::from_config(&config).await?);
    let rate_limiter = RateLimiter::new(config.rate_limit.requests_per_minute);

    info!("Decision components initialized successfully");

    let server_config = config.server.clone();
    let jwt_secret = config.auth.jwt_secret.clone();
    let shutdown_state = state.clone();

    info!(
        "Starting HTTP server on {}:{}",
        server_config.host, server_config.port
    );

    let cors_origin = server_config.cors_origin.clone();
    HttpServer::new(move || {
        let jwt_secret = jwt_secret.clone();
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(rate_limiter.clone())
            .wrap(cors(&cors_origin))
            .wrap(RequestMetrics)
            .wrap(actix_middleware::Logger::default())
            .configure(move |cfg| handlers::configure_routes(cfg, &jwt_secret))
    })
    .workers(server_config.workers)
    .bind((server_config.host.as_str(), server_config.port))
    .with_context(|| format!("Failed to bind {}:{}", server_config.host, server_config.port))?
    .run()
    .await?;

    if let Err(e) = shutdown_state.cache.close().await {
        tracing::warn!("Failed to close decision cache: {}", e);
    }
    info!("Payment Orchestrator stopped");

    Ok(())
}
