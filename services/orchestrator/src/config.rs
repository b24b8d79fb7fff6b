use config::{ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub inference: InferenceSettings,
    pub routing: RoutingConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub environment: String,
    pub cors_origin: String,
}

impl ServerConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: String,
    pub risk_ttl_seconds: u64,
    pub route_ttl_seconds: u64,
    pub max_entries: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    Local,
    Remote,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InferenceSettings {
    pub mode: InferenceMode,
    pub fraud_endpoint: String,
    pub routing_endpoint: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RoutingConfig {
    pub epsilon: f64,
    pub simulate_jitter: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            // Server defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3001)?
            .set_default("server.workers", 4)?
            .set_default("server.environment", "development")?
            .set_default("server.cors_origin", "http://localhost:8081")?
            // Cache defaults
            .set_default("cache.backend", "memory")?
            .set_default("cache.redis_url", "redis://localhost:6379")?
            .set_default("cache.risk_ttl_seconds", 1800)?
            .set_default("cache.route_ttl_seconds", 900)?
            .set_default("cache.max_entries", 10000)?
            // Inference defaults
            .set_default("inference.mode", "local")?
            .set_default("inference.fraud_endpoint", "http://localhost:3001/ml/fraud/predict")?
            .set_default("inference.routing_endpoint", "http://localhost:3001/ml/routing/predict")?
            .set_default("inference.timeout_ms", 2000)?
            // Routing defaults
            .set_default("routing.epsilon", 0.1)?
            .set_default("routing.simulate_jitter", true)?
            // Auth and rate limiting
            .set_default("auth.jwt_secret", "dev-secret-change-me")?
            .set_default("rate_limit.requests_per_minute", 600)?;

        builder = builder.add_source(Environment::with_prefix("ORCHESTRATOR").separator("__"));

        // Override from environment variables
        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        if let Ok(redis_url) = env::var("REDIS_URL") {
            builder = builder
                .set_override("cache.redis_url", redis_url)?
                .set_override("cache.backend", "redis")?;
        }

        if let Ok(secret) = env::var("JWT_SECRET") {
            builder = builder.set_override("auth.jwt_secret", secret)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::Message("auth.jwt_secret must not be empty".to_string()));
        }
        if self.rate_limit.requests_per_minute == 0 {
            return Err(ConfigError::Message(
                "rate_limit.requests_per_minute must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.routing.epsilon) {
            return Err(ConfigError::Message("routing.epsilon must be within [0, 1]".to_string()));
        }
        Ok(())
    }
}
