pub mod cache;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod state;

// Re-exports for convenience
pub use config::Config;
pub use state::AppState;
