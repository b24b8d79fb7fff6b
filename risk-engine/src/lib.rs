//! Risk Engine for SmartPay
//!
//! Fraud scoring and payment gateway selection. Both decisions are made by a
//! pluggable strategy (a remote model or a local one) and both degrade to
//! deterministic rules instead of failing.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod features;
pub mod gateways;
pub mod inference;
pub mod routing;
pub mod scoring;
pub mod types;

pub use cache::{DecisionCache, InMemoryCache};
pub use error::{Error, Result};
pub use features::{Clock, ContextFeatures, FeatureTables, FeatureVector, SystemClock};
pub use gateways::{default_catalog, GatewayMetrics, GatewayProfile};
pub use inference::{InferenceConfig, RemoteBanditPolicy, RemoteInferenceBackend};
pub use routing::{EpsilonGreedyPolicy, GatewaySelector, RoutingPolicy};
pub use scoring::{HeuristicBackend, RiskScorer, ScoringBackend};
pub use types::*;
