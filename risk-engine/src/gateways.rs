//! Payment gateway catalog and live metric snapshots

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Amount above which capped gateways stop accepting transactions
pub const DEFAULT_AMOUNT_CAP: f64 = 50_000.0;

/// Static description of a gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayProfile {
    /// Index in the catalog, also the bandit action id
    pub id: usize,
    /// Gateway name
    pub name: String,
    /// Baseline success rate, percent
    pub base_success_rate: f64,
    /// Baseline cost, percent of amount
    pub base_cost: f64,
    /// Baseline latency, milliseconds
    pub base_latency: f64,
    /// Advertised capabilities
    pub features: Vec<String>,
    /// Served regions; `Global` serves every region
    pub regions: Vec<String>,
    /// Largest accepted amount, if capped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
}

impl GatewayProfile {
    /// Whether the gateway serves `region`
    pub fn supports_region(&self, region: &str) -> bool {
        self.regions
            .iter()
            .any(|r| r.eq_ignore_ascii_case(region) || r.eq_ignore_ascii_case("global"))
    }

    /// Whether the gateway accepts `amount`
    pub fn supports_amount(&self, amount: f64) -> bool {
        self.max_amount.map_or(true, |max| amount <= max)
    }

    /// Whether the gateway may be chosen for this region and amount
    pub fn is_eligible(&self, region: &str, amount: f64) -> bool {
        self.supports_region(region) && self.supports_amount(amount)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The fixed three-gateway catalog: card network, wallet provider, ledger network
pub fn default_catalog() -> Vec<GatewayProfile> {
    vec![
        GatewayProfile {
            id: 0,
            name: "Stripe".to_string(),
            base_success_rate: 97.8,
            base_cost: 2.9,
            base_latency: 150.0,
            features: strings(&["Cards", "ACH", "Wallets"]),
            regions: strings(&["US", "EU", "Global"]),
            max_amount: None,
        },
        GatewayProfile {
            id: 1,
            name: "AmazonPay".to_string(),
            base_success_rate: 96.2,
            base_cost: 2.5,
            base_latency: 120.0,
            features: strings(&["Amazon Users", "Fast Checkout"]),
            regions: strings(&["US", "EU"]),
            max_amount: Some(DEFAULT_AMOUNT_CAP),
        },
        GatewayProfile {
            id: 2,
            name: "Solana".to_string(),
            base_success_rate: 99.1,
            base_cost: 0.1,
            base_latency: 800.0,
            features: strings(&["Crypto", "Low Fees", "Fast Settlement"]),
            regions: strings(&["Global"]),
            max_amount: Some(DEFAULT_AMOUNT_CAP),
        },
    ]
}

/// Observed performance of one gateway
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayMetrics {
    /// Success rate, percent
    pub success_rate: f64,
    /// Cost, percent of amount
    pub cost: f64,
    /// Latency, milliseconds
    pub latency: f64,
}

impl GatewayMetrics {
    /// Metrics equal to the profile's baseline
    pub fn baseline(profile: &GatewayProfile) -> Self {
        GatewayMetrics {
            success_rate: profile.base_success_rate,
            cost: profile.base_cost,
            latency: profile.base_latency,
        }
    }
}

/// Produces per-call metric snapshots for the catalog.
///
/// There is no live metrics feed, so a snapshot is the baseline plus optional
/// cosmetic jitter (±1 success rate, ±0.1 cost, ±25 ms latency).
#[derive(Debug, Clone, Copy)]
pub struct MetricsSampler {
    jitter: bool,
}

impl MetricsSampler {
    /// Sampler adding jitter when `jitter` is set
    pub fn new(jitter: bool) -> Self {
        MetricsSampler { jitter }
    }

    /// One snapshot per catalog entry, in catalog order
    pub fn sample<R: Rng + ?Sized>(&self, catalog: &[GatewayProfile], rng: &mut R) -> Vec<GatewayMetrics> {
        catalog
            .iter()
            .map(|profile| {
                let base = GatewayMetrics::baseline(profile);
                if !self.jitter {
                    return base;
                }
                GatewayMetrics {
                    success_rate: (base.success_rate + rng.gen_range(-1.0..1.0)).clamp(0.0, 100.0),
                    cost: (base.cost + rng.gen_range(-0.1..0.1)).max(0.0),
                    latency: (base.latency + rng.gen_range(-25.0..25.0)).max(0.0),
                }
            })
            .collect()
    }
}
