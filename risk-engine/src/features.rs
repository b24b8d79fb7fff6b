//! Feature encoding for fraud scoring and gateway routing
//!
//! The lookup tables used to turn free-form request fields into numeric
//! features live in [`FeatureTables`] so they can be swapped per deployment
//! and exercised directly in tests.

use crate::types::{RiskLevel, RoutingContext, ScoringRequest};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Source of wall-clock time for temporal features
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Lookup tables used to encode categorical request fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTables {
    /// Risk weight per merchant category
    pub merchant_weights: HashMap<String, u32>,
    /// Weight for categories missing from `merchant_weights`
    pub default_merchant_weight: u32,
    /// Location substrings that mark a risky origin
    pub location_keywords: Vec<String>,
    /// Encoded value when a location keyword matches
    pub location_risk_flagged: u32,
    /// Device substrings that mark a tampered device
    pub device_keywords: Vec<String>,
    /// Encoded value when a device keyword matches
    pub device_risk_flagged: u32,
}

impl Default for FeatureTables {
    fn default() -> Self {
        let merchant_weights = [
            ("online_retail", 1),
            ("electronics", 2),
            ("travel", 3),
            ("subscription", 1),
            ("luxury_goods", 5),
            ("gambling", 8),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        FeatureTables {
            merchant_weights,
            default_merchant_weight: 2,
            location_keywords: vec!["unknown".into(), "tor".into(), "vpn".into()],
            location_risk_flagged: 5,
            device_keywords: vec!["emulator".into(), "rooted".into(), "jailbroken".into()],
            device_risk_flagged: 4,
        }
    }
}

impl FeatureTables {
    /// Risk weight for a merchant category
    pub fn merchant_weight(&self, category: &str) -> u32 {
        self.merchant_weights
            .get(category)
            .copied()
            .unwrap_or(self.default_merchant_weight)
    }

    /// 1 for a clean location, `location_risk_flagged` otherwise
    pub fn location_risk(&self, location: &str) -> u32 {
        if contains_any(location, &self.location_keywords) {
            self.location_risk_flagged
        } else {
            1
        }
    }

    /// 1 for a clean device, `device_risk_flagged` otherwise
    pub fn device_risk(&self, device_info: &str) -> u32 {
        if contains_any(device_info, &self.device_keywords) {
            self.device_risk_flagged
        } else {
            1
        }
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    if haystack.is_empty() {
        return false;
    }
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .filter(|n| !n.is_empty())
        .any(|n| haystack.contains(&n.to_lowercase()))
}

/// Numeric features sent to the fraud model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Transaction amount
    pub amount: f64,
    /// Hour of day, 0-23
    pub hour_of_day: u32,
    /// Day of week, 0 = Sunday
    pub day_of_week: u32,
    /// Recent declines
    pub previous_declines: u32,
    /// Transactions in the last hour
    pub velocity_last_hour: u32,
    /// Merchant category weight
    pub merchant_category: u32,
    /// Location risk flag
    pub location_risk: u32,
    /// Device risk flag
    pub device_risk: u32,
    /// Bucketed user fingerprint
    pub user_id_hash: u32,
    /// Bucketed card fingerprint
    pub card_id_hash: u32,
    /// 1 on Saturday and Sunday
    pub is_weekend: u8,
    /// 1 before 06:00 and after 22:59
    pub is_night: u8,
}

impl FeatureVector {
    /// Encode a scoring request at instant `now`
    pub fn extract(request: &ScoringRequest, tables: &FeatureTables, now: DateTime<Utc>) -> Self {
        let hour = now.hour();
        let day = now.weekday().num_days_from_sunday();

        FeatureVector {
            amount: request.amount,
            hour_of_day: hour,
            day_of_week: day,
            previous_declines: request.previous_declines(),
            velocity_last_hour: request.velocity_last_hour(),
            merchant_category: tables.merchant_weight(&request.merchant_category),
            location_risk: tables.location_risk(&request.location),
            device_risk: tables.device_risk(&request.device_info),
            user_id_hash: bucket_id(&request.user_id),
            card_id_hash: bucket_id(&request.card_id),
            is_weekend: u8::from(day == 0 || day == 6),
            is_night: u8::from(hour < 6 || hour > 22),
        }
    }
}

/// Stable bucket in `0..10000` for an identifier
pub fn bucket_id(id: &str) -> u32 {
    let digest = Sha256::digest(id.as_bytes());
    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    prefix % 10_000
}

/// Amount buckets used by the routing policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountBucket {
    /// Below 100
    Small,
    /// 100 to 999.99
    Medium,
    /// 1 000 to 9 999.99
    Large,
    /// 10 000 and above
    #[serde(rename = "xlarge")]
    XLarge,
}

impl AmountBucket {
    /// Bucket an amount
    pub fn of(amount: f64) -> Self {
        if amount < 100.0 {
            AmountBucket::Small
        } else if amount < 1_000.0 {
            AmountBucket::Medium
        } else if amount < 10_000.0 {
            AmountBucket::Large
        } else {
            AmountBucket::XLarge
        }
    }
}

/// What a routing decision should favour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationGoal {
    /// Risky transactions
    Security,
    /// Tiny transactions
    Cost,
    /// Everything else
    Reliability,
}

/// Context features sent to the routing bandit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFeatures {
    /// Transaction amount, kept for amount limits
    pub amount: f64,
    /// log10(amount + 1)
    pub amount_log: f64,
    /// Amount bucket
    pub amount_bucket: AmountBucket,
    /// Encoded currency, 0 for unknown
    pub currency_code: u32,
    /// Risk score normalized to `[0, 1]`
    pub risk_score: f64,
    /// Risk bucket
    pub risk_bucket: RiskLevel,
    /// Merchant type
    pub merchant_type: String,
    /// Region
    pub region: String,
    /// Hour of day, 0-23
    pub hour_of_day: u32,
    /// Day of week, 0 = Sunday
    pub day_of_week: u32,
    /// 1 on Saturday and Sunday
    pub is_weekend: u8,
    /// Preferred optimization target
    pub optimize_for: OptimizationGoal,
}

impl ContextFeatures {
    /// Encode a routing context at instant `now`
    pub fn extract(ctx: &RoutingContext, now: DateTime<Utc>) -> Self {
        let ctx = ctx.normalized();
        let day = now.weekday().num_days_from_sunday();

        let optimize_for = if ctx.risk_score > 60.0 {
            OptimizationGoal::Security
        } else if ctx.amount < 50.0 {
            OptimizationGoal::Cost
        } else {
            OptimizationGoal::Reliability
        };

        ContextFeatures {
            amount: ctx.amount,
            amount_log: (ctx.amount + 1.0).log10(),
            amount_bucket: AmountBucket::of(ctx.amount),
            currency_code: encode_currency(&ctx.currency),
            risk_score: ctx.risk_score / 100.0,
            risk_bucket: RiskLevel::from_probability(ctx.risk_score / 100.0),
            merchant_type: ctx.merchant_type,
            region: ctx.region,
            hour_of_day: now.hour(),
            day_of_week: day,
            is_weekend: u8::from(day == 0 || day == 6),
            optimize_for,
        }
    }
}

fn encode_currency(currency: &str) -> u32 {
    match currency.to_uppercase().as_str() {
        "USD" => 1,
        "EUR" => 2,
        "GBP" => 3,
        _ => 0,
    }
}
