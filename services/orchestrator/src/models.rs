use crate::errors::ApiError;
use risk_engine::{RoutingContext, ScoringRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const FRAUD_REQUIRED_FIELDS: &[&str] = &[
    "userId",
    "cardId",
    "amount",
    "merchantCategory",
    "location",
    "deviceInfo",
];

pub const ROUTE_REQUIRED_FIELDS: &[&str] =
    &["amount", "currency", "riskScore", "merchantType", "region"];

fn present(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.trim().is_empty())
}

/// A zero amount is treated like an absent one.
fn present_amount(value: Option<f64>) -> bool {
    value.map_or(false, |v| v != 0.0)
}

// ===== Fraud check =====

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudCheckRequest {
    pub user_id: Option<String>,
    pub card_id: Option<String>,
    pub amount: Option<f64>,
    pub merchant_category: Option<String>,
    pub location: Option<String>,
    pub device_info: Option<String>,
    pub transaction_id: Option<String>,
    pub previous_declines: Option<u32>,
    pub velocity_last_hour: Option<u32>,
}

impl FraudCheckRequest {
    pub fn validate(self) -> Result<ScoringRequest, ApiError> {
        let complete = present(&self.user_id)
            && present(&self.card_id)
            && present_amount(self.amount)
            && present(&self.merchant_category)
            && present(&self.location)
            && present(&self.device_info);

        if !complete {
            return Err(ApiError::MissingFields(FRAUD_REQUIRED_FIELDS));
        }

        let transaction_id = self
            .transaction_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("tx_{}", Uuid::new_v4().simple()));

        Ok(ScoringRequest {
            user_id: self.user_id.unwrap_or_default(),
            card_id: self.card_id.unwrap_or_default(),
            amount: self.amount.unwrap_or_default(),
            merchant_category: self.merchant_category.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            device_info: self.device_info.unwrap_or_default(),
            transaction_id: Some(transaction_id),
            previous_declines: Some(self.previous_declines.unwrap_or(0)),
            velocity_last_hour: Some(self.velocity_last_hour.unwrap_or(1)),
        })
    }
}

// ===== Route optimization =====

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub risk_score: Option<f64>,
    pub merchant_type: Option<String>,
    pub region: Option<String>,
}

impl RouteRequest {
    pub fn validate(self) -> Result<RoutingContext, ApiError> {
        let complete = present_amount(self.amount)
            && present(&self.currency)
            && self.risk_score.is_some()
            && present(&self.merchant_type)
            && present(&self.region);

        if !complete {
            return Err(ApiError::MissingFields(ROUTE_REQUIRED_FIELDS));
        }

        Ok(RoutingContext {
            amount: self.amount.unwrap_or_default(),
            currency: self.currency.unwrap_or_default(),
            risk_score: self.risk_score.unwrap_or_default(),
            merchant_type: self.merchant_type.unwrap_or_default(),
            region: self.region.unwrap_or_default(),
        }
        .normalized())
    }
}

// ===== Health =====

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub timestamp: String,
}

// ===== Mock inference =====

#[derive(Debug, Serialize, Deserialize)]
pub struct MockPrediction {
    pub score: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MockFraudResponse {
    pub predictions: Vec<MockPrediction>,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockRoutingResponse {
    pub chosen_action: usize,
    pub probability: f64,
    pub exploration: bool,
    pub expected_reward: f64,
    pub recommended_gateway: String,
}
