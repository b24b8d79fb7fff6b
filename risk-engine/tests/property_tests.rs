//! Property-based tests for scoring and routing invariants
//!
//! - Every scoring output stays inside its documented range
//! - Recommendation always agrees with the risk level and the reported risk score
//! - Scoring results and gateway candidates survive a JSON round trip unchanged
//! - Alternatives never repeat the recommended gateway and are sorted
//! - Exploitation never picks a gateway that cannot serve the context

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use risk_engine::features::FixedClock;
use risk_engine::{
    default_catalog, EpsilonGreedyPolicy, GatewayCandidate, GatewaySelector, HeuristicBackend,
    ModelSource, Recommendation, RiskLevel, RoutingContext, ScoringRequest, ScoringResult,
};
use std::sync::Arc;

fn category_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("online_retail".to_string()),
        Just("gambling".to_string()),
        Just("luxury_goods".to_string()),
        Just("travel".to_string()),
        "[a-z_]{0,12}",
    ]
}

fn scoring_request_strategy() -> impl Strategy<Value = ScoringRequest> {
    (
        0.0f64..1_000_000.0,
        category_strategy(),
        proptest::option::of(0u32..20),
        proptest::option::of(0u32..50),
    )
        .prop_map(|(amount, category, declines, velocity)| ScoringRequest {
            user_id: "user_prop".to_string(),
            card_id: "card_prop".to_string(),
            amount,
            merchant_category: category,
            location: "Lagos".to_string(),
            device_info: "Firefox/Linux".to_string(),
            transaction_id: None,
            previous_declines: declines,
            velocity_last_hour: velocity,
        })
}

fn model_source_strategy() -> impl Strategy<Value = ModelSource> {
    prop_oneof![
        Just(ModelSource::MlEnsemble),
        Just(ModelSource::LocalFallback),
        Just(ModelSource::Cached),
    ]
}

fn wire_f64() -> impl Strategy<Value = f64> {
    prop_oneof![
        0.0f64..=100.0,
        prop::num::f64::NORMAL | prop::num::f64::ZERO,
    ]
}

fn candidate_strategy() -> impl Strategy<Value = GatewayCandidate> {
    (
        0usize..3,
        "[A-Za-z]{1,12}",
        (wire_f64(), wire_f64(), wire_f64(), wire_f64()),
        proptest::collection::vec("[a-z_]{1,10}", 0..4),
        proptest::collection::vec("[A-Z]{2,6}", 0..4),
        ".{0,40}",
        proptest::option::of(wire_f64()),
    )
        .prop_map(
            |(id, name, (success_rate, cost, latency, score), features, regions, reason, confidence)| {
                GatewayCandidate {
                    id,
                    name,
                    success_rate,
                    cost,
                    latency,
                    features,
                    regions,
                    score,
                    reason,
                    confidence,
                }
            },
        )
}

/// Expected action for a reported risk score
fn recommendation_for(risk_score: f64) -> Recommendation {
    if risk_score > 70.0 {
        Recommendation::Block
    } else if risk_score > 40.0 {
        Recommendation::Review
    } else {
        Recommendation::Approve
    }
}

fn region_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("US".to_string()),
        Just("EU".to_string()),
        Just("APAC".to_string()),
        Just("latam".to_string()),
    ]
}

fn routing_context_strategy() -> impl Strategy<Value = RoutingContext> {
    (
        -100.0f64..200_000.0,
        -20.0f64..150.0,
        prop_oneof![Just("e-commerce".to_string()), Just("retail".to_string())],
        region_strategy(),
    )
        .prop_map(|(amount, risk_score, merchant_type, region)| RoutingContext {
            amount,
            currency: "USD".to_string(),
            risk_score,
            merchant_type,
            region,
        })
}

fn greedy_selector() -> GatewaySelector {
    GatewaySelector::new(
        default_catalog(),
        Arc::new(EpsilonGreedyPolicy::with_seed(0.0, 11)),
    )
    .unwrap()
    .with_jitter(true)
    .with_clock(Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 0).unwrap(),
    )))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_scoring_outputs_in_range(p in -10.0f64..10.0) {
        let result = ScoringResult::from_probability(p, ModelSource::MlEnsemble);

        prop_assert!((0.0..=100.0).contains(&result.risk_score));
        prop_assert!((75.0..=95.0).contains(&result.confidence));
    }

    #[test]
    fn prop_recommendation_matches_level(p in 0.0f64..=1.0) {
        let result = ScoringResult::from_probability(p, ModelSource::LocalFallback);

        let expected = match result.risk_level {
            RiskLevel::High => Recommendation::Block,
            RiskLevel::Medium => Recommendation::Review,
            RiskLevel::Low => Recommendation::Approve,
        };
        prop_assert_eq!(result.recommendation, expected);
        prop_assert_eq!(result.recommendation, recommendation_for(result.risk_score));
    }

    #[test]
    fn prop_heuristic_recommendation_matches_score(request in scoring_request_strategy()) {
        let p = HeuristicBackend.probability(&request);
        let result = ScoringResult::from_probability(p, ModelSource::LocalFallback);

        prop_assert_eq!(result.recommendation, recommendation_for(result.risk_score));
    }

    #[test]
    fn prop_scoring_result_json_is_lossless(p in any::<f64>(), source in model_source_strategy()) {
        let result = ScoringResult::from_probability(p, source);
        let json = serde_json::to_string(&result).unwrap();
        let back: ScoringResult = serde_json::from_str(&json).unwrap();

        prop_assert_eq!(back, result);
    }

    #[test]
    fn prop_gateway_candidate_json_is_lossless(candidate in candidate_strategy()) {
        let json = serde_json::to_string(&candidate).unwrap();
        let back: GatewayCandidate = serde_json::from_str(&json).unwrap();

        prop_assert_eq!(back, candidate);
    }

    #[test]
    fn prop_heuristic_is_a_probability(request in scoring_request_strategy()) {
        let p = HeuristicBackend.probability(&request);
        prop_assert!((0.1..=1.0).contains(&p));
    }

    #[test]
    fn prop_alternatives_sorted_and_exclusive(ctx in routing_context_strategy()) {
        let selector = greedy_selector();
        let decision = runtime().block_on(selector.select(&ctx));

        let names: Vec<&str> = decision.alternatives.iter().map(|a| a.name.as_str()).collect();
        prop_assert!(!names.contains(&decision.recommended.name.as_str()));
        prop_assert_eq!(decision.alternatives.len(), 2);

        for pair in decision.alternatives.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
        for candidate in std::iter::once(&decision.recommended).chain(&decision.alternatives) {
            prop_assert!((0.0..=100.0).contains(&candidate.score));
        }
        prop_assert!((0.0..=1.0).contains(&decision.decision_context.confidence));
    }

    #[test]
    fn prop_exploitation_respects_constraints(ctx in routing_context_strategy()) {
        let selector = greedy_selector();
        let decision = runtime().block_on(selector.select(&ctx));
        let ctx = ctx.normalized();

        let catalog = default_catalog();
        let any_eligible = catalog.iter().any(|g| g.is_eligible(&ctx.region, ctx.amount));
        let chosen = &catalog[decision.recommended.id];

        if any_eligible {
            prop_assert!(chosen.is_eligible(&ctx.region, ctx.amount));
        }
    }
}
