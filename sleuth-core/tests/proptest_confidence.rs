//! Property-based tests for confidence rating and aggregation using proptest.

use proptest::prelude::*;

use sleuth_core::brain::extract_json_object;
use sleuth_core::research::corroboration::CorroborationPolicy;
use sleuth_core::research::sources::SourceType;
use sleuth_core::{Confidence, ConfidenceSummary, Finding};
use uuid::Uuid;

fn confidence() -> impl Strategy<Value = Confidence> {
    prop_oneof![
        Just(Confidence::Low),
        Just(Confidence::Medium),
        Just(Confidence::High),
    ]
}

const WORDS: &[&str] = &[
    "storage", "capacity", "prices", "growth", "policy", "subsidy", "grid", "demand", "supply",
    "costs", "adoption", "emissions",
];

fn finding_strategy(ids: Vec<Uuid>) -> impl Strategy<Value = Finding> {
    (
        0..ids.len(),
        0usize..4,
        prop::collection::vec(0..WORDS.len(), 1..6),
        confidence(),
    )
        .prop_map(move |(sub, url, words, confidence)| {
            let url = format!("https://source{url}.org/a");
            Finding {
                sub_query_id: ids[sub],
                source_type: SourceType::classify(&url),
                source_url: url,
                statement: words.iter().map(|w| WORDS[*w]).collect::<Vec<_>>().join(" "),
                confidence,
                corroborated: false,
            }
        })
}

// --- Aggregation properties ---

proptest! {
    #[test]
    fn counts_sum_to_total(levels in prop::collection::vec(confidence(), 0..60)) {
        let summary = ConfidenceSummary::aggregate(levels.iter().copied());
        prop_assert_eq!(summary.high + summary.medium + summary.low, summary.total);
        prop_assert_eq!(summary.total, levels.len());
    }

    #[test]
    fn score_is_bounded(levels in prop::collection::vec(confidence(), 0..60)) {
        let summary = ConfidenceSummary::aggregate(levels);
        prop_assert!(summary.overall_score >= 0.0);
        prop_assert!(summary.overall_score <= 1.0);
        if summary.total == 0 {
            prop_assert_eq!(summary.overall_score, 0.0);
        } else {
            prop_assert!(summary.overall_score >= 0.3);
        }
    }

    #[test]
    fn raising_one_level_never_lowers_score(
        levels in prop::collection::vec(confidence(), 1..40),
        index in any::<prop::sample::Index>(),
    ) {
        let before = ConfidenceSummary::aggregate(levels.iter().copied());
        let mut raised = levels.clone();
        let i = index.index(raised.len());
        raised[i] = raised[i].upgrade();
        let after = ConfidenceSummary::aggregate(raised);
        prop_assert!(after.overall_score >= before.overall_score - 1e-12);
    }
}

// --- Corroboration properties ---

proptest! {
    #[test]
    fn corroboration_never_downgrades(
        findings in prop::collection::vec(
            finding_strategy((0..3).map(|_| Uuid::new_v4()).collect()),
            0..25,
        ),
        threshold in 0.1f64..=1.0,
    ) {
        let policy = CorroborationPolicy::new(threshold, "renewable energy");
        let mut after = findings.clone();
        policy.apply(&mut after);
        for (before, after) in findings.iter().zip(&after) {
            prop_assert!(after.confidence >= before.confidence);
            if after.corroborated {
                prop_assert_eq!(after.confidence, before.confidence.upgrade());
            } else {
                prop_assert_eq!(after.confidence, before.confidence);
            }
        }
    }

    #[test]
    fn corroboration_ignores_order(
        findings in prop::collection::vec(
            finding_strategy((0..3).map(|_| Uuid::new_v4()).collect()),
            0..20,
        ),
    ) {
        let policy = CorroborationPolicy::new(0.5, "renewable energy");
        let mut forward = findings.clone();
        policy.apply(&mut forward);
        let mut backward: Vec<_> = findings.into_iter().rev().collect();
        policy.apply(&mut backward);
        backward.reverse();
        prop_assert_eq!(forward, backward);
    }
}

// --- JSON extraction properties ---

proptest! {
    #[test]
    fn embedded_object_is_recovered(
        prefix in "[a-zA-Z .:!]{0,40}",
        suffix in "[a-zA-Z .:!]{0,40}",
        key in "[a-z_]{1,12}",
        value in "[^\"\\\\]{0,30}",
    ) {
        let mut map = serde_json::Map::new();
        map.insert("n".to_string(), serde_json::json!([1, {"x": "}"}]));
        map.insert(key, serde_json::Value::String(value));
        let object = serde_json::Value::Object(map);
        let text = format!("{prefix}{object}{suffix}");
        let extracted = extract_json_object(&text).expect("object present");
        let parsed: serde_json::Value = serde_json::from_str(extracted).unwrap();
        prop_assert_eq!(parsed, object);
    }
}
