//! End-to-end tests for glyph-churn.
//!
//! These tests load the fixture pattern file at full dimension and exercise
//! the complete pipeline: encoding, ranking, voting, snapshot history, drift
//! and forecasting, and saved model bundles.

use std::path::PathBuf;

use chrono::{DateTime, Duration, TimeZone, Utc};
use glyph_churn::{
    load_jsonl, rank, ChurnModel, DriftMode, GlyphError, LabelField, ModelBundle, ModelConfig,
    Record, SymbolValue,
};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/patterns.jsonl")
}

/// Full-size churn model trained on the fixture patterns.
fn churn_model() -> ChurnModel {
    let config = ModelConfig::churn();
    let roles = config.role_set().unwrap();
    let entries = load_jsonl(fixture(), &roles).unwrap();
    ChurnModel::load(config, &entries).unwrap()
}

fn customer(id: &str, logins: f64, support: f64, defects: f64, adoption: f64) -> Value {
    json!({
        "customer_id": id,
        "logins": logins,
        "support_cases": support,
        "defects": defects,
        "feature_adoption": adoption,
    })
}

fn metrics(logins: f64, support: f64, defects: f64, adoption: f64) -> Record {
    Record::new()
        .with_numeric("logins", logins)
        .with_numeric("support_cases", support)
        .with_numeric("defects", defects)
        .with_numeric("feature_adoption", adoption)
}

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
}

fn similarity(model: &ChurnModel, a: &Record, b: &Record) -> f32 {
    let a = model.encoder().encode(a).unwrap();
    let b = model.encoder().encode(b).unwrap();
    glyph_vsa::vsa::cosine_similarity(a.vector(), b.vector()).unwrap()
}

#[test]
fn test_inactive_customer_matches_high_risk_pattern() {
    let model = churn_model();
    let query = customer("acme-corp", 0.0, 0.0, 0.0, 15.0);

    let ranked = model.rank(query.clone(), model.library().len()).unwrap();
    let top = &ranked[0];
    assert_eq!(top.glyph.annotation().unwrap().name, "inactive_account");
    assert!(top.score > 0.99, "top score {}", top.score);

    let worst = ranked.last().unwrap().score;
    assert!(top.score - worst > 0.25, "top {} worst {worst}", top.score);

    let verdict = model.query(query, 5).unwrap();
    assert_eq!(verdict.risk_level, "high");
    assert_eq!(verdict.usage_band, "inactive");
    assert_eq!(
        verdict.recommended_action,
        "Schedule an executive check-in and a re-onboarding session"
    );
}

#[test]
fn test_customers_get_expected_risk() {
    let model = churn_model();
    let cases = [
        (customer("acme-corp", 0.0, 0.0, 0.0, 0.0), "high"),
        (customer("beta-inc", 60.0, 15.0, 2.0, 40.0), "high"),
        (customer("gamma-llc", 45.0, 3.0, 9.0, 35.0), "high"),
        (customer("delta-co", 72.0, 4.0, 3.0, 52.0), "medium"),
        (customer("omega-ai", 150.0, 1.0, 0.0, 95.0), "low"),
        (customer("sigma-dev", 110.0, 1.0, 1.0, 80.0), "low"),
    ];

    for (raw, expected) in cases {
        let verdict = model.query(raw.clone(), 5).unwrap();
        assert_eq!(
            verdict.risk_level, expected,
            "{} matched {:?}",
            raw["customer_id"], verdict.supporting_matches
        );
        assert!(verdict.confidence > 0.5);
    }
}

#[test]
fn test_driver_inference() {
    let model = churn_model();

    let beta = model.query(customer("beta-inc", 60.0, 15.0, 2.0, 40.0), 5).unwrap();
    assert_eq!(beta.value(LabelField::ChurnDriver), "support_burden");

    let gamma = model.query(customer("gamma-llc", 45.0, 3.0, 9.0, 35.0), 5).unwrap();
    assert_eq!(gamma.value(LabelField::ChurnDriver), "defect_frustration");

    let sigma = model.query(customer("sigma-dev", 110.0, 1.0, 1.0, 80.0), 5).unwrap();
    assert_eq!(sigma.value(LabelField::UsageBand), "growing");
}

#[test]
fn test_high_risk_customer_scores_higher_against_high_risk_patterns() {
    let model = churn_model();
    let best_high = |raw: Value| -> f32 {
        model
            .rank(raw, model.library().len())
            .unwrap()
            .into_iter()
            .filter(|m| m.glyph.annotation().unwrap().labels.risk_level == "high")
            .map(|m| m.score)
            .fold(f32::MIN, f32::max)
    };

    let acme = best_high(customer("acme-corp", 0.0, 0.0, 0.0, 15.0));
    let omega = best_high(customer("omega-ai", 150.0, 1.0, 0.0, 95.0));
    assert!(acme > omega, "acme {acme} omega {omega}");
}

#[test]
fn test_drift_attributes_logins() {
    let model = churn_model();
    model
        .submit_record_at(&customer("acme-corp", 40.0, 2.0, 1.0, 50.0), day(1))
        .unwrap();
    model
        .submit_record_at(&customer("acme-corp", 5.0, 2.0, 1.0, 50.0), day(2))
        .unwrap();

    let report = model.drift("acme-corp", DriftMode::FirstToLatest).unwrap();
    assert_eq!(report.most_changed(), ["logins".to_string()]);
    assert!(report.magnitude() > 0.0);

    let logins = &report.overall.role_changes[0];
    assert_eq!(logins.from, Some(SymbolValue::Bin(4)));
    assert_eq!(logins.to, Some(SymbolValue::Bin(0)));
}

#[test]
fn test_top_k_bounds() {
    let model = churn_model();
    let query = customer("acme-corp", 0.0, 0.0, 0.0, 15.0);

    assert!(matches!(
        model.rank(query.clone(), 0),
        Err(GlyphError::InvalidTopK(0))
    ));
    assert!(matches!(
        model.query(query.clone(), 0),
        Err(GlyphError::InvalidTopK(0))
    ));

    let ranked = model.rank(query, 50).unwrap();
    assert_eq!(ranked.len(), model.library().len());
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn test_non_monotonic_append_leaves_history_unchanged() {
    let model = churn_model();
    model
        .submit_record_at(&customer("acme-corp", 40.0, 2.0, 1.0, 50.0), day(5))
        .unwrap();
    let before = model.history("acme-corp");

    for t in [day(5), day(4)] {
        let err = model
            .submit_record_at(&customer("acme-corp", 5.0, 2.0, 1.0, 50.0), t)
            .unwrap_err();
        assert!(matches!(err, GlyphError::NonMonotonicTimestamp { .. }));
    }

    let after = model.history("acme-corp");
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].timestamp, before[0].timestamp);
    assert_eq!(after[0].glyph, before[0].glyph);
}

#[test]
fn test_metric_boundaries_encode() {
    let model = churn_model();
    let encoder = model.encoder();
    let dim = model.config().dimension;

    for record in [
        metrics(0.0, 0.0, 0.0, 0.0),
        metrics(200.0, 20.0, 15.0, 100.0),
        metrics(50.0, 2.0, 1.0, 0.0),
        metrics(50.0, 2.0, 1.0, 100.0),
    ] {
        assert_eq!(encoder.encode(&record).unwrap().dimension(), dim);
    }

    let at_max = encoder.encode(&metrics(200.0, 2.0, 1.0, 50.0)).unwrap();
    let over_max = encoder.encode(&metrics(500.0, 2.0, 1.0, 50.0)).unwrap();
    assert_eq!(at_max.vector(), over_max.vector());
}

#[test]
fn test_adjacent_logins_more_similar_than_distant() {
    let model = churn_model();
    let base = Record::new().with_numeric("logins", 50.0);
    let near = Record::new().with_numeric("logins", 60.0);
    let far = Record::new().with_numeric("logins", 200.0);
    assert!(similarity(&model, &base, &near) > similarity(&model, &base, &far));
}

#[test]
fn test_support_distance_is_ordinal() {
    let model = churn_model();
    let low = Record::new().with_numeric("support_cases", 0.0);
    let mid = Record::new().with_numeric("support_cases", 3.0);
    let high = Record::new().with_numeric("support_cases", 15.0);
    assert!(similarity(&model, &mid, &low) > similarity(&model, &high, &low));
}

#[test]
fn test_same_customer_different_metrics_differ() {
    let model = churn_model();
    let first = model
        .submit_record_at(&customer("acme-corp", 80.0, 1.0, 0.0, 60.0), day(1))
        .unwrap();
    let second = model
        .submit_record_at(&customer("acme-corp", 20.0, 6.0, 4.0, 30.0), day(2))
        .unwrap();

    assert_ne!(first.glyph.vector(), second.glyph.vector());
    assert_eq!(first.glyph.key(), Some("acme-corp"));
    assert_eq!(second.sequence, 1);
    assert_eq!(model.latest("acme-corp").unwrap().timestamp, day(2));
}

#[test]
fn test_separately_loaded_models_agree() {
    let a = churn_model();
    let b = churn_model();
    let record = metrics(33.0, 7.0, 2.0, 45.0);

    assert_eq!(
        a.encoder().encode(&record).unwrap(),
        b.encoder().encode(&record).unwrap()
    );
    for (x, y) in a.library().iter().zip(b.library()) {
        assert_eq!(x, y);
    }
}

#[test]
fn test_bundle_roundtrip_reproduces_rankings() {
    let model = churn_model();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("churn.json");
    model.to_bundle().save(&path).unwrap();

    let restored = ChurnModel::from_bundle(ModelBundle::load(&path).unwrap()).unwrap();
    let query = customer("gamma-llc", 45.0, 3.0, 9.0, 35.0);

    let before: Vec<(usize, f32)> = model
        .rank(query.clone(), 10)
        .unwrap()
        .iter()
        .map(|m| (m.index, m.score))
        .collect();
    let after: Vec<(usize, f32)> = restored
        .rank(query.clone(), 10)
        .unwrap()
        .iter()
        .map(|m| (m.index, m.score))
        .collect();
    assert_eq!(before, after);
    assert_eq!(model.query(query.clone(), 5).unwrap(), restored.query(query, 5).unwrap());
}

#[test]
fn test_raw_vector_ranking_matches_library_entry() {
    let model = churn_model();
    let pattern = model.library().get(7).unwrap();
    let ranked = rank(pattern.vector(), model.library(), 1).unwrap();
    assert_eq!(ranked[0].index, 7);
    assert!((ranked[0].score - 1.0).abs() < 1e-6);
}

#[test]
fn test_unbinding_recovers_every_metric() {
    let model = churn_model();
    let encoder = model.encoder();
    let roles = encoder.roles();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for _ in 0..20 {
        let mut record = Record::new();
        for name in ["logins", "support_cases", "defects", "feature_adoption"] {
            let spec = roles.get(name).unwrap().numeric_spec().unwrap();
            let value = f64::from(rng.next_u32() % 1000) / 1000.0 * spec.max;
            record.insert(name, glyph_churn::FieldValue::Numeric(value));
        }
        let glyph = encoder.encode(&record).unwrap();

        for (name, value) in record.iter() {
            let glyph_churn::FieldValue::Numeric(v) = value else {
                unreachable!()
            };
            let spec = roles.get(name).unwrap().numeric_spec().unwrap();
            let expected = spec.bin_index(*v);
            let SymbolValue::Bin(bin) = encoder.decode_role(glyph.vector(), name).unwrap().value
            else {
                panic!("{name} decoded to a category");
            };
            // The lightest role may land on a neighbouring bin.
            assert!(bin.abs_diff(expected) <= 1, "{name} = {v}: bin {bin}, expected {expected}");
            if name == "logins" {
                assert_eq!(bin, expected);
            }
        }
    }
}

#[test]
fn test_trend_and_forecast_for_declining_customer() {
    let model = churn_model();
    let history = [
        (150.0, 1.0, 0.0, 95.0),
        (110.0, 1.0, 1.0, 80.0),
        (40.0, 12.0, 3.0, 30.0),
        (5.0, 0.0, 0.0, 15.0),
    ];
    for (i, (logins, support, defects, adoption)) in history.into_iter().enumerate() {
        model
            .submit_record_at(
                &customer("omega-ai", logins, support, defects, adoption),
                day(i as i64),
            )
            .unwrap();
    }

    let trend = model.trend("omega-ai").unwrap();
    let risks: Vec<&str> = trend.points.iter().map(|p| p.verdict.risk_level.as_str()).collect();
    assert_eq!(risks, ["low", "low", "high", "high"]);

    let forecast = model.forecast("omega-ai").unwrap();
    assert!(!forecast.low_confidence);
    assert_eq!(forecast.window, 4);
    assert_eq!(forecast.value(LabelField::RiskLevel), Some("high"));

    let drift = model.drift("omega-ai", DriftMode::Consecutive).unwrap();
    assert_eq!(drift.steps.len(), 3);
    assert!(drift.magnitude() > 0.1);
}

#[test]
fn test_batch_submit_is_all_or_nothing() {
    let model = churn_model();
    model
        .submit_record_at(&customer("beta-inc", 60.0, 15.0, 2.0, 40.0), day(10))
        .unwrap();

    let batch = vec![
        (metrics(10.0, 1.0, 0.0, 5.0).with_key("customer_id", "fresh-co"), day(1)),
        (metrics(60.0, 14.0, 2.0, 40.0).with_key("customer_id", "beta-inc"), day(9)),
    ];
    assert!(matches!(
        model.submit_batch(&batch),
        Err(GlyphError::NonMonotonicTimestamp { .. })
    ));
    assert!(model.history("fresh-co").is_empty());
    assert_eq!(model.history("beta-inc").len(), 1);

    let batch = vec![
        (metrics(10.0, 1.0, 0.0, 5.0).with_key("customer_id", "fresh-co"), day(2)),
        (metrics(12.0, 1.0, 0.0, 5.0).with_key("customer_id", "fresh-co"), day(1)),
        (metrics(60.0, 14.0, 2.0, 40.0).with_key("customer_id", "beta-inc"), day(11)),
    ];
    let stored = model.submit_batch(&batch).unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[0].sequence, 1);
    assert_eq!(stored[1].sequence, 0);

    let keys = model.store().keys();
    assert!(keys.contains(&"fresh-co".to_string()));
    assert_eq!(model.store().len(), 4);
}

#[test]
fn test_unseen_key_is_reported() {
    let model = churn_model();
    assert!(matches!(model.trend("ghost"), Err(GlyphError::UnknownKey(_))));
    assert!(matches!(model.forecast("ghost"), Err(GlyphError::UnknownKey(_))));
    assert!(matches!(model.latest("ghost"), Err(GlyphError::UnknownKey(_))));
    assert!(model.history("ghost").is_empty());
}
