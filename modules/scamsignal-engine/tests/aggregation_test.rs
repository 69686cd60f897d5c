use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use uuid::Uuid;

use scamsignal_classifier::Classification;
use scamsignal_common::{
    GeoPoint, Incident, IncidentStatus, ScamCategory, ScamSignalError, Severity,
};
use scamsignal_engine::testing::{
    FailingClassifier, InMemoryIncidentStore, InMemoryPatternStore, StubClassifier,
};
use scamsignal_engine::Aggregator;

fn incident(title: &str, location: &str, hours_ago: i64) -> Incident {
    Incident {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: format!("{title} reported by a citizen"),
        location: location.to_string(),
        coordinates: Some(GeoPoint {
            lat: 19.07,
            lng: 72.87,
        }),
        scammer_details: None,
        severity: Severity::Medium,
        status: IncidentStatus::Reported,
        reported_by: Uuid::new_v4(),
        image_url: None,
        analysis: None,
        created_at: Utc::now() - ChronoDuration::hours(hours_ago),
    }
}

fn classification(id: Uuid, topic_id: i64, child_confidence: f32) -> Classification {
    Classification {
        id,
        topic_id,
        topic_name: format!("Topic {topic_id}"),
        parent_category: "Financial and Payment Scams".to_string(),
        child_label: "upi fraud".to_string(),
        parent_confidence: 0.5,
        child_confidence,
        summary: "Fraudulent payment request over UPI".to_string(),
    }
}

fn aggregator(
    incidents: Arc<InMemoryIncidentStore>,
    patterns: Arc<InMemoryPatternStore>,
    classifier: Arc<dyn scamsignal_classifier::BatchClassifier>,
) -> Aggregator {
    Aggregator::new(incidents, patterns, classifier)
}

#[tokio::test]
async fn first_run_creates_pattern_with_mean_confidence() {
    let a = incident("Fake UPI payment request", "Mumbai", 2);
    let b = incident("UPI payment fraud", "Mumbai", 4);
    let incidents = Arc::new(InMemoryIncidentStore::new(vec![a.clone(), b.clone()]));
    let patterns = Arc::new(InMemoryPatternStore::new());
    let classifier = Arc::new(StubClassifier::new());
    classifier.stub(classification(a.id, 7, 0.8));
    classifier.stub(classification(b.id, 7, 0.6));

    let agg = aggregator(incidents.clone(), patterns.clone(), classifier);
    let summary = agg.run(7, 100).await.unwrap();

    assert_eq!(summary.processed_incidents, 2);
    assert_eq!(summary.patterns_touched, 1);
    assert_eq!(summary.classifications.len(), 2);

    let stored = patterns.snapshot();
    assert_eq!(stored.len(), 1);
    let pattern = &stored[0];
    assert_eq!(pattern.pattern_key, "topic_7");
    assert_eq!(pattern.frequency, 2);
    assert_eq!(pattern.related_incidents.len(), 2);
    assert!((pattern.confidence - 0.7).abs() < 1e-6);
    assert!((pattern.trend_score - 1.61).abs() < 1e-4);
    assert_eq!(pattern.category, ScamCategory::Financial);
    assert_eq!(pattern.severity, Severity::Medium);
    assert!(pattern.active);

    let region = &pattern.geographic_distribution[0];
    assert_eq!(region.region, "Mumbai");
    assert_eq!(region.count, 2);

    let annotated = incidents.get(a.id).unwrap();
    let analysis = annotated.analysis.unwrap();
    assert_eq!(analysis.topic_id, 7);
    assert!((analysis.child_confidence - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn second_run_folds_only_new_incidents() {
    let a = incident("Fake UPI payment request", "Mumbai", 2);
    let b = incident("UPI payment fraud", "Mumbai", 4);
    let incidents = Arc::new(InMemoryIncidentStore::new(vec![a.clone(), b.clone()]));
    let patterns = Arc::new(InMemoryPatternStore::new());
    let classifier = Arc::new(StubClassifier::new());
    classifier.stub(classification(a.id, 7, 0.8));
    classifier.stub(classification(b.id, 7, 0.6));

    let agg = aggregator(incidents.clone(), patterns.clone(), classifier.clone());
    agg.run(7, 100).await.unwrap();

    // A new report lands; the window reselects all three incidents.
    let c = incident("Another UPI scam", "Delhi", 1);
    incidents.push(c.clone());
    classifier.stub(classification(c.id, 7, 0.9));

    let summary = agg.run(7, 100).await.unwrap();
    assert_eq!(summary.processed_incidents, 3);
    assert_eq!(summary.patterns_touched, 1);

    let stored = patterns.snapshot();
    assert_eq!(stored.len(), 1);
    let pattern = &stored[0];
    // Only the new incident grows the set; a and b are already attributed.
    assert_eq!(pattern.frequency, 3);
    assert_eq!(pattern.related_incidents.len(), 3);
    // Running mean: (0.7 * 2 + 0.9) / 3.
    assert!((pattern.confidence - 0.766_666_7).abs() < 1e-4);
    assert!((pattern.trend_score - (3.0 * 0.7 + pattern.confidence * 0.3)).abs() < 1e-4);

    let delhi = pattern
        .geographic_distribution
        .iter()
        .find(|r| r.region == "Delhi")
        .unwrap();
    assert_eq!(delhi.count, 1);
}

#[tokio::test]
async fn rerun_without_new_incidents_touches_nothing() {
    let a = incident("Lottery prize call", "Pune", 3);
    let incidents = Arc::new(InMemoryIncidentStore::new(vec![a.clone()]));
    let patterns = Arc::new(InMemoryPatternStore::new());
    let classifier = Arc::new(StubClassifier::new());
    classifier.stub(classification(a.id, 4, 0.9));

    let agg = aggregator(incidents, patterns.clone(), classifier);
    agg.run(7, 100).await.unwrap();
    let before = patterns.snapshot();

    let summary = agg.run(7, 100).await.unwrap();
    assert_eq!(summary.patterns_touched, 0);

    let after = patterns.snapshot();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].frequency, before[0].frequency);
    assert_eq!(after[0].related_incidents, before[0].related_incidents);
    assert!((after[0].confidence - before[0].confidence).abs() < 1e-6);
}

#[tokio::test]
async fn classifier_failure_aborts_run_without_writes() {
    let a = incident("Job offer deposit scam", "Chennai", 5);
    let incidents = Arc::new(InMemoryIncidentStore::new(vec![a.clone()]));
    let patterns = Arc::new(InMemoryPatternStore::new());

    let agg = aggregator(incidents.clone(), patterns.clone(), Arc::new(FailingClassifier));
    let err = agg.run(7, 100).await.unwrap_err();
    assert!(matches!(err, ScamSignalError::Classifier(_)));

    assert!(patterns.snapshot().is_empty());
    assert!(incidents.get(a.id).unwrap().analysis.is_none());

    // The run slot is released after the failure.
    assert!(!agg.is_running());
}

#[tokio::test]
async fn empty_window_skips_the_classifier() {
    let incidents = Arc::new(InMemoryIncidentStore::new(Vec::new()));
    let patterns = Arc::new(InMemoryPatternStore::new());
    let classifier = Arc::new(StubClassifier::new());

    let agg = aggregator(incidents, patterns.clone(), classifier.clone());
    let summary = agg.run(7, 100).await.unwrap();

    assert_eq!(summary.processed_incidents, 0);
    assert_eq!(summary.patterns_touched, 0);
    assert!(summary.classifications.is_empty());
    assert_eq!(classifier.calls(), 0);
    assert!(patterns.snapshot().is_empty());
}

#[tokio::test]
async fn fake_incidents_are_excluded_from_the_window() {
    let mut fake = incident("Made-up report", "Mumbai", 1);
    fake.status = IncidentStatus::Fake;
    let real = incident("Fake bank KYC call", "Mumbai", 2);
    let incidents = Arc::new(InMemoryIncidentStore::new(vec![fake, real.clone()]));
    let patterns = Arc::new(InMemoryPatternStore::new());
    let classifier = Arc::new(StubClassifier::new());
    classifier.stub(classification(real.id, 2, 0.8));

    let agg = aggregator(incidents, patterns.clone(), classifier);
    let summary = agg.run(7, 100).await.unwrap();

    assert_eq!(summary.processed_incidents, 1);
    assert_eq!(patterns.snapshot()[0].frequency, 1);
}

#[tokio::test]
async fn selection_respects_the_limit() {
    let a = incident("Scam one", "Mumbai", 1);
    let b = incident("Scam two", "Mumbai", 2);
    let c = incident("Scam three", "Mumbai", 3);
    let incidents = Arc::new(InMemoryIncidentStore::new(vec![a.clone(), b.clone(), c]));
    let patterns = Arc::new(InMemoryPatternStore::new());
    let classifier = Arc::new(StubClassifier::new());
    classifier.stub(classification(a.id, 1, 0.8));
    classifier.stub(classification(b.id, 1, 0.8));

    let agg = aggregator(incidents, patterns, classifier);
    let summary = agg.run(7, 2).await.unwrap();

    // Newest two only.
    assert_eq!(summary.classifications.len(), 2);
    assert_eq!(summary.processed_incidents, 2);
}

#[tokio::test]
async fn zero_window_and_zero_limit_are_rejected() {
    let incidents = Arc::new(InMemoryIncidentStore::new(Vec::new()));
    let patterns = Arc::new(InMemoryPatternStore::new());
    let classifier = Arc::new(StubClassifier::new());

    let agg = aggregator(incidents, patterns, classifier.clone());
    assert!(matches!(
        agg.run(0, 100).await.unwrap_err(),
        ScamSignalError::Validation(_)
    ));
    assert!(matches!(
        agg.run(7, 0).await.unwrap_err(),
        ScamSignalError::Validation(_)
    ));
    assert_eq!(classifier.calls(), 0);
}

#[tokio::test]
async fn concurrent_run_is_rejected_and_slot_is_released() {
    let a = incident("SIM swap fraud", "Mumbai", 1);
    let incidents = Arc::new(InMemoryIncidentStore::new(vec![a.clone()]));
    let patterns = Arc::new(InMemoryPatternStore::new());
    let classifier = Arc::new(StubClassifier::with_delay(Duration::from_millis(200)));
    classifier.stub(classification(a.id, 3, 0.8));

    let agg = Arc::new(aggregator(incidents, patterns.clone(), classifier));

    let background = {
        let agg = agg.clone();
        tokio::spawn(async move { agg.run(7, 100).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(agg.is_running());
    let err = agg.run(7, 100).await.unwrap_err();
    assert!(matches!(err, ScamSignalError::AnalysisLockConflict));
    // The rejected trigger must not have clobbered anything.
    assert!(patterns.snapshot().is_empty());

    background.await.unwrap().unwrap();
    assert!(!agg.is_running());
    assert_eq!(patterns.snapshot().len(), 1);

    // A fresh trigger succeeds once the slot is free.
    agg.run(7, 100).await.unwrap();
}

#[tokio::test]
async fn annotation_failure_is_skipped_but_fold_proceeds() {
    let a = incident("Crypto doubling scheme", "Mumbai", 1);
    let b = incident("Crypto investment scam", "Mumbai", 2);
    let incidents = Arc::new(InMemoryIncidentStore::new(vec![a.clone(), b.clone()]));
    incidents.fail_annotation_for(b.id);
    let patterns = Arc::new(InMemoryPatternStore::new());
    let classifier = Arc::new(StubClassifier::new());
    classifier.stub(classification(a.id, 5, 0.8));
    classifier.stub(classification(b.id, 5, 0.6));

    let agg = aggregator(incidents.clone(), patterns.clone(), classifier);
    let summary = agg.run(7, 100).await.unwrap();

    assert_eq!(summary.processed_incidents, 1);
    assert!(incidents.get(a.id).unwrap().analysis.is_some());
    assert!(incidents.get(b.id).unwrap().analysis.is_none());
    // Folding counts both classifications regardless.
    assert_eq!(patterns.snapshot()[0].frequency, 2);
}

#[tokio::test]
async fn failing_topic_group_does_not_abort_the_others() {
    let a = incident("Romance scam on dating app", "Mumbai", 1);
    let b = incident("Fake tech support popup", "Delhi", 2);
    let incidents = Arc::new(InMemoryIncidentStore::new(vec![a.clone(), b.clone()]));
    let patterns = Arc::new(InMemoryPatternStore::new());
    patterns.fail_writes_for("topic_8");
    let classifier = Arc::new(StubClassifier::new());
    classifier.stub(classification(a.id, 8, 0.8));
    classifier.stub(classification(b.id, 9, 0.6));

    let agg = aggregator(incidents, patterns.clone(), classifier);
    let summary = agg.run(7, 100).await.unwrap();

    assert_eq!(summary.patterns_touched, 1);
    let stored = patterns.snapshot();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].pattern_key, "topic_9");
}

#[tokio::test]
async fn later_run_overwrites_the_annotation() {
    let a = incident("Fake customs fee demand", "Kolkata", 1);
    let incidents = Arc::new(InMemoryIncidentStore::new(vec![a.clone()]));
    let patterns = Arc::new(InMemoryPatternStore::new());
    let classifier = Arc::new(StubClassifier::new());
    classifier.stub(classification(a.id, 11, 0.8));

    let agg = aggregator(incidents.clone(), patterns.clone(), classifier.clone());
    agg.run(7, 100).await.unwrap();
    assert_eq!(incidents.get(a.id).unwrap().analysis.unwrap().topic_id, 11);

    // The model reassigns the incident to a different topic next run.
    classifier.stub(classification(a.id, 12, 0.9));
    agg.run(7, 100).await.unwrap();
    assert_eq!(incidents.get(a.id).unwrap().analysis.unwrap().topic_id, 12);
}

#[tokio::test]
async fn trend_score_tracks_frequency_and_confidence() {
    use rand::Rng;

    let mut rng = rand::rng();
    for _ in 0..50 {
        let count = rng.random_range(1..=6usize);
        let incidents: Vec<Incident> = (0..count)
            .map(|i| incident(&format!("Scam report {i}"), "Mumbai", i as i64 + 1))
            .collect();
        let classifier = Arc::new(StubClassifier::new());
        let mut confidences = Vec::new();
        for inc in &incidents {
            let conf = rng.random_range(0.05..1.0f32);
            confidences.push(conf);
            classifier.stub(classification(inc.id, 1, conf));
        }

        let store = Arc::new(InMemoryIncidentStore::new(incidents));
        let patterns = Arc::new(InMemoryPatternStore::new());
        let agg = aggregator(store, patterns.clone(), classifier);
        agg.run(7, 100).await.unwrap();

        let pattern = &patterns.snapshot()[0];
        let mean = confidences.iter().sum::<f32>() / count as f32;
        assert_eq!(pattern.frequency, count as u32);
        assert!((pattern.confidence - mean).abs() < 1e-4);
        let expected = count as f32 * 0.7 + pattern.confidence * 0.3;
        assert!((pattern.trend_score - expected).abs() < 1e-4);
    }
}
