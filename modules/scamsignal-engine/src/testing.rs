//! In-memory fakes for the engine's storage and classifier seams. Used by
//! the integration tests in `tests/` and available to downstream crates via
//! the `test-support` feature.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use uuid::Uuid;

use scamsignal_classifier::{BatchClassifier, Classification, ClassifierError, IncidentSummary};
use scamsignal_common::{Incident, MlAnnotation, ScamPattern};

use crate::traits::{IncidentStore, PatternStore};

#[derive(Default)]
pub struct InMemoryIncidentStore {
    incidents: Mutex<Vec<Incident>>,
    failing_annotations: Mutex<HashSet<Uuid>>,
}

impl InMemoryIncidentStore {
    pub fn new(incidents: Vec<Incident>) -> Self {
        Self {
            incidents: Mutex::new(incidents),
            failing_annotations: Mutex::new(HashSet::new()),
        }
    }

    /// Makes `annotate` fail for the given incident.
    pub fn fail_annotation_for(&self, incident_id: Uuid) {
        self.failing_annotations
            .lock()
            .unwrap()
            .insert(incident_id);
    }

    pub fn push(&self, incident: Incident) {
        self.incidents.lock().unwrap().push(incident);
    }

    pub fn get(&self, incident_id: Uuid) -> Option<Incident> {
        self.incidents
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == incident_id)
            .cloned()
    }
}

#[async_trait]
impl IncidentStore for InMemoryIncidentStore {
    async fn recent(&self, window_days: u32, limit: u32) -> Result<Vec<Incident>> {
        let cutoff = Utc::now() - ChronoDuration::days(window_days as i64);
        let mut selected: Vec<Incident> = self
            .incidents
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.created_at >= cutoff)
            .filter(|i| i.status != scamsignal_common::IncidentStatus::Fake)
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        selected.truncate(limit as usize);
        Ok(selected)
    }

    async fn annotate(&self, incident_id: Uuid, annotation: &MlAnnotation) -> Result<()> {
        if self
            .failing_annotations
            .lock()
            .unwrap()
            .contains(&incident_id)
        {
            bail!("simulated annotation failure for {incident_id}");
        }
        let mut incidents = self.incidents.lock().unwrap();
        let Some(incident) = incidents.iter_mut().find(|i| i.id == incident_id) else {
            bail!("incident {incident_id} not found");
        };
        incident.analysis = Some(annotation.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPatternStore {
    patterns: Mutex<Vec<ScamPattern>>,
    failing_keys: Mutex<HashSet<String>>,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patterns(patterns: Vec<ScamPattern>) -> Self {
        Self {
            patterns: Mutex::new(patterns),
            failing_keys: Mutex::new(HashSet::new()),
        }
    }

    /// Makes `insert` and `update` fail for the given pattern key.
    pub fn fail_writes_for(&self, pattern_key: &str) {
        self.failing_keys
            .lock()
            .unwrap()
            .insert(pattern_key.to_string());
    }

    pub fn snapshot(&self) -> Vec<ScamPattern> {
        self.patterns.lock().unwrap().clone()
    }

    fn check_writable(&self, pattern_key: &str) -> Result<()> {
        if self.failing_keys.lock().unwrap().contains(pattern_key) {
            bail!("simulated write failure for {pattern_key}");
        }
        Ok(())
    }
}

#[async_trait]
impl PatternStore for InMemoryPatternStore {
    async fn find_active_by_key(&self, pattern_key: &str) -> Result<Option<ScamPattern>> {
        Ok(self
            .patterns
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.pattern_key == pattern_key && p.active)
            .cloned())
    }

    async fn insert(&self, pattern: &ScamPattern) -> Result<()> {
        self.check_writable(&pattern.pattern_key)?;
        self.patterns.lock().unwrap().push(pattern.clone());
        Ok(())
    }

    async fn update(&self, pattern: &ScamPattern) -> Result<()> {
        self.check_writable(&pattern.pattern_key)?;
        let mut patterns = self.patterns.lock().unwrap();
        let Some(existing) = patterns
            .iter_mut()
            .find(|p| p.pattern_key == pattern.pattern_key)
        else {
            bail!("pattern {} not found", pattern.pattern_key);
        };
        *existing = pattern.clone();
        Ok(())
    }
}

/// Classifier fake returning a canned classification per incident id, in
/// input order. Unknown ids fail the batch, which mirrors a pipeline that
/// lost track of its input.
#[derive(Default)]
pub struct StubClassifier {
    by_incident: Mutex<HashMap<Uuid, Classification>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl StubClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artificial latency to each batch, for exercising the
    /// single-flight lock.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn stub(&self, classification: Classification) {
        self.by_incident
            .lock()
            .unwrap()
            .insert(classification.id, classification);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchClassifier for StubClassifier {
    async fn classify(
        &self,
        batch: &[IncidentSummary],
    ) -> Result<Vec<Classification>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let by_incident = self.by_incident.lock().unwrap();
        batch
            .iter()
            .map(|summary| {
                by_incident
                    .get(&summary.id)
                    .cloned()
                    .ok_or_else(|| ClassifierError::Pipeline(format!("no stub for {}", summary.id)))
            })
            .collect()
    }
}

/// Classifier fake that always fails the batch.
pub struct FailingClassifier;

#[async_trait]
impl BatchClassifier for FailingClassifier {
    async fn classify(
        &self,
        _batch: &[IncidentSummary],
    ) -> Result<Vec<Classification>, ClassifierError> {
        Err(ClassifierError::Pipeline("model unavailable".to_string()))
    }
}
