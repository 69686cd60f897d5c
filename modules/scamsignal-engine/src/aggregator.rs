use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use scamsignal_classifier::{BatchClassifier, Classification, IncidentSummary};
use scamsignal_common::{GeoPoint, Incident, MlAnnotation, ScamPattern, ScamSignalError};

use crate::scoring;
use crate::traits::{IncidentStore, PatternStore};

/// Outcome of one aggregation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Incidents whose annotation was written this run. Per-item annotation
    /// failures reduce this count without failing the run.
    pub processed_incidents: usize,
    /// Patterns created or updated this run.
    pub patterns_touched: usize,
    pub classifications: Vec<Classification>,
    pub analysis_timestamp: DateTime<Utc>,
}

impl RunSummary {
    fn empty() -> Self {
        Self {
            processed_incidents: 0,
            patterns_touched: 0,
            classifications: Vec::new(),
            analysis_timestamp: Utc::now(),
        }
    }
}

/// Accumulated per-item outcomes for one pipeline step.
#[derive(Debug, Default, Clone, Copy)]
struct StepOutcome {
    succeeded: usize,
    failed: usize,
}

/// Releases the run slot when the run finishes, including on early error
/// returns.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The select → classify → annotate → fold pipeline. Exactly one run may be
/// in flight per instance; a concurrent trigger fails fast with
/// [`ScamSignalError::AnalysisLockConflict`] instead of queuing.
pub struct Aggregator {
    incidents: Arc<dyn IncidentStore>,
    patterns: Arc<dyn PatternStore>,
    classifier: Arc<dyn BatchClassifier>,
    running: AtomicBool,
}

impl Aggregator {
    pub fn new(
        incidents: Arc<dyn IncidentStore>,
        patterns: Arc<dyn PatternStore>,
        classifier: Arc<dyn BatchClassifier>,
    ) -> Self {
        Self {
            incidents,
            patterns,
            classifier,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> Result<RunGuard<'_>, ScamSignalError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ScamSignalError::AnalysisLockConflict)?;
        Ok(RunGuard(&self.running))
    }

    /// Run one aggregation pass over the recent incident window.
    pub async fn run(&self, window_days: u32, limit: u32) -> Result<RunSummary, ScamSignalError> {
        if window_days == 0 {
            return Err(ScamSignalError::Validation(
                "window_days must be greater than zero".into(),
            ));
        }
        if limit == 0 {
            return Err(ScamSignalError::Validation(
                "limit must be greater than zero".into(),
            ));
        }

        let _guard = self.try_acquire()?;

        info!(window_days, limit, "Aggregation run starting");

        // Step 1: selection.
        let incidents = self
            .incidents
            .recent(window_days, limit)
            .await
            .map_err(|e| ScamSignalError::Database(e.to_string()))?;

        if incidents.is_empty() {
            info!("No recent incidents to process");
            return Ok(RunSummary::empty());
        }

        // Step 2: one classification batch. Any gateway failure is fatal for
        // the run; no pattern state has been written yet.
        let batch: Vec<IncidentSummary> =
            incidents.iter().map(IncidentSummary::from_incident).collect();
        let classifications = self
            .classifier
            .classify(&batch)
            .await
            .map_err(|e| ScamSignalError::Classifier(e.to_string()))?;

        let analysis_timestamp = Utc::now();
        let incidents_by_id: HashMap<Uuid, &Incident> =
            incidents.iter().map(|i| (i.id, i)).collect();

        // Step 3: annotation write-back, per-item failures skipped.
        let annotation = self
            .annotate_incidents(&classifications, analysis_timestamp)
            .await;

        // Step 4: pattern folding, per-group failures skipped.
        let folding = self.fold_patterns(&classifications, &incidents_by_id).await;

        info!(
            processed = annotation.succeeded,
            annotation_failures = annotation.failed,
            patterns = folding.succeeded,
            fold_failures = folding.failed,
            "Aggregation run complete"
        );

        Ok(RunSummary {
            processed_incidents: annotation.succeeded,
            patterns_touched: folding.succeeded,
            classifications,
            analysis_timestamp,
        })
    }

    /// Write each classification back onto its incident. A failure for one
    /// incident is logged and skipped; it never aborts the batch.
    async fn annotate_incidents(
        &self,
        classifications: &[Classification],
        analyzed_at: DateTime<Utc>,
    ) -> StepOutcome {
        let mut outcome = StepOutcome::default();

        for c in classifications {
            let annotation = MlAnnotation {
                parent_category: c.parent_category.clone(),
                child_label: c.child_label.clone(),
                parent_confidence: c.parent_confidence,
                child_confidence: c.child_confidence,
                summary: c.summary.clone(),
                topic_id: c.topic_id,
                topic_name: c.topic_name.clone(),
                analyzed_at,
            };

            match self.incidents.annotate(c.id, &annotation).await {
                Ok(()) => outcome.succeeded += 1,
                Err(e) => {
                    warn!(incident_id = %c.id, error = %e, "Failed to annotate incident");
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }

    /// Group classifications by topic (first-seen order) and fold each group
    /// into its pattern. A failing group is logged and skipped; the other
    /// groups still complete. Counts only groups that created or changed a
    /// pattern.
    async fn fold_patterns(
        &self,
        classifications: &[Classification],
        incidents_by_id: &HashMap<Uuid, &Incident>,
    ) -> StepOutcome {
        let mut groups: Vec<(i64, Vec<&Classification>)> = Vec::new();
        for c in classifications {
            if let Some(group) = groups.iter_mut().find(|(id, _)| *id == c.topic_id) {
                group.1.push(c);
            } else {
                groups.push((c.topic_id, vec![c]));
            }
        }

        let mut outcome = StepOutcome::default();
        for (topic_id, group) in &groups {
            match self.fold_topic(*topic_id, group, incidents_by_id).await {
                Ok(true) => outcome.succeeded += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(topic_id, error = %e, "Failed to fold topic group");
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }

    /// Fold one topic group. Returns true if a pattern was created or
    /// updated, false if the group was entirely already attributed.
    async fn fold_topic(
        &self,
        topic_id: i64,
        group: &[&Classification],
        incidents_by_id: &HashMap<Uuid, &Incident>,
    ) -> anyhow::Result<bool> {
        let key = ScamPattern::pattern_key_for(topic_id);

        let Some(mut pattern) = self.patterns.find_active_by_key(&key).await? else {
            let pattern = scoring::build_pattern(topic_id, group, incidents_by_id);
            self.patterns.insert(&pattern).await?;
            info!(
                pattern_key = %pattern.pattern_key,
                frequency = pattern.frequency,
                trend_score = pattern.trend_score,
                "Created pattern"
            );
            return Ok(true);
        };

        // Set-union attribution: ids already on the pattern neither grow the
        // frequency nor re-count in the distributions.
        let old_frequency = pattern.frequency;
        let mut added: Vec<&Classification> = Vec::new();
        for classification in group {
            if !pattern.add_incident(classification.id) {
                continue;
            }
            added.push(classification);
            if let Some(incident) = incidents_by_id.get(&classification.id) {
                let coordinates = incident.coordinates.unwrap_or_else(GeoPoint::unknown);
                pattern.note_region(&scoring::region_of(incident), coordinates);
                pattern.note_hour(scoring::hour_of(incident));
            }
        }

        if added.is_empty() {
            return Ok(false);
        }

        // Frequency-weighted running mean over all contributing incidents:
        // the existing confidence carries the pattern's prior frequency, the
        // newly attributed incidents fold in at their mean best confidence.
        let added_mean = scoring::mean_confidence(&added);
        let total = old_frequency + added.len() as u32;
        pattern.confidence = (pattern.confidence * old_frequency as f32
            + added_mean * added.len() as f32)
            / total as f32;
        pattern.update_trend_score();

        self.patterns.update(&pattern).await?;
        info!(
            pattern_key = %pattern.pattern_key,
            frequency = pattern.frequency,
            trend_score = pattern.trend_score,
            "Updated pattern"
        );
        Ok(true)
    }
}
