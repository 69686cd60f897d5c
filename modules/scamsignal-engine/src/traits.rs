// Trait abstractions for the aggregation engine's storage dependencies.
//
// IncidentStore — the selection window and annotation write-back.
// PatternStore — lookup/insert/update of derived pattern aggregates.
//
// In-memory implementations live in `testing.rs`.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use scamsignal_common::{Incident, MlAnnotation, ScamPattern};

#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Incidents created within the lookback window, newest-first,
    /// excluding status = fake, capped at `limit`.
    async fn recent(&self, window_days: u32, limit: u32) -> Result<Vec<Incident>>;

    /// Overwrite the incident's ML annotation (one annotation per incident;
    /// later runs replace, never append).
    async fn annotate(&self, incident_id: Uuid, annotation: &MlAnnotation) -> Result<()>;
}

#[async_trait]
pub trait PatternStore: Send + Sync {
    async fn find_active_by_key(&self, pattern_key: &str) -> Result<Option<ScamPattern>>;

    async fn insert(&self, pattern: &ScamPattern) -> Result<()>;

    async fn update(&self, pattern: &ScamPattern) -> Result<()>;
}

#[async_trait]
impl IncidentStore for scamsignal_store::IncidentRepo {
    async fn recent(&self, window_days: u32, limit: u32) -> Result<Vec<Incident>> {
        Ok(self.recent(window_days, limit).await?)
    }

    async fn annotate(&self, incident_id: Uuid, annotation: &MlAnnotation) -> Result<()> {
        Ok(self.set_analysis(incident_id, annotation).await?)
    }
}

#[async_trait]
impl PatternStore for scamsignal_store::PatternRepo {
    async fn find_active_by_key(&self, pattern_key: &str) -> Result<Option<ScamPattern>> {
        Ok(self.find_active_by_key(pattern_key).await?)
    }

    async fn insert(&self, pattern: &ScamPattern) -> Result<()> {
        Ok(self.insert(pattern).await?)
    }

    async fn update(&self, pattern: &ScamPattern) -> Result<()> {
        Ok(self.update(pattern).await?)
    }
}
