use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use scamsignal_common::{Incident, IncidentStatus, MlAnnotation};

use crate::error::StoreError;
use crate::rows::IncidentRow;

/// Incident persistence. Append-mostly: rows are created on submission and
/// mutated only by ML annotation writes and status review actions.
#[derive(Clone)]
pub struct IncidentRepo {
    pool: PgPool,
}

impl IncidentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, incident: &Incident) -> Result<(), StoreError> {
        let scammer_details = incident
            .scammer_details
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO incidents
                (id, title, description, location, lat, lng, scammer_details,
                 severity, status, reported_by, image_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(incident.id)
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(&incident.location)
        .bind(incident.coordinates.map(|c| c.lat))
        .bind(incident.coordinates.map(|c| c.lng))
        .bind(scammer_details)
        .bind(incident.severity.to_string())
        .bind(incident.status.to_string())
        .bind(incident.reported_by)
        .bind(&incident.image_url)
        .bind(incident.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Incident>, StoreError> {
        let row = sqlx::query_as::<_, IncidentRow>("SELECT * FROM incidents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Incident::try_from).transpose()
    }

    /// Incidents created within the lookback window, newest-first, excluding
    /// status = fake, capped at `limit`.
    pub async fn recent(&self, window_days: u32, limit: u32) -> Result<Vec<Incident>, StoreError> {
        let cutoff = Utc::now() - Duration::days(i64::from(window_days));

        let rows = sqlx::query_as::<_, IncidentRow>(
            r#"
            SELECT * FROM incidents
            WHERE created_at >= $1 AND status <> 'fake'
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Incident::try_from).collect()
    }

    /// Overwrite the incident's ML annotation. Exactly one annotation per
    /// incident; a later run replaces the previous one wholesale.
    pub async fn set_analysis(
        &self,
        id: Uuid,
        annotation: &MlAnnotation,
    ) -> Result<(), StoreError> {
        let value =
            serde_json::to_value(annotation).map_err(|e| StoreError::Decode(e.to_string()))?;

        let result = sqlx::query("UPDATE incidents SET analysis = $2 WHERE id = $1")
            .bind(id)
            .bind(value)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Sqlx(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    /// Status review action (under review, resolved, fake).
    pub async fn set_status(&self, id: Uuid, status: IncidentStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE incidents SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Sqlx(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    /// Load the incidents attributed to a pattern, newest-first. Used to
    /// populate related-incident summaries in trending responses.
    pub async fn by_ids(&self, ids: &[Uuid]) -> Result<Vec<Incident>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, IncidentRow>(
            "SELECT * FROM incidents WHERE id = ANY($1) ORDER BY created_at DESC",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Incident::try_from).collect()
    }
}
