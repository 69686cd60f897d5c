use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use scamsignal_common::{ScamCategory, ScamPattern};

use crate::error::StoreError;
use crate::rows::{PatternJson, PatternRow};

/// Scam-pattern persistence. Patterns are created and updated by the
/// aggregation engine and never deleted, only deactivated.
#[derive(Clone)]
pub struct PatternRepo {
    pool: PgPool,
}

impl PatternRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, pattern: &ScamPattern) -> Result<(), StoreError> {
        let json = PatternJson::encode(pattern)?;

        sqlx::query(
            r#"
            INSERT INTO scam_patterns
                (id, pattern_key, name, description, keywords, severity, category,
                 confidence, frequency, trend_score, geographic_distribution,
                 time_distribution, related_incidents, active, created_at, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(pattern.id)
        .bind(&pattern.pattern_key)
        .bind(&pattern.name)
        .bind(&pattern.description)
        .bind(&json.keywords)
        .bind(pattern.severity.to_string())
        .bind(pattern.category.to_string())
        .bind(pattern.confidence)
        .bind(pattern.frequency as i32)
        .bind(pattern.trend_score)
        .bind(&json.geographic_distribution)
        .bind(&json.time_distribution)
        .bind(&json.related_incidents)
        .bind(pattern.active)
        .bind(pattern.created_at)
        .bind(pattern.last_updated)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist the mutable aggregate state of an existing pattern.
    pub async fn update(&self, pattern: &ScamPattern) -> Result<(), StoreError> {
        let json = PatternJson::encode(pattern)?;

        let result = sqlx::query(
            r#"
            UPDATE scam_patterns SET
                name = $2, description = $3, keywords = $4, severity = $5,
                confidence = $6, frequency = $7, trend_score = $8,
                geographic_distribution = $9, time_distribution = $10,
                related_incidents = $11, active = $12, last_updated = $13
            WHERE pattern_key = $1
            "#,
        )
        .bind(&pattern.pattern_key)
        .bind(&pattern.name)
        .bind(&pattern.description)
        .bind(&json.keywords)
        .bind(pattern.severity.to_string())
        .bind(pattern.confidence)
        .bind(pattern.frequency as i32)
        .bind(pattern.trend_score)
        .bind(&json.geographic_distribution)
        .bind(&json.time_distribution)
        .bind(&json.related_incidents)
        .bind(pattern.active)
        .bind(pattern.last_updated)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(pattern_key = %pattern.pattern_key, "Pattern update matched no row");
            return Err(StoreError::Sqlx(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    pub async fn find_active_by_key(&self, key: &str) -> Result<Option<ScamPattern>, StoreError> {
        let row = sqlx::query_as::<_, PatternRow>(
            "SELECT * FROM scam_patterns WHERE pattern_key = $1 AND active",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ScamPattern::try_from).transpose()
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ScamPattern>, StoreError> {
        let row = sqlx::query_as::<_, PatternRow>("SELECT * FROM scam_patterns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ScamPattern::try_from).transpose()
    }

    /// All active patterns, highest trend score first. The insight layer
    /// does any further filtering and shaping in memory.
    pub async fn list_active(&self) -> Result<Vec<ScamPattern>, StoreError> {
        let rows = sqlx::query_as::<_, PatternRow>(
            "SELECT * FROM scam_patterns WHERE active ORDER BY trend_score DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ScamPattern::try_from).collect()
    }

    pub async fn by_category(
        &self,
        category: ScamCategory,
        limit: u32,
    ) -> Result<Vec<ScamPattern>, StoreError> {
        let rows = sqlx::query_as::<_, PatternRow>(
            r#"
            SELECT * FROM scam_patterns
            WHERE active AND category = $1
            ORDER BY trend_score DESC
            LIMIT $2
            "#,
        )
        .bind(category.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ScamPattern::try_from).collect()
    }

    /// Deactivate a pattern. Patterns are never physically deleted.
    pub async fn deactivate(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE scam_patterns SET active = FALSE, last_updated = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
