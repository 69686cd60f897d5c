use chrono::{DateTime, Utc};
use uuid::Uuid;

use scamsignal_common::{
    GeoPoint, HourCount, Incident, IncidentStatus, Keyword, MlAnnotation, RegionCount,
    ScamCategory, ScamPattern, ScammerDetails, Severity,
};

use crate::error::StoreError;

/// A row from the incidents table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct IncidentRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub scammer_details: Option<serde_json::Value>,
    pub severity: String,
    pub status: String,
    pub reported_by: Uuid,
    pub image_url: Option<String>,
    pub analysis: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<IncidentRow> for Incident {
    type Error = StoreError;

    fn try_from(row: IncidentRow) -> Result<Self, Self::Error> {
        let severity = Severity::parse(&row.severity)
            .ok_or_else(|| StoreError::Decode(format!("unknown severity '{}'", row.severity)))?;
        let status = IncidentStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Decode(format!("unknown status '{}'", row.status)))?;
        let scammer_details: Option<ScammerDetails> = row
            .scammer_details
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let analysis: Option<MlAnnotation> = row
            .analysis
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let coordinates = match (row.lat, row.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        };

        Ok(Incident {
            id: row.id,
            title: row.title,
            description: row.description,
            location: row.location,
            coordinates,
            scammer_details,
            severity,
            status,
            reported_by: row.reported_by,
            image_url: row.image_url,
            analysis,
            created_at: row.created_at,
        })
    }
}

/// A row from the scam_patterns table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct PatternRow {
    pub id: Uuid,
    pub pattern_key: String,
    pub name: String,
    pub description: String,
    pub keywords: serde_json::Value,
    pub severity: String,
    pub category: String,
    pub confidence: f32,
    pub frequency: i32,
    pub trend_score: f32,
    pub geographic_distribution: serde_json::Value,
    pub time_distribution: serde_json::Value,
    pub related_incidents: serde_json::Value,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl TryFrom<PatternRow> for ScamPattern {
    type Error = StoreError;

    fn try_from(row: PatternRow) -> Result<Self, Self::Error> {
        let severity = Severity::parse(&row.severity)
            .ok_or_else(|| StoreError::Decode(format!("unknown severity '{}'", row.severity)))?;
        let category = ScamCategory::parse(&row.category)
            .ok_or_else(|| StoreError::Decode(format!("unknown category '{}'", row.category)))?;
        let keywords: Vec<Keyword> = serde_json::from_value(row.keywords)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let geographic_distribution: Vec<RegionCount> =
            serde_json::from_value(row.geographic_distribution)
                .map_err(|e| StoreError::Decode(e.to_string()))?;
        let time_distribution: Vec<HourCount> = serde_json::from_value(row.time_distribution)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let related_incidents: Vec<Uuid> = serde_json::from_value(row.related_incidents)
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(ScamPattern {
            id: row.id,
            pattern_key: row.pattern_key,
            name: row.name,
            description: row.description,
            keywords,
            severity,
            category,
            confidence: row.confidence,
            frequency: row.frequency.max(0) as u32,
            trend_score: row.trend_score,
            geographic_distribution,
            time_distribution,
            related_incidents,
            active: row.active,
            created_at: row.created_at,
            last_updated: row.last_updated,
        })
    }
}

/// JSONB encodings for a pattern's document-shaped columns.
pub(crate) struct PatternJson {
    pub keywords: serde_json::Value,
    pub geographic_distribution: serde_json::Value,
    pub time_distribution: serde_json::Value,
    pub related_incidents: serde_json::Value,
}

impl PatternJson {
    pub fn encode(pattern: &ScamPattern) -> Result<Self, StoreError> {
        Ok(Self {
            keywords: serde_json::to_value(&pattern.keywords)
                .map_err(|e| StoreError::Decode(e.to_string()))?,
            geographic_distribution: serde_json::to_value(&pattern.geographic_distribution)
                .map_err(|e| StoreError::Decode(e.to_string()))?,
            time_distribution: serde_json::to_value(&pattern.time_distribution)
                .map_err(|e| StoreError::Decode(e.to_string()))?,
            related_incidents: serde_json::to_value(&pattern.related_incidents)
                .map_err(|e| StoreError::Decode(e.to_string()))?,
        })
    }
}
