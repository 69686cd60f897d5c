use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scamsignal_common::Incident;

/// One request element. The batch is serialized as a JSON array and is the
/// sole payload sent to the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub location: String,
}

impl IncidentSummary {
    pub fn from_incident(incident: &Incident) -> Self {
        Self {
            id: incident.id,
            title: incident.title.clone(),
            description: incident.description.clone(),
            timestamp: incident.created_at,
            location: incident.location.clone(),
        }
    }
}

/// One response element, id-matched to the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub id: Uuid,
    pub topic_id: i64,
    pub topic_name: String,
    pub parent_category: String,
    pub child_label: String,
    pub parent_confidence: f32,
    pub child_confidence: f32,
    pub summary: String,
}

/// Raw classifier response: either a list of classifications or a top-level
/// error object, which short-circuits the run as a fatal failure.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ClassifierResponse {
    Error { error: String },
    Results(Vec<Classification>),
}
