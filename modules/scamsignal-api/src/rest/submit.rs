use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use scamsignal_common::{GeoPoint, Incident, IncidentStatus, ScammerDetails, Severity};

use crate::AppState;

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 5000;
const MAX_LOCATION_LEN: usize = 200;

#[derive(Deserialize)]
pub struct SubmitIncidentRequest {
    pub title: String,
    pub description: String,
    pub location: String,
    pub coordinates: Option<GeoPoint>,
    pub scammer_details: Option<ScammerDetails>,
    pub severity: Option<String>,
    pub reported_by: Uuid,
    pub image_url: Option<String>,
}

/// Field validation for a citizen submission. Returns the first problem
/// found; severity parsing is handled separately by the caller.
pub fn validate_submission(req: &SubmitIncidentRequest) -> Result<(), String> {
    if req.title.trim().is_empty() {
        return Err("Title is required".to_string());
    }
    if req.title.len() > MAX_TITLE_LEN {
        return Err(format!("Title too long (max {MAX_TITLE_LEN} characters)"));
    }
    if req.description.trim().is_empty() {
        return Err("Description is required".to_string());
    }
    if req.description.len() > MAX_DESCRIPTION_LEN {
        return Err(format!(
            "Description too long (max {MAX_DESCRIPTION_LEN} characters)"
        ));
    }
    if req.location.len() > MAX_LOCATION_LEN {
        return Err(format!(
            "Location too long (max {MAX_LOCATION_LEN} characters)"
        ));
    }
    if let Some(coords) = &req.coordinates {
        if !(-90.0..=90.0).contains(&coords.lat) || !(-180.0..=180.0).contains(&coords.lng) {
            return Err("Coordinates out of range".to_string());
        }
    }
    if let Some(website) = req
        .scammer_details
        .as_ref()
        .and_then(|d| d.website.as_deref())
    {
        let parsed = url::Url::parse(website).map_err(|_| "Invalid scammer website URL")?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err("Scammer website must use http or https scheme".to_string());
        }
    }
    Ok(())
}

pub async fn api_submit_incident(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitIncidentRequest>,
) -> impl IntoResponse {
    if let Err(msg) = validate_submission(&body) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": msg })),
        )
            .into_response();
    }

    let severity = match body.severity.as_deref() {
        None => Severity::Medium,
        Some(s) => match Severity::parse(s) {
            Some(severity) => severity,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": "Unknown severity" })),
                )
                    .into_response();
            }
        },
    };

    let incident = Incident {
        id: Uuid::new_v4(),
        title: body.title.trim().to_string(),
        description: body.description.trim().to_string(),
        location: body.location.trim().to_string(),
        coordinates: body.coordinates,
        scammer_details: body.scammer_details,
        severity,
        status: IncidentStatus::Reported,
        reported_by: body.reported_by,
        image_url: body.image_url,
        analysis: None,
        created_at: Utc::now(),
    };

    if let Err(e) = state.incidents.insert(&incident).await {
        warn!(error = %e, "Failed to store incident");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "Failed to store incident" })),
        )
            .into_response();
    }

    // Log without title/description (citizen reports may contain PII).
    info!(incident_id = %incident.id, severity = %incident.severity, "Incident reported");

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": incident.id,
            "status": incident.status.to_string(),
        })),
    )
        .into_response()
}
