pub mod submit;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use scamsignal_common::{IncidentStatus, ScamCategory, ScamPattern, ScamSignalError};
use scamsignal_engine::insights;

use crate::AppState;

// --- Query structs ---

#[derive(Deserialize, Default)]
pub struct RunRequest {
    days: Option<u32>,
    limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct TrendingQuery {
    limit: Option<usize>,
    category: Option<String>,
    region: Option<String>,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    limit: Option<usize>,
}

// --- Helpers ---

fn error_json(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

async fn load_active_patterns(
    state: &AppState,
) -> Result<Vec<ScamPattern>, axum::response::Response> {
    state.patterns.list_active().await.map_err(|e| {
        warn!(error = %e, "Failed to load active patterns");
        error_json(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load patterns")
    })
}

/// Pattern JSON with brief summaries of its related incidents inlined, so
/// the dashboard can render a cluster without a second round trip.
async fn pattern_with_incidents(state: &AppState, pattern: &ScamPattern) -> serde_json::Value {
    let incidents = match state.incidents.by_ids(&pattern.related_incidents).await {
        Ok(incidents) => incidents
            .iter()
            .map(|i| {
                serde_json::json!({
                    "id": i.id,
                    "title": i.title,
                    "location": i.location,
                    "severity": i.severity.to_string(),
                    "created_at": i.created_at,
                })
            })
            .collect(),
        Err(e) => {
            warn!(pattern_key = %pattern.pattern_key, error = %e, "Failed to load related incidents");
            Vec::new()
        }
    };

    let mut value = serde_json::to_value(pattern).unwrap_or_default();
    if let Some(obj) = value.as_object_mut() {
        obj.insert("incidents".to_string(), serde_json::Value::Array(incidents));
    }
    value
}

// --- Handlers ---

pub async fn api_incident_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let uuid = match Uuid::parse_str(&id) {
        Ok(u) => u,
        Err(_) => return error_json(StatusCode::BAD_REQUEST, "Invalid incident id"),
    };

    match state.incidents.get(uuid).await {
        Ok(Some(incident)) => Json(incident).into_response(),
        Ok(None) => error_json(StatusCode::NOT_FOUND, "Incident not found"),
        Err(e) => {
            warn!(error = %e, "Failed to load incident");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load incident")
        }
    }
}

#[derive(Deserialize)]
pub struct StatusRequest {
    status: String,
}

/// Review action: moderators mark a report under review, resolved, or fake.
pub async fn api_set_incident_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> impl IntoResponse {
    let uuid = match Uuid::parse_str(&id) {
        Ok(u) => u,
        Err(_) => return error_json(StatusCode::BAD_REQUEST, "Invalid incident id"),
    };
    let Some(status) = IncidentStatus::parse(&body.status) else {
        return error_json(StatusCode::BAD_REQUEST, "Unknown status");
    };

    match state.incidents.set_status(uuid, status).await {
        Ok(()) => Json(serde_json::json!({ "id": uuid, "status": status.to_string() }))
            .into_response(),
        Err(e) if e.is_row_not_found() => error_json(StatusCode::NOT_FOUND, "Incident not found"),
        Err(e) => {
            warn!(error = %e, "Failed to update incident status");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update status")
        }
    }
}

pub async fn api_analysis_run(
    State(state): State<Arc<AppState>>,
    body: Option<Json<RunRequest>>,
) -> impl IntoResponse {
    let Json(req) = body.unwrap_or_default();
    let days = req.days.unwrap_or(7);
    let limit = req.limit.unwrap_or(100);

    match state.aggregator.run(days, limit).await {
        Ok(summary) => {
            let mut topics: Vec<i64> = summary.classifications.iter().map(|c| c.topic_id).collect();
            topics.sort_unstable();
            topics.dedup();
            Json(serde_json::json!({
                "success": true,
                "processed_incidents": summary.processed_incidents,
                "total_patterns": summary.patterns_touched,
                "trending_topics": topics.len(),
                "analysis_timestamp": summary.analysis_timestamp,
            }))
            .into_response()
        }
        Err(ScamSignalError::Validation(msg)) => error_json(StatusCode::BAD_REQUEST, &msg),
        Err(e @ ScamSignalError::AnalysisLockConflict) => {
            error_json(StatusCode::CONFLICT, &e.to_string())
        }
        Err(e) => {
            warn!(error = %e, "Aggregation run failed");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Analysis run failed")
        }
    }
}

pub async fn api_analysis_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "running": state.aggregator.is_running() }))
}

pub async fn api_trending_patterns(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrendingQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(10).min(100);
    let category = match params.category.as_deref().map(ScamCategory::parse) {
        Some(None) => return error_json(StatusCode::BAD_REQUEST, "Unknown category"),
        Some(parsed) => parsed,
        None => None,
    };

    let patterns = match load_active_patterns(&state).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let top = insights::top_by_trend(&patterns, limit, category, params.region.as_deref());

    let mut views = Vec::with_capacity(top.len());
    for pattern in &top {
        views.push(pattern_with_incidents(&state, pattern).await);
    }
    Json(serde_json::json!({ "patterns": views })).into_response()
}

pub async fn api_pattern_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let uuid = match Uuid::parse_str(&id) {
        Ok(u) => u,
        Err(_) => return error_json(StatusCode::BAD_REQUEST, "Invalid pattern id"),
    };

    match state.patterns.get(uuid).await {
        Ok(Some(pattern)) => Json(pattern_with_incidents(&state, &pattern).await).into_response(),
        Ok(None) => error_json(StatusCode::NOT_FOUND, "Pattern not found"),
        Err(e) => {
            warn!(error = %e, "Failed to load pattern");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load pattern")
        }
    }
}

/// Retire a pattern from the trending views. Patterns are deactivated,
/// never deleted.
pub async fn api_deactivate_pattern(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let uuid = match Uuid::parse_str(&id) {
        Ok(u) => u,
        Err(_) => return error_json(StatusCode::BAD_REQUEST, "Invalid pattern id"),
    };

    match state.patterns.deactivate(uuid).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to deactivate pattern");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Failed to deactivate pattern")
        }
    }
}

pub async fn api_patterns_by_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(params): Query<LimitQuery>,
) -> impl IntoResponse {
    let Some(category) = ScamCategory::parse(&category) else {
        return error_json(StatusCode::BAD_REQUEST, "Unknown category");
    };
    let limit = params.limit.unwrap_or(20).min(100);

    match state.patterns.by_category(category, limit as u32).await {
        Ok(patterns) => {
            let mut views = Vec::with_capacity(patterns.len());
            for pattern in &patterns {
                views.push(pattern_with_incidents(&state, pattern).await);
            }
            Json(serde_json::json!({ "patterns": views })).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to load patterns by category");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load patterns")
        }
    }
}

pub async fn api_hotspots(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(20).min(100);
    match load_active_patterns(&state).await {
        Ok(patterns) => {
            Json(serde_json::json!({ "hotspots": insights::hotspots(&patterns, limit) }))
                .into_response()
        }
        Err(resp) => resp,
    }
}

pub async fn api_category_distribution(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match load_active_patterns(&state).await {
        Ok(patterns) => Json(
            serde_json::json!({ "categories": insights::category_distribution(&patterns) }),
        )
        .into_response(),
        Err(resp) => resp,
    }
}

pub async fn api_severity_distribution(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match load_active_patterns(&state).await {
        Ok(patterns) => Json(
            serde_json::json!({ "severities": insights::severity_distribution(&patterns) }),
        )
        .into_response(),
        Err(resp) => resp,
    }
}

pub async fn api_time_patterns(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match load_active_patterns(&state).await {
        Ok(patterns) => {
            Json(serde_json::json!({ "hours": insights::hour_distribution(&patterns) }))
                .into_response()
        }
        Err(resp) => resp,
    }
}
