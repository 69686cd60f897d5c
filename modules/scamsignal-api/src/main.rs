use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use scamsignal_classifier::ScriptClassifier;
use scamsignal_common::Config;
use scamsignal_engine::Aggregator;
use scamsignal_store::{IncidentRepo, PatternRepo};

mod rest;

pub struct AppState {
    pub incidents: IncidentRepo,
    pub patterns: PatternRepo,
    pub aggregator: Aggregator,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("scamsignal=info".parse()?))
        .init();

    let config = Config::from_env();

    let pool = scamsignal_store::connect(&config.database_url).await?;
    let incidents = IncidentRepo::new(pool.clone());
    let patterns = PatternRepo::new(pool);

    let classifier = ScriptClassifier::new(&config.classifier_bin, &config.classifier_script)
        .with_timeout(Duration::from_secs(config.classifier_timeout_secs));

    let aggregator = Aggregator::new(
        Arc::new(incidents.clone()),
        Arc::new(patterns.clone()),
        Arc::new(classifier),
    );

    let state = Arc::new(AppState {
        incidents,
        patterns,
        aggregator,
    });

    let app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Reporting
        .route("/api/incidents", post(rest::submit::api_submit_incident))
        .route("/api/incidents/{id}", get(rest::api_incident_detail))
        .route(
            "/api/incidents/{id}/status",
            axum::routing::patch(rest::api_set_incident_status),
        )
        // Aggregation runs
        .route("/api/analysis/run", post(rest::api_analysis_run))
        .route("/api/analysis/status", get(rest::api_analysis_status))
        // Trending read side
        .route("/api/trending/patterns", get(rest::api_trending_patterns))
        .route(
            "/api/trending/patterns/{id}",
            get(rest::api_pattern_detail).delete(rest::api_deactivate_pattern),
        )
        .route(
            "/api/trending/patterns/category/{category}",
            get(rest::api_patterns_by_category),
        )
        .route("/api/trending/hotspots", get(rest::api_hotspots))
        .route("/api/trending/categories", get(rest::api_category_distribution))
        .route("/api/trending/severities", get(rest::api_severity_distribution))
        .route("/api/trending/time-patterns", get(rest::api_time_patterns))
        .with_state(state)
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Logging layer: method + path + status + latency only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("ScamSignal API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
