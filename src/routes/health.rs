use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

const DB_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/live", get(live))
        .route("/info", get(info))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    #[serde(rename = "databaseLatencyMs", skip_serializing_if = "Option::is_none")]
    database_latency_ms: Option<u64>,
    timestamp: String,
}

#[derive(Serialize)]
struct LivenessResponse {
    status: &'static str,
    timestamp: String,
    uptime: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthInfoResponse {
    service: &'static str,
    version: &'static str,
    uptime: u64,
    tts_provider: &'static str,
    tts_available: bool,
}

enum DbCheckStatus {
    Connected { latency_ms: u64 },
    Timeout,
    Disconnected,
}

async fn root(State(state): State<AppState>) -> Response {
    let (status_code, response) = match database_check(&state).await {
        DbCheckStatus::Connected { latency_ms } => (
            StatusCode::OK,
            HealthResponse {
                status: "ok",
                database: "connected",
                database_latency_ms: Some(latency_ms),
                timestamp: now_iso(),
            },
        ),
        DbCheckStatus::Timeout => (
            StatusCode::SERVICE_UNAVAILABLE,
            HealthResponse {
                status: "degraded",
                database: "timeout",
                database_latency_ms: None,
                timestamp: now_iso(),
            },
        ),
        DbCheckStatus::Disconnected => (
            StatusCode::SERVICE_UNAVAILABLE,
            HealthResponse {
                status: "degraded",
                database: "disconnected",
                database_latency_ms: None,
                timestamp: now_iso(),
            },
        ),
    };

    (status_code, Json(response)).into_response()
}

async fn live(State(state): State<AppState>) -> Response {
    Json(LivenessResponse {
        status: "healthy",
        timestamp: now_iso(),
        uptime: state.uptime_secs(),
    })
    .into_response()
}

async fn info(State(state): State<AppState>) -> Response {
    let tts = state.tts();
    Json(HealthInfoResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.uptime_secs(),
        tts_provider: tts.config().provider.as_str(),
        tts_available: tts.is_available(),
    })
    .into_response()
}

async fn database_check(state: &AppState) -> DbCheckStatus {
    let started = Instant::now();
    match tokio::time::timeout(DB_CHECK_TIMEOUT, state.db().ping()).await {
        Ok(Ok(())) => DbCheckStatus::Connected {
            latency_ms: started.elapsed().as_millis() as u64,
        },
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "database health check failed");
            DbCheckStatus::Disconnected
        }
        Err(_) => DbCheckStatus::Timeout,
    }
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
