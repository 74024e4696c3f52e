use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{error, info};

use crate::api::types::{internal_error, ApiError};
use crate::state::AppState;

/// `GET /health`
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "up",
        "version": state.config.version,
    }))
}

/// `POST /event` and `POST /static-event` — fire-and-acknowledge webhook
/// that runs the configured shell script. The body is logged, never
/// interpreted.
pub async fn event_handler(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    info!(payload = %body, script = %state.config.event_script, "webhook event received");

    let output = Command::new("/bin/bash")
        .arg(&state.config.event_script)
        .output()
        .await
        .map_err(|err| {
            error!(error = %err, "failed to launch event script");
            internal_error("failed to execute script", json!(err.to_string()))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        error!(status = ?output.status.code(), stderr = %stderr, "event script failed");
        return Err(internal_error("failed to execute script", json!(stderr)));
    }

    info!(stdout = %String::from_utf8_lossy(&output.stdout), "event script finished");
    Ok(Json(json!({ "status": "event received and script executed" })))
}

/// `GET /` — 302 redirect to the front-end when one is configured.
pub async fn root_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.config.frontend_url {
        Some(url) => (
            StatusCode::FOUND,
            [(header::LOCATION, url.clone())],
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "NOT_FOUND" })),
        )
            .into_response(),
    }
}
