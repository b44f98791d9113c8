use crate::AppState;
use axum::{extract::State, response::Json};
use serde_json::{json, Value};

pub async fn health_check(State(app_state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "ready": app_state.readiness.is_ready(),
        "application_id": app_state.lifecycle.application_id(),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().timestamp()
    }))
}
