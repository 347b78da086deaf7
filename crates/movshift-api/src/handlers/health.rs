use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use movshift_storage::LocalStore;
use std::sync::Arc;

/// Liveness probe
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive"
        })),
    )
}

/// Readiness probe - both store directories exist or can be created
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut response = serde_json::json!({
        "status": "ready",
        "staging": "unknown",
        "output": "unknown"
    });

    let mut overall_ready = true;

    for (key, store) in [("staging", &state.staging), ("output", &state.output)] {
        match check_store(store).await {
            Ok(()) => {
                response[key] = serde_json::json!("ready");
            }
            Err(e) => {
                tracing::error!(error = %e, store = key, "Store readiness check failed");
                response[key] = serde_json::json!(format!("not_ready: {}", e));
                overall_ready = false;
            }
        }
    }

    let status_code = if overall_ready {
        StatusCode::OK
    } else {
        response["status"] = serde_json::json!("not_ready");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

async fn check_store(store: &LocalStore) -> Result<(), movshift_storage::StorageError> {
    store.ensure_root().await
}
