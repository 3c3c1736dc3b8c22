// handlers/public/mod.rs - Public handlers (no authentication required)

use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::entities;
use crate::state::AppState;

/// GET / - service information
pub async fn root() -> Json<Value> {
    let resources: Vec<String> = entities::ALL
        .iter()
        .map(|e| format!("/api/v1/{}", e.resource))
        .collect();

    Json(json!({
        "message": "madrasa-api",
        "data": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "endpoints": {
                "health": "/health (public)",
                "whoami": "/api/v1/auth/whoami (token)",
                "resources": resources,
                "tenant_scoped": "/api/v1/tenants/:tenant_id/<resource> (token)",
            }
        }
    }))
}

/// GET /health - storage ping
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "message": "ok",
                "data": {"status": "ok", "timestamp": now, "database": "ok"}
            })),
        ),
        Err(e) => {
            tracing::error!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {"status": "degraded", "timestamp": now}
                })),
            )
        }
    }
}
