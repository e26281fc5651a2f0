use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "Grapi",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "graphql": "/graphql",
    });
    (StatusCode::OK, Json(body))
}

// Liveness only; the upstream is not contacted
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}
