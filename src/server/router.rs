use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get};
use chrono::Utc;

use super::api::api_router;
use super::dto::{HealthResponse, SchemaStatus};
use super::response::ApiResponse;
use crate::schema::ReconciliationReport;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Result of the reconciliation that gated startup.
    pub schema: SchemaStatus,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, report: &ReconciliationReport) -> Self {
        Self {
            store,
            schema: SchemaStatus::from(report),
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn api_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "ok",
        schema: state.schema.clone(),
        timestamp: Utc::now(),
    }))
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/health", get(api_health))
        .nest("/api", api_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
