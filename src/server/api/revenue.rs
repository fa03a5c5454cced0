use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::server::AppState;
use crate::server::dto::CreateRevenueRequest;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt, deleted};
use crate::server::validation::{date, optional, payment_method, required_amount};
use crate::types::NewRevenue;

pub async fn list_revenue(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let revenue = state.store.list_revenue().api_err("Failed to list revenue")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(revenue)))
}

pub async fn create_revenue(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRevenueRequest>,
) -> impl IntoResponse {
    let revenue = NewRevenue {
        amount: required_amount(req.amount, "amount")?,
        date: date(req.date.as_deref(), "date")?.unwrap_or_else(|| Utc::now().date_naive()),
        payment_method: payment_method(req.payment_method.as_deref())?,
        source: optional(req.source),
        revenue_type: optional(req.revenue_type),
        client_id: req.client_id,
        client_name: optional(req.client_name),
        vehicle_id: req.vehicle_id,
        vehicle_number: optional(req.vehicle_number),
        description: optional(req.description),
        notes: optional(req.notes),
    };

    let created = state
        .store
        .create_revenue(&revenue)
        .api_err("Failed to create revenue")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn delete_revenue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let found = state
        .store
        .delete_revenue(id)
        .api_err("Failed to delete revenue")?;

    deleted(found, "Revenue entry not found")
}
