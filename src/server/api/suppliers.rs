use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::server::AppState;
use crate::server::dto::CreateSupplierRequest;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt, deleted};
use crate::server::validation::{optional, required};
use crate::types::NewSupplier;

pub async fn list_suppliers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let suppliers = state
        .store
        .list_suppliers()
        .api_err("Failed to list suppliers")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(suppliers)))
}

pub async fn create_supplier(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSupplierRequest>,
) -> impl IntoResponse {
    let supplier = NewSupplier {
        name: required(req.name, "name")?,
        source_type: required(req.source_type, "source_type")?,
        area: required(req.area, "area")?,
        phone: optional(req.phone),
        price_per_meter: req.price_per_meter,
        price_per_tank: req.price_per_tank,
        capacity: optional(req.capacity),
        notes: optional(req.notes),
        status: optional(req.status),
    };

    let created = state
        .store
        .create_supplier(&supplier)
        .api_err("Failed to create supplier")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn delete_supplier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let found = state
        .store
        .delete_supplier(id)
        .api_err("Failed to delete supplier")?;

    deleted(found, "Supplier not found")
}
