use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::server::AppState;
use crate::server::dto::CreateVehicleRequest;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt, deleted};
use crate::server::validation::{date, optional, required};
use crate::types::NewVehicle;

pub async fn list_vehicles(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let vehicles = state
        .store
        .list_vehicles()
        .api_err("Failed to list vehicles")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(vehicles)))
}

pub async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateVehicleRequest>,
) -> impl IntoResponse {
    let vehicle = NewVehicle {
        number: required(req.number, "number")?,
        driver_name: required(req.driver_name, "driver_name")?,
        last_maintenance: date(req.last_maintenance.as_deref(), "last_maintenance")?,
        current_location: optional(req.current_location),
        capacity: optional(req.capacity),
        model: optional(req.model),
        status: optional(req.status),
        notes: optional(req.notes),
    };

    let created = state
        .store
        .create_vehicle(&vehicle)
        .api_err("Failed to create vehicle")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn delete_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let found = state
        .store
        .delete_vehicle(id)
        .api_err("Failed to delete vehicle")?;

    deleted(found, "Vehicle not found")
}
