use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::server::AppState;
use crate::server::dto::CreateClientRequest;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt, deleted};
use crate::server::validation::{optional, required};
use crate::types::NewClient;

pub async fn list_clients(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let clients = state.store.list_clients().api_err("Failed to list clients")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(clients)))
}

pub async fn create_client(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateClientRequest>,
) -> impl IntoResponse {
    let client = NewClient {
        name: required(req.name, "name")?,
        phone: required(req.phone, "phone")?,
        area: required(req.area, "area")?,
        email: optional(req.email),
        address: optional(req.address),
        client_type: optional(req.client_type),
        source: optional(req.source),
        notes: optional(req.notes),
        status: optional(req.status),
    };

    let created = state
        .store
        .create_client(&client)
        .api_err("Failed to create client")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn delete_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let found = state
        .store
        .delete_client(id)
        .api_err("Failed to delete client")?;

    deleted(found, "Client not found")
}
