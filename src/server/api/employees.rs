use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::server::AppState;
use crate::server::dto::EmployeeRequest;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt, deleted};
use crate::server::validation::{date, optional, required, required_amount};
use crate::types::EmployeeFields;

fn employee_fields(req: EmployeeRequest) -> Result<EmployeeFields, ApiError> {
    Ok(EmployeeFields {
        name: required(req.name, "name")?,
        department: required(req.department, "department")?,
        salary: required_amount(req.salary, "salary")?,
        hire_date: date(req.hire_date.as_deref(), "hire_date")?,
        job_title: optional(req.job_title),
        phone: optional(req.phone),
        social_number: optional(req.social_number),
        status: optional(req.status),
        notes: optional(req.notes),
    })
}

pub async fn list_employees(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let employees = state
        .store
        .list_employees()
        .api_err("Failed to list employees")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(employees)))
}

pub async fn create_employee(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EmployeeRequest>,
) -> impl IntoResponse {
    let fields = employee_fields(req)?;

    let employee = state
        .store
        .create_employee(&fields)
        .api_err("Failed to create employee")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(employee))))
}

pub async fn update_employee(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<EmployeeRequest>,
) -> impl IntoResponse {
    let fields = employee_fields(req)?;

    let employee = state
        .store
        .update_employee(id, &fields)
        .api_err("Failed to update employee")?
        .or_not_found("Employee not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(employee)))
}

pub async fn delete_employee(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let found = state
        .store
        .delete_employee(id)
        .api_err("Failed to delete employee")?;

    deleted(found, "Employee not found")
}
