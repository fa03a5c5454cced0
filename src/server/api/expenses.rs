use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::server::AppState;
use crate::server::dto::{CreateExpenseRequest, CreateExpenseTypeRequest};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt, deleted};
use crate::server::validation::{date, optional, payment_method, required, required_amount};
use crate::types::NewExpense;

pub async fn list_expenses(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let expenses = state
        .store
        .list_expenses()
        .api_err("Failed to list expenses")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(expenses)))
}

pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateExpenseRequest>,
) -> impl IntoResponse {
    let expense = NewExpense {
        amount: required_amount(req.amount, "amount")?,
        type_id: req
            .type_id
            .ok_or_else(|| ApiError::bad_request("type_id is required"))?,
        date: date(req.date.as_deref(), "date")?.unwrap_or_else(|| Utc::now().date_naive()),
        payment_method: payment_method(req.payment_method.as_deref())?,
        beneficiary: optional(req.beneficiary),
        description: optional(req.description),
        notes: optional(req.notes),
    };

    let created = state
        .store
        .create_expense(&expense)
        .api_err("Failed to create expense")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let found = state
        .store
        .delete_expense(id)
        .api_err("Failed to delete expense")?;

    deleted(found, "Expense not found")
}

pub async fn list_expense_types(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let types = state
        .store
        .list_expense_types()
        .api_err("Failed to list expense types")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(types)))
}

/// Returns the existing type when the name is already taken.
pub async fn create_expense_type(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateExpenseTypeRequest>,
) -> impl IntoResponse {
    let name = required(req.name, "name")?;

    let expense_type = state
        .store
        .upsert_expense_type(&name)
        .api_err("Failed to save expense type")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(expense_type))))
}

pub async fn delete_expense_type(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let found = state
        .store
        .delete_expense_type(id)
        .api_err("Failed to delete expense type")?;

    deleted(found, "Expense type not found")
}
