mod clients;
mod employees;
mod expenses;
mod revenue;
mod suppliers;
mod vehicles;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, put},
};

use crate::server::AppState;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Client routes
        .route("/clients", get(clients::list_clients).post(clients::create_client))
        .route("/clients/{id}", delete(clients::delete_client))
        // Employee routes
        .route(
            "/employees",
            get(employees::list_employees).post(employees::create_employee),
        )
        .route(
            "/employees/{id}",
            put(employees::update_employee).delete(employees::delete_employee),
        )
        // Revenue routes
        .route("/revenue", get(revenue::list_revenue).post(revenue::create_revenue))
        .route("/revenue/{id}", delete(revenue::delete_revenue))
        // Expense type routes
        .route(
            "/expenses/types",
            get(expenses::list_expense_types).post(expenses::create_expense_type),
        )
        .route("/expenses/types/{id}", delete(expenses::delete_expense_type))
        // Expense routes
        .route(
            "/expenses",
            get(expenses::list_expenses).post(expenses::create_expense),
        )
        .route("/expenses/{id}", delete(expenses::delete_expense))
        // Supplier routes
        .route(
            "/suppliers",
            get(suppliers::list_suppliers).post(suppliers::create_supplier),
        )
        .route("/suppliers/{id}", delete(suppliers::delete_supplier))
        // Vehicle routes
        .route(
            "/vehicles",
            get(vehicles::list_vehicles).post(vehicles::create_vehicle),
        )
        .route("/vehicles/{id}", delete(vehicles::delete_vehicle))
}
