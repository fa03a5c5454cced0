pub mod schema;
mod sqlite;

pub use schema::business_schema;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface used by the HTTP handlers.
///
/// Implementations may assume the schema has been reconciled against
/// [`business_schema`] before any of these methods are called.
pub trait Store: Send + Sync {
    // Client operations
    fn list_clients(&self) -> Result<Vec<Client>>;
    fn create_client(&self, client: &NewClient) -> Result<Client>;
    fn delete_client(&self, id: i64) -> Result<bool>;

    // Employee operations
    fn list_employees(&self) -> Result<Vec<Employee>>;
    fn get_employee(&self, id: i64) -> Result<Option<Employee>>;
    fn create_employee(&self, employee: &EmployeeFields) -> Result<Employee>;
    fn update_employee(&self, id: i64, employee: &EmployeeFields) -> Result<Option<Employee>>;
    fn delete_employee(&self, id: i64) -> Result<bool>;

    // Revenue operations
    fn list_revenue(&self) -> Result<Vec<Revenue>>;
    fn create_revenue(&self, revenue: &NewRevenue) -> Result<Revenue>;
    fn delete_revenue(&self, id: i64) -> Result<bool>;

    // Expense operations
    fn list_expenses(&self) -> Result<Vec<Expense>>;
    fn create_expense(&self, expense: &NewExpense) -> Result<Expense>;
    fn delete_expense(&self, id: i64) -> Result<bool>;

    // Expense type operations
    fn list_expense_types(&self) -> Result<Vec<ExpenseType>>;
    fn upsert_expense_type(&self, name: &str) -> Result<ExpenseType>;
    fn delete_expense_type(&self, id: i64) -> Result<bool>;

    // Supplier operations
    fn list_suppliers(&self) -> Result<Vec<Supplier>>;
    fn create_supplier(&self, supplier: &NewSupplier) -> Result<Supplier>;
    fn delete_supplier(&self, id: i64) -> Result<bool>;

    // Vehicle operations
    fn list_vehicles(&self) -> Result<Vec<Vehicle>>;
    fn create_vehicle(&self, vehicle: &NewVehicle) -> Result<Vehicle>;
    fn delete_vehicle(&self, id: i64) -> Result<bool>;
}
