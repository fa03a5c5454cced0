use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, ffi, params};
use tracing::debug;

use super::Store;
use super::schema::business_schema;
use crate::error::{Error, Result};
use crate::schema::{ReconciliationPlan, ReconciliationReport, Reconciler, SchemaDescriptor};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file. `busy_timeout` bounds how long
    /// a statement waits on a lock held by another connection.
    pub fn new<P: AsRef<Path>>(db_path: P, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }

    /// Brings the database up to `descriptor`, holding the connection for
    /// the whole run.
    pub fn reconcile(
        &self,
        reconciler: &Reconciler,
        descriptor: &SchemaDescriptor,
    ) -> Result<ReconciliationReport> {
        let mut conn = self.conn();
        reconciler.reconcile(descriptor, &mut conn)
    }

    pub fn plan(
        &self,
        reconciler: &Reconciler,
        descriptor: &SchemaDescriptor,
    ) -> Result<ReconciliationPlan> {
        reconciler.plan(descriptor, &self.conn())
    }

    /// Reconciles against the built-in business schema with default settings.
    pub fn initialize(&self) -> Result<ReconciliationReport> {
        self.reconcile(&Reconciler::new(), &business_schema())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Legacy rows sometimes carry a time after the date; only the date counts.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let date = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn required_date(s: &str) -> NaiveDate {
    parse_date(s).unwrap_or_else(|| {
        tracing::error!("Invalid date in database: '{}'", s);
        Utc::now().date_naive()
    })
}

fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn opt_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row.get::<_, Option<String>>(idx)?.as_deref().map(parse_datetime))
}

fn opt_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    Ok(row.get::<_, Option<String>>(idx)?.as_deref().and_then(parse_date))
}

fn status(row: &Row<'_>, idx: usize, default: &str) -> rusqlite::Result<String> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .unwrap_or_else(|| default.to_string()))
}

/// The typed method, or the raw text when no known label matches.
fn payment_method(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<(Option<PaymentMethod>, Option<String>)> {
    let Some(stored) = row.get::<_, Option<String>>(idx)? else {
        return Ok((None, None));
    };
    match PaymentMethod::from_stored(&stored) {
        Some(method) => Ok((Some(method), None)),
        None => {
            debug!(value = %stored, "Unrecognised stored payment method");
            Ok((None, Some(stored)))
        }
    }
}

/// Maps constraint failures on writes to errors the API can report.
fn write_error(err: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            let message = message.clone().unwrap_or_else(|| failure.to_string());
            return match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE
                | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                | ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Error::Conflict(message),
                _ => Error::BadRequest(message),
            };
        }
    }
    Error::Database(err)
}

const CLIENT_COLUMNS: &str =
    "id, name, phone, area, email, address, type, source, notes, status, created_at";

fn client_from_row(row: &Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        area: row.get(3)?,
        email: row.get(4)?,
        address: row.get(5)?,
        client_type: row.get(6)?,
        source: row.get(7)?,
        notes: row.get(8)?,
        status: status(row, 9, "active")?,
        created_at: opt_datetime(row, 10)?,
    })
}

const EMPLOYEE_COLUMNS: &str = "id, name, job_title, department, salary, phone, social_number, \
     hire_date, status, notes, created_at, updated_at";

fn employee_from_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        name: row.get(1)?,
        job_title: row.get(2)?,
        department: row.get(3)?,
        salary: row.get(4)?,
        phone: row.get(5)?,
        social_number: row.get(6)?,
        hire_date: opt_date(row, 7)?,
        status: status(row, 8, "active")?,
        notes: row.get(9)?,
        created_at: opt_datetime(row, 10)?,
        updated_at: opt_datetime(row, 11)?,
    })
}

const REVENUE_COLUMNS: &str = "id, date, amount, payment_method, source, type, client_id, \
     client_name, vehicle_id, vehicle_number, description, notes, status, created_at";

fn revenue_from_row(row: &Row<'_>) -> rusqlite::Result<Revenue> {
    let (payment_method, payment_method_raw) = payment_method(row, 3)?;
    Ok(Revenue {
        id: row.get(0)?,
        date: required_date(&row.get::<_, String>(1)?),
        amount: row.get(2)?,
        payment_method,
        payment_method_raw,
        source: row.get(4)?,
        revenue_type: row.get(5)?,
        client_id: row.get(6)?,
        client_name: row.get(7)?,
        vehicle_id: row.get(8)?,
        vehicle_number: row.get(9)?,
        description: row.get(10)?,
        notes: row.get(11)?,
        status: status(row, 12, "completed")?,
        created_at: opt_datetime(row, 13)?,
    })
}

const EXPENSE_SELECT: &str = "SELECT e.id, e.date, e.amount, e.type_id, t.name, e.beneficiary, \
     e.payment_method, e.description, e.notes, e.status, e.created_at
     FROM expenses e LEFT JOIN expense_types t ON t.id = e.type_id";

fn expense_from_row(row: &Row<'_>) -> rusqlite::Result<Expense> {
    let (payment_method, payment_method_raw) = payment_method(row, 6)?;
    Ok(Expense {
        id: row.get(0)?,
        date: required_date(&row.get::<_, String>(1)?),
        amount: row.get(2)?,
        type_id: row.get(3)?,
        type_name: row.get(4)?,
        beneficiary: row.get(5)?,
        payment_method,
        payment_method_raw,
        description: row.get(7)?,
        notes: row.get(8)?,
        status: status(row, 9, "paid")?,
        created_at: opt_datetime(row, 10)?,
    })
}

const SUPPLIER_COLUMNS: &str = "id, name, source_type, area, phone, price_per_meter, \
     price_per_tank, capacity, notes, status, created_at";

fn supplier_from_row(row: &Row<'_>) -> rusqlite::Result<Supplier> {
    Ok(Supplier {
        id: row.get(0)?,
        name: row.get(1)?,
        source_type: row.get(2)?,
        area: row.get(3)?,
        phone: row.get(4)?,
        price_per_meter: row.get(5)?,
        price_per_tank: row.get(6)?,
        capacity: row.get(7)?,
        notes: row.get(8)?,
        status: status(row, 9, "active")?,
        created_at: opt_datetime(row, 10)?,
    })
}

const VEHICLE_COLUMNS: &str = "id, number, driver_name, current_location, capacity, model, \
     status, last_maintenance, notes, created_at";

fn vehicle_from_row(row: &Row<'_>) -> rusqlite::Result<Vehicle> {
    Ok(Vehicle {
        id: row.get(0)?,
        number: row.get(1)?,
        driver_name: row.get(2)?,
        current_location: row.get(3)?,
        capacity: row.get(4)?,
        model: row.get(5)?,
        status: status(row, 6, "active")?,
        last_maintenance: opt_date(row, 7)?,
        notes: row.get(8)?,
        created_at: opt_datetime(row, 9)?,
    })
}

impl SqliteStore {
    fn query_all<T, F>(&self, sql: &str, f: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], f)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn query_by_id<T, F>(conn: &Connection, sql: &str, id: i64, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        conn.query_row(sql, params![id], f)
            .optional()
            .map_err(Error::from)
    }

    fn delete_by_id(&self, table: &str, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])
            .map_err(write_error)?;
        Ok(rows > 0)
    }
}

impl Store for SqliteStore {
    // Client operations

    fn list_clients(&self) -> Result<Vec<Client>> {
        self.query_all(
            &format!("SELECT {CLIENT_COLUMNS} FROM clients ORDER BY id DESC"),
            client_from_row,
        )
    }

    fn create_client(&self, client: &NewClient) -> Result<Client> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO clients (name, phone, area, email, address, type, source, notes, status)
             VALUES (?1, ?2, ?3, ?4, ?5, COALESCE(?6, 'regular'), COALESCE(?7, 'reference'), ?8, ?9)",
            params![
                client.name,
                client.phone,
                client.area,
                client.email,
                client.address,
                client.client_type,
                client.source,
                client.notes,
                client.status.as_deref().unwrap_or("active"),
            ],
        )
        .map_err(write_error)?;
        Self::query_by_id(
            &conn,
            &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"),
            conn.last_insert_rowid(),
            client_from_row,
        )?
        .ok_or(Error::NotFound)
    }

    fn delete_client(&self, id: i64) -> Result<bool> {
        self.delete_by_id("clients", id)
    }

    // Employee operations

    fn list_employees(&self) -> Result<Vec<Employee>> {
        self.query_all(
            &format!("SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY created_at DESC, id DESC"),
            employee_from_row,
        )
    }

    fn get_employee(&self, id: i64) -> Result<Option<Employee>> {
        let conn = self.conn();
        Self::query_by_id(
            &conn,
            &format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?1"),
            id,
            employee_from_row,
        )
    }

    fn create_employee(&self, employee: &EmployeeFields) -> Result<Employee> {
        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO employees
                 (name, job_title, department, salary, phone, social_number, hire_date, status, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    employee.name,
                    employee.job_title,
                    employee.department,
                    employee.salary,
                    employee.phone,
                    employee.social_number,
                    employee.hire_date.as_ref().map(format_date),
                    employee.status.as_deref().unwrap_or("active"),
                    employee.notes,
                ],
            )
            .map_err(write_error)?;
            conn.last_insert_rowid()
        };
        self.get_employee(id)?.ok_or(Error::NotFound)
    }

    fn update_employee(&self, id: i64, employee: &EmployeeFields) -> Result<Option<Employee>> {
        let rows = self
            .conn()
            .execute(
                "UPDATE employees
                 SET name = ?1, job_title = ?2, department = ?3, salary = ?4, phone = ?5,
                     social_number = ?6, hire_date = ?7, status = COALESCE(?8, status),
                     notes = ?9, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?10",
                params![
                    employee.name,
                    employee.job_title,
                    employee.department,
                    employee.salary,
                    employee.phone,
                    employee.social_number,
                    employee.hire_date.as_ref().map(format_date),
                    employee.status,
                    employee.notes,
                    id,
                ],
            )
            .map_err(write_error)?;
        if rows == 0 {
            return Ok(None);
        }
        self.get_employee(id)
    }

    fn delete_employee(&self, id: i64) -> Result<bool> {
        self.delete_by_id("employees", id)
    }

    // Revenue operations

    fn list_revenue(&self) -> Result<Vec<Revenue>> {
        self.query_all(
            &format!("SELECT {REVENUE_COLUMNS} FROM revenue ORDER BY date DESC, id DESC"),
            revenue_from_row,
        )
    }

    fn create_revenue(&self, revenue: &NewRevenue) -> Result<Revenue> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO revenue
             (date, amount, payment_method, source, type, client_id, client_name,
              vehicle_id, vehicle_number, description, notes, status)
             VALUES (?1, ?2, ?3, COALESCE(?4, 'system'), COALESCE(?5, 'water_sale'),
                     ?6, ?7, ?8, ?9, ?10, ?11, 'completed')",
            params![
                format_date(&revenue.date),
                revenue.amount,
                revenue.payment_method.as_str(),
                revenue.source,
                revenue.revenue_type,
                revenue.client_id,
                revenue.client_name,
                revenue.vehicle_id,
                revenue.vehicle_number,
                revenue.description,
                revenue.notes,
            ],
        )
        .map_err(write_error)?;
        Self::query_by_id(
            &conn,
            &format!("SELECT {REVENUE_COLUMNS} FROM revenue WHERE id = ?1"),
            conn.last_insert_rowid(),
            revenue_from_row,
        )?
        .ok_or(Error::NotFound)
    }

    fn delete_revenue(&self, id: i64) -> Result<bool> {
        self.delete_by_id("revenue", id)
    }

    // Expense operations

    fn list_expenses(&self) -> Result<Vec<Expense>> {
        self.query_all(
            &format!("{EXPENSE_SELECT} ORDER BY e.date DESC, e.id DESC"),
            expense_from_row,
        )
    }

    fn create_expense(&self, expense: &NewExpense) -> Result<Expense> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO expenses
             (date, amount, type_id, beneficiary, payment_method, description, notes, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'paid')",
            params![
                format_date(&expense.date),
                expense.amount,
                expense.type_id,
                expense.beneficiary,
                expense.payment_method.as_str(),
                expense.description,
                expense.notes,
            ],
        )
        .map_err(write_error)?;
        Self::query_by_id(
            &conn,
            &format!("{EXPENSE_SELECT} WHERE e.id = ?1"),
            conn.last_insert_rowid(),
            expense_from_row,
        )?
        .ok_or(Error::NotFound)
    }

    fn delete_expense(&self, id: i64) -> Result<bool> {
        self.delete_by_id("expenses", id)
    }

    // Expense type operations

    fn list_expense_types(&self) -> Result<Vec<ExpenseType>> {
        self.query_all("SELECT id, name FROM expense_types ORDER BY name ASC", |row| {
            Ok(ExpenseType {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
    }

    fn upsert_expense_type(&self, name: &str) -> Result<ExpenseType> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO expense_types (name) VALUES (?1)",
            params![name],
        )
        .map_err(write_error)?;
        conn.query_row(
            "SELECT id, name FROM expense_types WHERE name = ?1",
            params![name],
            |row| {
                Ok(ExpenseType {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .map_err(Error::from)
    }

    fn delete_expense_type(&self, id: i64) -> Result<bool> {
        self.delete_by_id("expense_types", id)
    }

    // Supplier operations

    fn list_suppliers(&self) -> Result<Vec<Supplier>> {
        self.query_all(
            &format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers ORDER BY id DESC"),
            supplier_from_row,
        )
    }

    fn create_supplier(&self, supplier: &NewSupplier) -> Result<Supplier> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO suppliers
             (name, source_type, area, phone, price_per_meter, price_per_tank, capacity, notes, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                supplier.name,
                supplier.source_type,
                supplier.area,
                supplier.phone,
                supplier.price_per_meter,
                supplier.price_per_tank,
                supplier.capacity,
                supplier.notes,
                supplier.status.as_deref().unwrap_or("active"),
            ],
        )
        .map_err(write_error)?;
        Self::query_by_id(
            &conn,
            &format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = ?1"),
            conn.last_insert_rowid(),
            supplier_from_row,
        )?
        .ok_or(Error::NotFound)
    }

    fn delete_supplier(&self, id: i64) -> Result<bool> {
        self.delete_by_id("suppliers", id)
    }

    // Vehicle operations

    fn list_vehicles(&self) -> Result<Vec<Vehicle>> {
        self.query_all(
            &format!("SELECT {VEHICLE_COLUMNS} FROM vehicles ORDER BY id DESC"),
            vehicle_from_row,
        )
    }

    fn create_vehicle(&self, vehicle: &NewVehicle) -> Result<Vehicle> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO vehicles
             (number, driver_name, current_location, capacity, model, status, last_maintenance, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                vehicle.number,
                vehicle.driver_name,
                vehicle.current_location,
                vehicle.capacity,
                vehicle.model,
                vehicle.status.as_deref().unwrap_or("active"),
                vehicle.last_maintenance.as_ref().map(format_date),
                vehicle.notes,
            ],
        )
        .map_err(write_error)?;
        Self::query_by_id(
            &conn,
            &format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?1"),
            conn.last_insert_rowid(),
            vehicle_from_row,
        )?
        .ok_or(Error::NotFound)
    }

    fn delete_vehicle(&self, id: i64) -> Result<bool> {
        self.delete_by_id("vehicles", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RunStatus;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> SqliteStore {
        let store =
            SqliteStore::new(temp.path().join("test.db"), Duration::from_secs(5)).unwrap();
        let report = store.initialize().unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        store
    }

    fn client(phone: &str) -> NewClient {
        NewClient {
            name: "Mahmoud".to_string(),
            phone: phone.to_string(),
            area: "Zarqa".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "clients",
            "employees",
            "vehicles",
            "suppliers",
            "expense_types",
            "revenue",
            "expenses",
            "_schema_reconciliations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_duplicate_phone_is_conflict() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let created = store.create_client(&client("0798123456")).unwrap();
        assert_eq!(created.status, "active");
        assert_eq!(created.client_type.as_deref(), Some("regular"));
        assert!(created.created_at.is_some());

        let err = store.create_client(&client("0798123456")).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(store.list_clients().unwrap().len(), 1);
    }

    #[test]
    fn test_update_missing_employee_returns_none() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let fields = EmployeeFields {
            name: "Ahmad".to_string(),
            department: "drivers".to_string(),
            salary: 700.0,
            ..Default::default()
        };
        assert!(store.update_employee(42, &fields).unwrap().is_none());

        let created = store.create_employee(&fields).unwrap();
        let updated = store
            .update_employee(
                created.id,
                &EmployeeFields {
                    salary: 750.0,
                    ..fields.clone()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.salary, 750.0);
        assert_eq!(updated.status, "active");
    }

    #[test]
    fn test_expenses_join_type_name() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let fuel = store.upsert_expense_type("fuel").unwrap();
        assert_eq!(store.upsert_expense_type("fuel").unwrap(), fuel);

        let expense = store
            .create_expense(&NewExpense {
                date: NaiveDate::from_ymd_opt(2025, 10, 15).unwrap(),
                amount: 850.0,
                type_id: fuel.id,
                payment_method: PaymentMethod::Visa,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(expense.type_name.as_deref(), Some("fuel"));
        assert_eq!(expense.payment_method, Some(PaymentMethod::Visa));

        let err = store.delete_expense_type(fuel.id).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(store.delete_expense(expense.id).unwrap());
        assert!(store.delete_expense_type(fuel.id).unwrap());
    }

    #[test]
    fn test_legacy_payment_labels_are_read() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store
            .connection()
            .execute(
                "INSERT INTO revenue (date, amount, payment_method) VALUES ('2025-10-15 08:00:00', 350, 'كاش')",
                [],
            )
            .unwrap();

        let revenue = store.list_revenue().unwrap();
        assert_eq!(revenue.len(), 1);
        assert_eq!(revenue[0].payment_method, Some(PaymentMethod::Cash));
        assert_eq!(revenue[0].date, NaiveDate::from_ymd_opt(2025, 10, 15).unwrap());
        assert_eq!(revenue[0].status, "completed");
        assert_eq!(revenue[0].payment_method_raw, None);
    }

    #[test]
    fn test_legacy_free_text_payment_is_passed_through() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store
            .connection()
            .execute(
                "INSERT INTO revenue (date, amount, payment_method) VALUES ('2025-10-16', 90, 'شيك')",
                [],
            )
            .unwrap();

        let revenue = store.list_revenue().unwrap();
        assert_eq!(revenue[0].payment_method, None);
        assert_eq!(revenue[0].payment_method_raw.as_deref(), Some("شيك"));

        let json = serde_json::to_value(&revenue[0]).unwrap();
        assert_eq!(json["payment_method_raw"], "شيك");
        assert!(json.get("payment_method").is_none());
    }
}
