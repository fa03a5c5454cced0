//! HTTP API tests. Requests go straight to the router with
//! `tower::ServiceExt::oneshot`; no socket is bound.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::TestDb;
use waterworks::server::{AppState, create_router};
use waterworks::store::SqliteStore;

struct TestApp {
    _db: TestDb,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        Self::from_db(TestDb::new())
    }

    fn from_db(db: TestDb) -> Self {
        let store = SqliteStore::new(&db.path, Duration::from_secs(5)).expect("open store");
        let report = store.initialize().expect("reconcile schema");
        let state = Arc::new(AppState::new(Arc::new(store), &report));
        Self {
            _db: db,
            router: create_router(state),
        }
    }

    async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(body)).await
    }

    async fn delete(&self, uri: &str) -> StatusCode {
        self.request(Method::DELETE, uri, None).await.0
    }
}

#[tokio::test]
async fn test_health_reports_schema_run() {
    let app = TestApp::new();

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));

    let (status, body) = app.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["schema"]["status"], "completed");
    assert_eq!(body["data"]["schema"]["failed"], 0);
    assert!(body["data"]["schema"]["applied"].as_u64().unwrap() >= 7);
}

#[tokio::test]
async fn test_client_lifecycle() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/clients",
            json!({"name": " Abu Omar ", "phone": "0791234567", "area": "Zarqa", "type": "vip"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["name"], "Abu Omar");
    assert_eq!(body["data"]["type"], "vip");
    assert_eq!(body["data"]["status"], "active");
    assert!(body["error"].is_null());

    let (status, body) = app
        .post(
            "/api/clients",
            json!({"name": "Someone Else", "phone": "0791234567", "area": "Amman"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let (status, body) = app
        .post("/api/clients", json!({"name": "No Phone", "area": "Amman"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "phone is required");

    let (_, body) = app.get("/api/clients").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    assert_eq!(
        app.delete(&format!("/api/clients/{id}")).await,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        app.delete(&format!("/api/clients/{id}")).await,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_employee_update() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/employees",
            json!({"name": "Khaled", "department": "drivers", "salary": "450", "hire_date": "2024-03-01"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["salary"], 450.0);
    assert_eq!(body["data"]["hire_date"], "2024-03-01");

    let (status, body) = app
        .put(
            &format!("/api/employees/{id}"),
            json!({"name": "Khaled", "department": "logistics", "salary": 500, "status": "on_leave"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["department"], "logistics");
    assert_eq!(body["data"]["salary"], 500.0);
    assert_eq!(body["data"]["status"], "on_leave");

    let (status, _) = app
        .put(
            "/api/employees/9999",
            json!({"name": "Ghost", "department": "none", "salary": 1}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post(
            "/api/employees",
            json!({"name": "Bad Date", "department": "drivers", "salary": 1, "hire_date": "01/03/2024"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("hire_date"));
}

#[tokio::test]
async fn test_revenue_payment_methods() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/revenue",
            json!({"amount": "120", "payment_type": "فيزا", "date": "2025-10-15"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["payment_method"], "visa");
    assert_eq!(body["data"]["date"], "2025-10-15");
    assert_eq!(body["data"]["type"], "water_sale");

    // Date defaults to today and payment to cash.
    let (status, body) = app.post("/api/revenue", json!({"amount": 40})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["payment_method"], "cash");
    assert_eq!(
        body["data"]["date"],
        chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string()
    );

    let (status, _) = app
        .post("/api/revenue", json!({"amount": 10, "payment_method": "barter"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/api/revenue", json!({"amount": -3})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get("/api/revenue").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_revenue_client_link_is_cleared_on_delete() {
    let app = TestApp::new();

    let (_, client) = app
        .post(
            "/api/clients",
            json!({"name": "Um Ali", "phone": "0780000000", "area": "Irbid"}),
        )
        .await;
    let client_id = client["data"]["id"].as_i64().unwrap();

    let (status, revenue) = app
        .post(
            "/api/revenue",
            json!({"amount": 75, "client_id": client_id, "client_name": "Um Ali"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(revenue["data"]["client_id"], client_id);

    assert_eq!(
        app.delete(&format!("/api/clients/{client_id}")).await,
        StatusCode::NO_CONTENT
    );

    let (_, body) = app.get("/api/revenue").await;
    let entry = &body["data"][0];
    assert!(entry.get("client_id").is_none_or(Value::is_null));
    assert_eq!(entry["client_name"], "Um Ali");
}

#[tokio::test]
async fn test_expenses_and_types() {
    let app = TestApp::new();

    let (status, fuel) = app
        .post("/api/expenses/types", json!({"name": "Fuel"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let type_id = fuel["data"]["id"].as_i64().unwrap();

    // Posting the same name again returns the existing type.
    let (_, again) = app
        .post("/api/expenses/types", json!({"name": "Fuel"}))
        .await;
    assert_eq!(again["data"]["id"], type_id);
    let (_, types) = app.get("/api/expenses/types").await;
    assert_eq!(types["data"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .post(
            "/api/expenses",
            json!({"amount": 60, "type_id": type_id, "pay_method": "ذمم", "beneficiary": "Station"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let expense_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["type_name"], "Fuel");
    assert_eq!(body["data"]["payment_method"], "credit");

    let (status, body) = app.post("/api/expenses", json!({"amount": 60})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "type_id is required");

    // A type still referenced by an expense cannot be removed.
    assert_eq!(
        app.delete(&format!("/api/expenses/types/{type_id}")).await,
        StatusCode::CONFLICT
    );
    assert_eq!(
        app.delete(&format!("/api/expenses/{expense_id}")).await,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        app.delete(&format!("/api/expenses/types/{type_id}")).await,
        StatusCode::NO_CONTENT
    );
}

#[tokio::test]
async fn test_suppliers_and_vehicles() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/suppliers",
            json!({"name": "Spring Well", "source_type": "well", "area": "Mafraq", "price_per_meter": "1.25"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["price_per_meter"], 1.25);

    let (status, body) = app
        .post("/api/suppliers", json!({"name": "No Source", "area": "Mafraq"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "source_type is required");

    let (status, body) = app
        .post(
            "/api/vehicles",
            json!({"number": "21-4455", "driver_name": "Mahmoud", "last_maintenance": "2025-09-01"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let vehicle_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["status"], "active");

    let (status, _) = app
        .post(
            "/api/vehicles",
            json!({"number": "21-4455", "driver_name": "Someone"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = app.get("/api/vehicles").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(
        app.delete(&format!("/api/vehicles/{vehicle_id}")).await,
        StatusCode::NO_CONTENT
    );
}

#[tokio::test]
async fn test_legacy_database_is_served_after_migration() {
    let db = TestDb::with_sql(
        "CREATE TABLE expenses (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             date TEXT NOT NULL,
             type TEXT NOT NULL,
             amount REAL NOT NULL,
             recipient TEXT,
             pay_method TEXT
         );
         INSERT INTO expenses (date, type, amount, recipient, pay_method)
             VALUES ('2025-02-10', 'maintenance', 80, 'Garage', 'كاش');",
    );
    let app = TestApp::from_db(db);

    let (status, body) = app.get("/api/expenses").await;
    assert_eq!(status, StatusCode::OK);
    let legacy = &body["data"][0];
    assert_eq!(legacy["beneficiary"], "Garage");
    assert_eq!(legacy["payment_method"], "cash");
    assert_eq!(legacy["amount"], 80.0);

    let (_, salaries) = app
        .post("/api/expenses/types", json!({"name": "Salaries"}))
        .await;
    let (status, _) = app
        .post(
            "/api/expenses",
            json!({"amount": 300, "type_id": salaries["data"]["id"], "date": "2025-02-11"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.get("/api/expenses").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}
