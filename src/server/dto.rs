use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::schema::{ReconciliationReport, RunStatus};

/// Accepts `12.5`, `"12.5"` or null. Older front ends post amounts as
/// strings straight from text inputs.
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("'{s}' is not a number"))),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateClientRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub area: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    #[serde(rename = "type")]
    pub client_type: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeRequest {
    pub name: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub salary: Option<f64>,
    pub phone: Option<String>,
    pub social_number: Option<String>,
    pub hire_date: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateRevenueRequest {
    #[serde(default, deserialize_with = "number_or_string")]
    pub amount: Option<f64>,
    pub date: Option<String>,
    #[serde(alias = "payment_type")]
    pub payment_method: Option<String>,
    #[serde(alias = "source_type")]
    pub source: Option<String>,
    #[serde(rename = "type", alias = "tank_type")]
    pub revenue_type: Option<String>,
    pub client_id: Option<i64>,
    #[serde(alias = "driver_name")]
    pub client_name: Option<String>,
    pub vehicle_id: Option<i64>,
    pub vehicle_number: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateExpenseRequest {
    #[serde(default, deserialize_with = "number_or_string")]
    pub amount: Option<f64>,
    pub date: Option<String>,
    pub type_id: Option<i64>,
    pub beneficiary: Option<String>,
    #[serde(alias = "pay_method")]
    pub payment_method: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateExpenseTypeRequest {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSupplierRequest {
    pub name: Option<String>,
    pub source_type: Option<String>,
    pub area: Option<String>,
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub price_per_meter: Option<f64>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub price_per_tank: Option<f64>,
    pub capacity: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateVehicleRequest {
    pub number: Option<String>,
    pub driver_name: Option<String>,
    pub current_location: Option<String>,
    pub capacity: Option<String>,
    pub model: Option<String>,
    pub status: Option<String>,
    pub last_maintenance: Option<String>,
    pub notes: Option<String>,
}

/// Outcome of the startup reconciliation, as reported by `/api/health`.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaStatus {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub applied: usize,
    pub failed: usize,
    pub warnings: usize,
    pub finished_at: DateTime<Utc>,
}

impl From<&ReconciliationReport> for SchemaStatus {
    fn from(report: &ReconciliationReport) -> Self {
        Self {
            run_id: report.run_id,
            status: report.status,
            applied: report.applied().count(),
            failed: report.failed().count(),
            warnings: report.warnings.len(),
            finished_at: report.finished_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub schema: SchemaStatus,
    pub timestamp: DateTime<Utc>,
}
