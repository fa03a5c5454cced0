use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How a revenue entry was collected or an expense paid.
///
/// Older clients send the Arabic labels the front end used to display;
/// both spellings of credit are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Visa,
    Credit,
}

impl PaymentMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Visa => "visa",
            Self::Credit => "credit",
        }
    }

    /// Reads values stored by any historical version of the app. `None`
    /// for legacy free text, which callers pass through as-is.
    pub fn from_stored(value: &str) -> Option<Self> {
        value.parse().ok()
    }
}

impl FromStr for PaymentMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" | "كاش" => Ok(Self::Cash),
            "visa" | "فيزا" => Ok(Self::Visa),
            "credit" | "ذمم" | "ذِمم" => Ok(Self::Credit),
            other => Err(Error::BadRequest(format!(
                "unknown payment method '{other}' (expected cash, visa or credit)"
            ))),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub area: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub client_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewClient {
    pub name: String,
    pub phone: String,
    pub area: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub client_type: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    pub department: String,
    pub salary: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hire_date: Option<NaiveDate>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Full employee record as written by create and update.
#[derive(Debug, Clone, Default)]
pub struct EmployeeFields {
    pub name: String,
    pub job_title: Option<String>,
    pub department: String,
    pub salary: f64,
    pub phone: Option<String>,
    pub social_number: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revenue {
    pub id: i64,
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    /// Stored payment text that matches no known method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub revenue_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewRevenue {
    pub date: NaiveDate,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub source: Option<String>,
    pub revenue_type: Option<String>,
    pub client_id: Option<i64>,
    pub client_name: Option<String>,
    pub vehicle_id: Option<i64>,
    pub vehicle_number: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseType {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beneficiary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    /// Stored payment text that matches no known method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewExpense {
    pub date: NaiveDate,
    pub amount: f64,
    pub type_id: i64,
    pub beneficiary: Option<String>,
    pub payment_method: PaymentMethod,
    pub description: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub source_type: String,
    pub area: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_meter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_tank: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSupplier {
    pub name: String,
    pub source_type: String,
    pub area: String,
    pub phone: Option<String>,
    pub price_per_meter: Option<f64>,
    pub price_per_tank: Option<f64>,
    pub capacity: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_maintenance: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewVehicle {
    pub number: String,
    pub driver_name: String,
    pub current_location: Option<String>,
    pub capacity: Option<String>,
    pub model: Option<String>,
    pub status: Option<String>,
    pub last_maintenance: Option<NaiveDate>,
    pub notes: Option<String>,
}
