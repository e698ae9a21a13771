//! Cluster expense models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Someone the cluster pays: a vendor, a guard, a cleaning crew.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRecipient {
    #[serde(rename = "id")]
    pub recipient_id: Uuid,
    pub name: String,
    pub identity_number: Option<String>,
    #[serde(rename = "type")]
    pub recipient_type: Option<String>,
    pub description: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RecipientInput {
    pub name: String,
    pub identity_number: Option<String>,
    pub recipient_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(rename = "id")]
    pub expense_id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub description: String,
    pub amount: Decimal,
    #[serde(rename = "date")]
    pub expense_date: NaiveDate,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ExpenseInput {
    pub recipient_id: Option<Uuid>,
    pub description: String,
    pub amount: Decimal,
    pub expense_date: NaiveDate,
}
