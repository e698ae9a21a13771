//! Payment transaction and allocation models.

use super::{InvalidEnumValue, MonthYear};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Verification state of a payment submission.
///
/// `Pending` is the only non-terminal state; it moves once to `Verified` or `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Verified,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Verified => "verified",
            TransactionStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl FromStr for TransactionStatus {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "verified" => Ok(TransactionStatus::Verified),
            "rejected" => Ok(TransactionStatus::Rejected),
            other => Err(InvalidEnumValue::new("transaction status", other)),
        }
    }
}

impl TryFrom<String> for TransactionStatus {
    type Error = InvalidEnumValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A payment submission (header).
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "id")]
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub proof_image: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub verified_by: Option<Uuid>,
    pub verified_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// One (property, month) allocation inside a transaction.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentItem {
    #[serde(rename = "id")]
    pub item_id: Uuid,
    pub transaction_id: Uuid,
    pub property_id: Uuid,
    pub month: i32,
    pub year: i32,
    pub amount: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// A transaction with its allocations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionWithItems {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub items: Vec<PaymentItem>,
}

/// A payment item joined with its parent transaction's status, for history views.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPayment {
    #[serde(rename = "id")]
    pub item_id: Uuid,
    pub transaction_id: Uuid,
    pub property_id: Uuid,
    pub month: i32,
    pub year: i32,
    pub amount: Decimal,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub transaction_utc: DateTime<Utc>,
}

impl PropertyPayment {
    pub fn period(&self) -> Option<MonthYear> {
        u32::try_from(self.month)
            .ok()
            .and_then(|month| MonthYear::new(month, self.year))
    }
}

/// Sum of item amounts for one property-month under one transaction status.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PeriodSum {
    pub property_id: Uuid,
    pub year: i32,
    pub month: i32,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub total: Decimal,
}

/// Allocation requested as part of a new transaction.
#[derive(Debug, Clone)]
pub struct NewPaymentItem {
    pub property_id: Uuid,
    pub period: MonthYear,
    pub amount: Decimal,
}

/// Input for recording a transaction together with its items.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub proof_image: Option<String>,
    pub status: TransactionStatus,
    pub verified_by: Option<Uuid>,
    pub items: Vec<NewPaymentItem>,
}

impl NewTransaction {
    pub fn total_amount(&self) -> Decimal {
        self.items.iter().map(|item| item.amount).sum()
    }
}

/// Filter parameters for listing transactions.
#[derive(Debug, Clone, Default)]
pub struct ListTransactionsFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<TransactionStatus>,
}
