//! Optional service components (add-on charges) and per-property subscriptions.

use super::{InvalidEnumValue, TariffScope};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// An add-on a property can subscribe to, e.g. waste pickup.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TariffComponent {
    #[serde(rename = "id")]
    pub component_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ComponentInput {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

/// Dated price of a component, resolved like a tariff.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRate {
    #[serde(rename = "id")]
    pub rate_id: Uuid,
    pub component_id: Uuid,
    pub amount: Decimal,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    #[sqlx(try_from = "String")]
    pub property_type: TariffScope,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RateInput {
    pub amount: Decimal,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    pub property_type: TariffScope,
}

/// Subscription lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Rejected,
    Inactive,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Rejected => "rejected",
            SubscriptionStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "rejected" => Ok(SubscriptionStatus::Rejected),
            "inactive" => Ok(SubscriptionStatus::Inactive),
            other => Err(InvalidEnumValue::new("subscription status", other)),
        }
    }
}

impl TryFrom<String> for SubscriptionStatus {
    type Error = InvalidEnumValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSubscription {
    #[serde(rename = "id")]
    pub subscription_id: Uuid,
    pub property_id: Uuid,
    pub component_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[sqlx(try_from = "String")]
    pub status: SubscriptionStatus,
    pub requested_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub approved_utc: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl ComponentSubscription {
    /// Active and covering `date` (both ends inclusive).
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.status == SubscriptionStatus::Active
            && self.start_date <= date
            && self.end_date.is_none_or(|end| end >= date)
    }
}

/// Input for creating a subscription row, either as a pending request or, for admin
/// bulk assignment, directly active.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub property_id: Uuid,
    pub component_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: SubscriptionStatus,
    pub requested_by: Uuid,
    pub approved_by: Option<Uuid>,
}
