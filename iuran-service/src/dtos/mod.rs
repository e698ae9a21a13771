//! Request and query shapes for the HTTP API.
//!
//! Field-level checks use `validator`; rules that need the stores (ownership, overlap,
//! existence) stay in the services.

use crate::models::{
    ComponentInput, CreateProperty, ExpenseInput, MonthYear, PropertyType, RateInput,
    RecipientInput, RelationType, TariffInput, TariffScope, TariffType, TransactionStatus, Window,
};
use crate::services::dashboard::HistoryFilter;
use crate::services::payment::PaymentItemInput;
use crate::services::subscription::{BulkAction, BulkRequest};
use anyhow::anyhow;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentItemRequest {
    pub property_id: Uuid,
    #[validate(range(min = 1, max = 12, message = "month must be between 1 and 12"))]
    pub month: u32,
    #[validate(range(min = 1900, max = 9999, message = "year is out of range"))]
    pub year: i32,
    pub amount: Decimal,
}

impl From<PaymentItemRequest> for PaymentItemInput {
    fn from(item: PaymentItemRequest) -> Self {
        Self {
            property_id: item.property_id,
            month: item.month,
            year: item.year,
            amount: item.amount,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPaymentRequest {
    #[validate(length(min = 1, message = "at least one item is required"), nested)]
    pub items: Vec<PaymentItemRequest>,
    pub proof_image: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminPaymentRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "at least one item is required"), nested)]
    pub items: Vec<PaymentItemRequest>,
    pub proof_image: Option<String>,
    #[serde(default)]
    pub auto_verify: bool,
}

#[derive(Debug, Deserialize)]
pub struct VerifyTransactionRequest {
    pub status: TransactionStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionStatusQuery {
    pub status: Option<TransactionStatus>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TariffRequest {
    pub amount: Decimal,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    #[serde(default)]
    pub property_type: TariffScope,
    #[serde(default)]
    pub tariff_type: TariffType,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

impl From<TariffRequest> for TariffInput {
    fn from(req: TariffRequest) -> Self {
        Self {
            amount: req.amount,
            valid_from: req.valid_from,
            valid_to: req.valid_to,
            property_type: req.property_type,
            tariff_type: req.tariff_type,
            description: req.description.filter(|d| !d.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTariffQuery {
    pub date: Option<NaiveDate>,
    pub property_type: PropertyType,
    #[serde(default)]
    pub tariff_type: TariffType,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyRequest {
    #[validate(length(min = 1, max = 8, message = "block is required"))]
    pub block: String,
    #[validate(range(min = 1, message = "number must be positive"))]
    pub number: i32,
    #[serde(alias = "type")]
    pub property_type: PropertyType,
    pub bast_date: Option<NaiveDate>,
    pub owner_id: Option<Uuid>,
}

impl From<CreatePropertyRequest> for CreateProperty {
    fn from(req: CreatePropertyRequest) -> Self {
        Self {
            block: req.block,
            number: req.number,
            property_type: req.property_type,
            owner_id: req.owner_id,
            bast_date: req.bast_date,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePropertyTypeRequest {
    #[serde(alias = "type")]
    pub property_type: PropertyType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBastRequest {
    pub bast_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOwnerRequest {
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPropertyUserRequest {
    pub user_id: Uuid,
    pub relation_type: RelationType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePropertyUserRequest {
    pub relation_type: RelationType,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecipientRequest {
    #[validate(length(min = 1, max = 200, message = "name is required"))]
    pub name: String,
    pub identity_number: Option<String>,
    #[serde(rename = "type")]
    pub recipient_type: Option<String>,
    pub description: Option<String>,
}

impl From<RecipientRequest> for RecipientInput {
    fn from(req: RecipientRequest) -> Self {
        Self {
            name: req.name.trim().to_string(),
            identity_number: req.identity_number,
            recipient_type: req.recipient_type,
            description: req.description,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRequest {
    pub recipient_id: Option<Uuid>,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
}

impl From<ExpenseRequest> for ExpenseInput {
    fn from(req: ExpenseRequest) -> Self {
        Self {
            recipient_id: req.recipient_id,
            description: req.description,
            amount: req.amount,
            expense_date: req.date,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FinancialQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl FinancialQuery {
    /// The requested month, defaulting each missing part to `today`'s.
    pub fn period(&self, today: NaiveDate) -> Result<MonthYear, AppError> {
        let current = MonthYear::of(today);
        let month = self.month.unwrap_or(current.month());
        let year = self.year.unwrap_or(current.year());
        MonthYear::new(month, year)
            .ok_or_else(|| AppError::BadRequest(anyhow!("invalid period {}/{}", month, year)))
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRequest {
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl From<ComponentRequest> for ComponentInput {
    fn from(req: ComponentRequest) -> Self {
        Self {
            name: req.name.trim().to_string(),
            description: req.description,
            is_active: req.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRequest {
    pub amount: Decimal,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    #[serde(default)]
    pub property_type: TariffScope,
}

impl From<RateRequest> for RateInput {
    fn from(req: RateRequest) -> Self {
        Self {
            amount: req.amount,
            valid_from: req.valid_from,
            valid_to: req.valid_to,
            property_type: req.property_type,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRateRequest {
    pub component_id: Uuid,
    #[serde(flatten)]
    pub rate: RateRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub property_id: Uuid,
    pub component_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeRequest {
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectRequest {
    #[validate(length(min = 1, message = "a rejection reason is required"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkSubscriptionRequest {
    #[validate(length(min = 1, message = "propertyIds must not be empty"))]
    pub property_ids: Vec<Uuid>,
    pub component_id: Uuid,
    pub action: BulkAction,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl BulkSubscriptionRequest {
    /// A missing start date means `today`.
    pub fn into_request(self, today: NaiveDate) -> BulkRequest {
        BulkRequest {
            property_ids: self.property_ids,
            component_id: self.component_id,
            action: self.action,
            start_date: self.start_date.unwrap_or(today),
            end_date: self.end_date,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowQuery {
    pub start_month: Option<u32>,
    pub start_year: Option<i32>,
}

impl WindowQuery {
    /// The requested window. Without a start it is the six months from `today`'s month.
    pub fn window(&self, today: NaiveDate) -> Result<Window, AppError> {
        let current = MonthYear::of(today);
        let month = self.start_month.unwrap_or(current.month());
        let year = self.start_year.unwrap_or(current.year());
        MonthYear::new(month, year)
            .map(Window::starting_at)
            .ok_or_else(|| {
                AppError::BadRequest(anyhow!("invalid start period {}/{}", month, year))
            })
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub block: String,
    pub number: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetailQuery {
    pub year: Option<i32>,
    #[serde(default)]
    pub status: HistoryFilter,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_defaults_to_current_month() {
        let window = WindowQuery::default().window(date(2024, 11, 20)).unwrap();
        assert_eq!(window.start(), MonthYear::new(11, 2024).unwrap());
    }

    #[test]
    fn window_rejects_month_zero() {
        let query = WindowQuery {
            start_month: Some(0),
            start_year: Some(2024),
        };
        assert!(matches!(
            query.window(date(2024, 1, 1)),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn payment_items_are_validated_nested() {
        let req: SubmitPaymentRequest = serde_json::from_value(serde_json::json!({
            "items": [{
                "propertyId": Uuid::new_v4(),
                "month": 13,
                "year": 2024,
                "amount": "100000"
            }]
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn empty_payment_fails_validation() {
        let req = SubmitPaymentRequest {
            items: vec![],
            proof_image: None,
        };
        assert!(req.validate().is_err());
    }
}
