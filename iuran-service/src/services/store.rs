//! Persistence contracts consumed by the domain services.
//!
//! Each store is an async trait object so services can be wired against Postgres in
//! production and against [`MemoryStore`](super::memory::MemoryStore) in tests.

use crate::models::{
    ComponentInput, ComponentRate, ComponentSubscription, CreateProperty, Expense, ExpenseInput,
    ExpenseRecipient, ListTransactionsFilter, MonthYear, NewPaymentItem, NewSubscription,
    NewTransaction, PaymentItem, PeriodSum, Property, PropertyPayment, PropertyType,
    PropertyUser, RateInput, RecipientInput, RelationType, SubscriptionStatus, Tariff,
    TariffComponent, TariffInput, TariffType, Transaction, TransactionStatus,
    TransactionWithItems,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

use super::database::Database;
use super::memory::MemoryStore;

#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// All properties ordered by block, then number.
    async fn list_properties(&self) -> Result<Vec<Property>, AppError>;
    async fn find_property(&self, property_id: Uuid) -> Result<Option<Property>, AppError>;
    async fn find_by_block_number(
        &self,
        block: &str,
        number: i32,
    ) -> Result<Option<Property>, AppError>;
    async fn list_owned_by(&self, owner_id: Uuid) -> Result<Vec<Property>, AppError>;
    /// Fails with `Conflict` when (block, number) is taken.
    async fn create_property(&self, input: &CreateProperty) -> Result<Property, AppError>;
    async fn update_property_type(
        &self,
        property_id: Uuid,
        property_type: PropertyType,
    ) -> Result<Option<Property>, AppError>;
    async fn update_bast_date(
        &self,
        property_id: Uuid,
        bast_date: Option<NaiveDate>,
    ) -> Result<Option<Property>, AppError>;
    async fn update_owner(
        &self,
        property_id: Uuid,
        owner_id: Option<Uuid>,
    ) -> Result<Option<Property>, AppError>;

    /// Users linked to a property, grouped by relation type, oldest link first.
    async fn list_property_users(&self, property_id: Uuid) -> Result<Vec<PropertyUser>, AppError>;
    /// Fails with `Conflict` when the user is already linked to the property.
    async fn add_property_user(
        &self,
        property_id: Uuid,
        user_id: Uuid,
        relation_type: RelationType,
    ) -> Result<PropertyUser, AppError>;
    async fn update_property_user(
        &self,
        link_id: Uuid,
        relation_type: RelationType,
    ) -> Result<Option<PropertyUser>, AppError>;
    async fn delete_property_user(&self, link_id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait TariffStore: Send + Sync {
    /// Every tariff, newest `valid_from` first.
    async fn list_tariffs(&self) -> Result<Vec<Tariff>, AppError>;
    async fn find_tariff(&self, tariff_id: Uuid) -> Result<Option<Tariff>, AppError>;
    /// Point lookup with the same selection and tie-break as
    /// [`resolve_tariff`](super::tariff::resolve_tariff).
    async fn find_active_for_date(
        &self,
        date: NaiveDate,
        property_type: PropertyType,
        tariff_type: TariffType,
    ) -> Result<Option<Tariff>, AppError>;
    async fn create_tariff(&self, input: &TariffInput) -> Result<Tariff, AppError>;
    async fn update_tariff(
        &self,
        tariff_id: Uuid,
        input: &TariffInput,
    ) -> Result<Option<Tariff>, AppError>;
    /// Returns whether a row was removed.
    async fn delete_tariff(&self, tariff_id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Insert the header and every item as one atomic unit.
    async fn create_transaction(
        &self,
        input: &NewTransaction,
    ) -> Result<TransactionWithItems, AppError>;
    /// Append an item to a pending transaction and bump its total. Decided transactions
    /// give Conflict.
    async fn add_item(
        &self,
        transaction_id: Uuid,
        item: &NewPaymentItem,
    ) -> Result<PaymentItem, AppError>;
    async fn find_transaction(&self, transaction_id: Uuid)
    -> Result<Option<Transaction>, AppError>;
    async fn list_items(&self, transaction_id: Uuid) -> Result<Vec<PaymentItem>, AppError>;
    /// Matching transactions, newest first.
    async fn list_transactions(
        &self,
        filter: &ListTransactionsFilter,
    ) -> Result<Vec<Transaction>, AppError>;
    /// Pending transactions, oldest first.
    async fn list_pending(&self) -> Result<Vec<Transaction>, AppError>;
    /// Move a pending transaction to `status`. Returns `None` when the row is missing or
    /// no longer pending; the row is not touched in that case.
    async fn set_status(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
        verified_by: Uuid,
    ) -> Result<Option<Transaction>, AppError>;
    /// Item sums grouped by (property, year, month, status) over an inclusive month range.
    /// `property_ids = None` covers every property.
    async fn period_sums(
        &self,
        property_ids: Option<&[Uuid]>,
        from: MonthYear,
        to: MonthYear,
    ) -> Result<Vec<PeriodSum>, AppError>;
    /// Items for one property and year with their transaction status, newest period first.
    async fn property_payments(
        &self,
        property_id: Uuid,
        year: i32,
    ) -> Result<Vec<PropertyPayment>, AppError>;
    /// Sum of `total_amount` of verified transactions created in `[from, to)`.
    async fn verified_income_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Decimal, AppError>;

    async fn sum_verified_by_property_month(
        &self,
        property_id: Uuid,
        period: MonthYear,
    ) -> Result<Decimal, AppError> {
        self.sum_by_status(property_id, period, TransactionStatus::Verified)
            .await
    }

    async fn sum_pending_by_property_month(
        &self,
        property_id: Uuid,
        period: MonthYear,
    ) -> Result<Decimal, AppError> {
        self.sum_by_status(property_id, period, TransactionStatus::Pending)
            .await
    }

    async fn sum_by_status(
        &self,
        property_id: Uuid,
        period: MonthYear,
        status: TransactionStatus,
    ) -> Result<Decimal, AppError> {
        let sums = self
            .period_sums(Some(std::slice::from_ref(&property_id)), period, period)
            .await?;
        Ok(sums
            .iter()
            .filter(|sum| sum.status == status)
            .map(|sum| sum.total)
            .sum())
    }
}

#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// Recipients ordered by name.
    async fn list_recipients(&self) -> Result<Vec<ExpenseRecipient>, AppError>;
    async fn find_recipient(&self, recipient_id: Uuid)
    -> Result<Option<ExpenseRecipient>, AppError>;
    async fn create_recipient(&self, input: &RecipientInput) -> Result<ExpenseRecipient, AppError>;
    async fn update_recipient(
        &self,
        recipient_id: Uuid,
        input: &RecipientInput,
    ) -> Result<Option<ExpenseRecipient>, AppError>;
    async fn delete_recipient(&self, recipient_id: Uuid) -> Result<bool, AppError>;

    /// Expenses dated within the optional inclusive range, newest first.
    async fn list_expenses(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Expense>, AppError>;
    async fn find_expense(&self, expense_id: Uuid) -> Result<Option<Expense>, AppError>;
    async fn create_expense(&self, input: &ExpenseInput) -> Result<Expense, AppError>;
    async fn update_expense(
        &self,
        expense_id: Uuid,
        input: &ExpenseInput,
    ) -> Result<Option<Expense>, AppError>;
    async fn delete_expense(&self, expense_id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ComponentStore: Send + Sync {
    /// Components ordered by name, optionally only the active ones.
    async fn list_components(&self, active_only: bool) -> Result<Vec<TariffComponent>, AppError>;
    async fn find_component(&self, component_id: Uuid)
    -> Result<Option<TariffComponent>, AppError>;
    async fn create_component(&self, input: &ComponentInput) -> Result<TariffComponent, AppError>;
    async fn update_component(
        &self,
        component_id: Uuid,
        input: &ComponentInput,
    ) -> Result<Option<TariffComponent>, AppError>;

    /// Rates of one component, newest `valid_from` first.
    async fn list_rates(&self, component_id: Uuid) -> Result<Vec<ComponentRate>, AppError>;
    async fn create_rate(
        &self,
        component_id: Uuid,
        input: &RateInput,
    ) -> Result<ComponentRate, AppError>;
    async fn update_rate(
        &self,
        rate_id: Uuid,
        input: &RateInput,
    ) -> Result<Option<ComponentRate>, AppError>;

    async fn find_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<ComponentSubscription>, AppError>;
    /// The active subscription of a property to a component if there is one, otherwise
    /// the most recent one in any state.
    async fn find_subscription_for(
        &self,
        property_id: Uuid,
        component_id: Uuid,
    ) -> Result<Option<ComponentSubscription>, AppError>;
    async fn create_subscription(
        &self,
        input: &NewSubscription,
    ) -> Result<ComponentSubscription, AppError>;
    /// Conditional transition: applied only while the row is in `from`. Returns `None`
    /// when the row is missing or in another state.
    async fn transition_subscription(
        &self,
        subscription_id: Uuid,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
        actor: Option<Uuid>,
        rejection_reason: Option<&str>,
    ) -> Result<Option<ComponentSubscription>, AppError>;
    /// Deactivate an active subscription and queue a pending request carrying `end_date`
    /// in one write. Returns `None`, with nothing changed, when the row is not active.
    async fn end_subscription_request(
        &self,
        subscription_id: Uuid,
        requested_by: Uuid,
        end_date: NaiveDate,
    ) -> Result<Option<ComponentSubscription>, AppError>;
    /// Reset an existing row to active with new dates, recording the approving admin.
    async fn reactivate_subscription(
        &self,
        subscription_id: Uuid,
        approved_by: Uuid,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Result<Option<ComponentSubscription>, AppError>;
    /// Subscriptions in `status`, oldest first.
    async fn list_subscriptions_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<Vec<ComponentSubscription>, AppError>;
    /// Every subscription of a property, newest first.
    async fn list_subscriptions_for_property(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<ComponentSubscription>, AppError>;
}

/// The full set of stores a running service needs.
#[derive(Clone)]
pub struct Repositories {
    pub properties: Arc<dyn PropertyStore>,
    pub tariffs: Arc<dyn TariffStore>,
    pub ledger: Arc<dyn PaymentLedger>,
    pub expenses: Arc<dyn ExpenseStore>,
    pub components: Arc<dyn ComponentStore>,
}

impl Repositories {
    pub fn postgres(db: Database) -> Self {
        let db = Arc::new(db);
        Self {
            properties: db.clone(),
            tariffs: db.clone(),
            ledger: db.clone(),
            expenses: db.clone(),
            components: db,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            properties: store.clone(),
            tariffs: store.clone(),
            ledger: store.clone(),
            expenses: store.clone(),
            components: store,
        }
    }
}
