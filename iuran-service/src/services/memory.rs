//! In-memory implementation of the store contracts.
//!
//! All state sits behind one `RwLock`, so every write, including a transaction with its
//! items, is applied as a unit. Used by the test suite and for running without Postgres.

use super::store::{ComponentStore, ExpenseStore, PaymentLedger, PropertyStore, TariffStore};
use super::tariff::resolve_tariff;
use crate::models::{
    ComponentInput, ComponentRate, ComponentSubscription, CreateProperty, Expense, ExpenseInput,
    ExpenseRecipient, ListTransactionsFilter, MonthYear, NewPaymentItem, NewSubscription,
    NewTransaction, PaymentItem, PeriodSum, Property, PropertyPayment, PropertyType,
    PropertyUser, RateInput, RecipientInput, RelationType, SubscriptionStatus, Tariff,
    TariffComponent, TariffInput, TariffType, Transaction, TransactionStatus,
    TransactionWithItems,
};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::cmp::Reverse;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    properties: Vec<Property>,
    property_users: Vec<PropertyUser>,
    tariffs: Vec<Tariff>,
    transactions: Vec<Transaction>,
    items: Vec<PaymentItem>,
    recipients: Vec<ExpenseRecipient>,
    expenses: Vec<Expense>,
    components: Vec<TariffComponent>,
    rates: Vec<ComponentRate>,
    subscriptions: Vec<ComponentSubscription>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Strictly increasing timestamps so "newest first" orderings stay deterministic even
/// when two rows are written within the same clock tick.
fn stamp(previous: impl Iterator<Item = DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous.max() {
        Some(last) if last >= now => last + chrono::Duration::microseconds(1),
        _ => now,
    }
}

#[async_trait]
impl PropertyStore for MemoryStore {
    async fn list_properties(&self) -> Result<Vec<Property>, AppError> {
        let state = self.state.read().await;
        let mut properties = state.properties.clone();
        properties.sort_by(|a, b| a.block.cmp(&b.block).then(a.number.cmp(&b.number)));
        Ok(properties)
    }

    async fn find_property(&self, property_id: Uuid) -> Result<Option<Property>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .properties
            .iter()
            .find(|p| p.property_id == property_id)
            .cloned())
    }

    async fn find_by_block_number(
        &self,
        block: &str,
        number: i32,
    ) -> Result<Option<Property>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .properties
            .iter()
            .find(|p| p.block.eq_ignore_ascii_case(block) && p.number == number)
            .cloned())
    }

    async fn list_owned_by(&self, owner_id: Uuid) -> Result<Vec<Property>, AppError> {
        Ok(self
            .list_properties()
            .await?
            .into_iter()
            .filter(|p| p.is_owned_by(owner_id))
            .collect())
    }

    async fn create_property(&self, input: &CreateProperty) -> Result<Property, AppError> {
        let mut state = self.state.write().await;
        if state
            .properties
            .iter()
            .any(|p| p.block == input.block && p.number == input.number)
        {
            return Err(AppError::Conflict(anyhow!(
                "Property Blok {} No. {} already exists",
                input.block,
                input.number
            )));
        }
        let now = stamp(state.properties.iter().map(|p| p.created_utc));
        let property = Property {
            property_id: Uuid::new_v4(),
            block: input.block.clone(),
            number: input.number,
            property_type: input.property_type,
            owner_id: input.owner_id,
            bast_date: input.bast_date,
            created_utc: now,
            updated_utc: now,
        };
        state.properties.push(property.clone());
        Ok(property)
    }

    async fn update_property_type(
        &self,
        property_id: Uuid,
        property_type: PropertyType,
    ) -> Result<Option<Property>, AppError> {
        self.update_property(property_id, |p| p.property_type = property_type)
            .await
    }

    async fn update_bast_date(
        &self,
        property_id: Uuid,
        bast_date: Option<NaiveDate>,
    ) -> Result<Option<Property>, AppError> {
        self.update_property(property_id, |p| p.bast_date = bast_date)
            .await
    }

    async fn update_owner(
        &self,
        property_id: Uuid,
        owner_id: Option<Uuid>,
    ) -> Result<Option<Property>, AppError> {
        self.update_property(property_id, |p| p.owner_id = owner_id)
            .await
    }

    async fn list_property_users(&self, property_id: Uuid) -> Result<Vec<PropertyUser>, AppError> {
        let state = self.state.read().await;
        let mut links: Vec<PropertyUser> = state
            .property_users
            .iter()
            .filter(|l| l.property_id == property_id)
            .cloned()
            .collect();
        links.sort_by_key(|l| (l.relation_type.as_str(), l.created_utc));
        Ok(links)
    }

    async fn add_property_user(
        &self,
        property_id: Uuid,
        user_id: Uuid,
        relation_type: RelationType,
    ) -> Result<PropertyUser, AppError> {
        let mut state = self.state.write().await;
        if state
            .property_users
            .iter()
            .any(|l| l.property_id == property_id && l.user_id == user_id)
        {
            return Err(AppError::Conflict(anyhow!(
                "User {} is already linked to this property",
                user_id
            )));
        }
        let now = stamp(state.property_users.iter().map(|l| l.created_utc));
        let link = PropertyUser {
            link_id: Uuid::new_v4(),
            property_id,
            user_id,
            relation_type,
            created_utc: now,
            updated_utc: now,
        };
        state.property_users.push(link.clone());
        Ok(link)
    }

    async fn update_property_user(
        &self,
        link_id: Uuid,
        relation_type: RelationType,
    ) -> Result<Option<PropertyUser>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .property_users
            .iter_mut()
            .find(|l| l.link_id == link_id)
            .map(|l| {
                l.relation_type = relation_type;
                l.updated_utc = Utc::now();
                l.clone()
            }))
    }

    async fn delete_property_user(&self, link_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let before = state.property_users.len();
        state.property_users.retain(|l| l.link_id != link_id);
        Ok(state.property_users.len() < before)
    }
}

impl MemoryStore {
    async fn update_property(
        &self,
        property_id: Uuid,
        apply: impl FnOnce(&mut Property) + Send,
    ) -> Result<Option<Property>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .properties
            .iter_mut()
            .find(|p| p.property_id == property_id)
            .map(|p| {
                apply(p);
                p.updated_utc = Utc::now();
                p.clone()
            }))
    }
}

#[async_trait]
impl TariffStore for MemoryStore {
    async fn list_tariffs(&self) -> Result<Vec<Tariff>, AppError> {
        let state = self.state.read().await;
        let mut tariffs = state.tariffs.clone();
        tariffs.sort_by_key(|t| Reverse((t.valid_from, t.created_utc, t.tariff_id)));
        Ok(tariffs)
    }

    async fn find_tariff(&self, tariff_id: Uuid) -> Result<Option<Tariff>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .tariffs
            .iter()
            .find(|t| t.tariff_id == tariff_id)
            .cloned())
    }

    async fn find_active_for_date(
        &self,
        date: NaiveDate,
        property_type: PropertyType,
        tariff_type: TariffType,
    ) -> Result<Option<Tariff>, AppError> {
        let state = self.state.read().await;
        Ok(resolve_tariff(&state.tariffs, date, property_type, tariff_type).cloned())
    }

    async fn create_tariff(&self, input: &TariffInput) -> Result<Tariff, AppError> {
        let mut state = self.state.write().await;
        let now = stamp(state.tariffs.iter().map(|t| t.created_utc));
        let tariff = Tariff {
            tariff_id: Uuid::new_v4(),
            amount: input.amount,
            valid_from: input.valid_from,
            valid_to: input.valid_to,
            property_type: input.property_type,
            tariff_type: input.tariff_type,
            description: input.description.clone(),
            created_utc: now,
            updated_utc: now,
        };
        state.tariffs.push(tariff.clone());
        Ok(tariff)
    }

    async fn update_tariff(
        &self,
        tariff_id: Uuid,
        input: &TariffInput,
    ) -> Result<Option<Tariff>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .tariffs
            .iter_mut()
            .find(|t| t.tariff_id == tariff_id)
            .map(|t| {
                t.amount = input.amount;
                t.valid_from = input.valid_from;
                t.valid_to = input.valid_to;
                t.property_type = input.property_type;
                t.tariff_type = input.tariff_type;
                t.description = input.description.clone();
                t.updated_utc = Utc::now();
                t.clone()
            }))
    }

    async fn delete_tariff(&self, tariff_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let before = state.tariffs.len();
        state.tariffs.retain(|t| t.tariff_id != tariff_id);
        Ok(state.tariffs.len() != before)
    }
}

#[async_trait]
impl PaymentLedger for MemoryStore {
    async fn create_transaction(
        &self,
        input: &NewTransaction,
    ) -> Result<TransactionWithItems, AppError> {
        let mut state = self.state.write().await;
        let now = stamp(state.transactions.iter().map(|t| t.created_utc));
        let transaction = Transaction {
            transaction_id: Uuid::new_v4(),
            user_id: input.user_id,
            total_amount: input.total_amount(),
            proof_image: input.proof_image.clone(),
            status: input.status,
            verified_by: input.verified_by,
            verified_utc: input.verified_by.map(|_| now),
            created_utc: now,
            updated_utc: now,
        };
        let items: Vec<PaymentItem> = input
            .items
            .iter()
            .map(|item| PaymentItem {
                item_id: Uuid::new_v4(),
                transaction_id: transaction.transaction_id,
                property_id: item.property_id,
                month: item.period.month() as i32,
                year: item.period.year(),
                amount: item.amount,
                created_utc: now,
            })
            .collect();

        state.transactions.push(transaction.clone());
        state.items.extend(items.iter().cloned());
        Ok(TransactionWithItems { transaction, items })
    }

    async fn add_item(
        &self,
        transaction_id: Uuid,
        item: &NewPaymentItem,
    ) -> Result<PaymentItem, AppError> {
        let mut state = self.state.write().await;
        let transaction = state
            .transactions
            .iter_mut()
            .find(|t| t.transaction_id == transaction_id)
            .ok_or_else(|| AppError::NotFound(anyhow!("Transaction {} not found", transaction_id)))?;
        if transaction.status != TransactionStatus::Pending {
            return Err(AppError::Conflict(anyhow!(
                "Transaction {} is already decided",
                transaction_id
            )));
        }
        transaction.total_amount += item.amount;
        transaction.updated_utc = Utc::now();

        let row = PaymentItem {
            item_id: Uuid::new_v4(),
            transaction_id,
            property_id: item.property_id,
            month: item.period.month() as i32,
            year: item.period.year(),
            amount: item.amount,
            created_utc: Utc::now(),
        };
        state.items.push(row.clone());
        Ok(row)
    }

    async fn find_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .find(|t| t.transaction_id == transaction_id)
            .cloned())
    }

    async fn list_items(&self, transaction_id: Uuid) -> Result<Vec<PaymentItem>, AppError> {
        let state = self.state.read().await;
        let mut items: Vec<PaymentItem> = state
            .items
            .iter()
            .filter(|i| i.transaction_id == transaction_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.year, i.month, i.created_utc));
        Ok(items)
    }

    async fn list_transactions(
        &self,
        filter: &ListTransactionsFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        let state = self.state.read().await;
        let mut transactions: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| filter.user_id.is_none_or(|user| t.user_id == user))
            .filter(|t| filter.status.is_none_or(|status| t.status == status))
            .cloned()
            .collect();
        transactions.sort_by_key(|t| Reverse(t.created_utc));
        Ok(transactions)
    }

    async fn list_pending(&self) -> Result<Vec<Transaction>, AppError> {
        let state = self.state.read().await;
        let mut transactions: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Pending)
            .cloned()
            .collect();
        transactions.sort_by_key(|t| t.created_utc);
        Ok(transactions)
    }

    async fn set_status(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
        verified_by: Uuid,
    ) -> Result<Option<Transaction>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .transactions
            .iter_mut()
            .find(|t| t.transaction_id == transaction_id && t.status == TransactionStatus::Pending)
            .map(|t| {
                let now = Utc::now();
                t.status = status;
                t.verified_by = Some(verified_by);
                t.verified_utc = Some(now);
                t.updated_utc = now;
                t.clone()
            }))
    }

    async fn period_sums(
        &self,
        property_ids: Option<&[Uuid]>,
        from: MonthYear,
        to: MonthYear,
    ) -> Result<Vec<PeriodSum>, AppError> {
        let state = self.state.read().await;
        let statuses: HashMap<Uuid, TransactionStatus> = state
            .transactions
            .iter()
            .map(|t| (t.transaction_id, t.status))
            .collect();

        let (from, to) = (from.ordinal(), to.ordinal());
        let mut grouped: HashMap<(Uuid, i32, i32, TransactionStatus), Decimal> = HashMap::new();
        for item in &state.items {
            let ordinal = item.year * 12 + item.month - 1;
            if ordinal < from || ordinal > to {
                continue;
            }
            if property_ids.is_some_and(|ids| !ids.contains(&item.property_id)) {
                continue;
            }
            let Some(status) = statuses.get(&item.transaction_id) else {
                continue;
            };
            *grouped
                .entry((item.property_id, item.year, item.month, *status))
                .or_default() += item.amount;
        }

        Ok(grouped
            .into_iter()
            .map(|((property_id, year, month, status), total)| PeriodSum {
                property_id,
                year,
                month,
                status,
                total,
            })
            .collect())
    }

    async fn property_payments(
        &self,
        property_id: Uuid,
        year: i32,
    ) -> Result<Vec<PropertyPayment>, AppError> {
        let state = self.state.read().await;
        let mut payments: Vec<PropertyPayment> = state
            .items
            .iter()
            .filter(|i| i.property_id == property_id && i.year == year)
            .filter_map(|i| {
                let transaction = state
                    .transactions
                    .iter()
                    .find(|t| t.transaction_id == i.transaction_id)?;
                Some(PropertyPayment {
                    item_id: i.item_id,
                    transaction_id: i.transaction_id,
                    property_id: i.property_id,
                    month: i.month,
                    year: i.year,
                    amount: i.amount,
                    status: transaction.status,
                    transaction_utc: transaction.created_utc,
                })
            })
            .collect();
        payments.sort_by_key(|p| Reverse((p.year, p.month, p.transaction_utc)));
        Ok(payments)
    }

    async fn verified_income_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Decimal, AppError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Verified)
            .filter(|t| t.created_utc >= from && t.created_utc < to)
            .map(|t| t.total_amount)
            .sum())
    }
}

#[async_trait]
impl ExpenseStore for MemoryStore {
    async fn list_recipients(&self) -> Result<Vec<ExpenseRecipient>, AppError> {
        let state = self.state.read().await;
        let mut recipients = state.recipients.clone();
        recipients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(recipients)
    }

    async fn find_recipient(
        &self,
        recipient_id: Uuid,
    ) -> Result<Option<ExpenseRecipient>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .recipients
            .iter()
            .find(|r| r.recipient_id == recipient_id)
            .cloned())
    }

    async fn create_recipient(&self, input: &RecipientInput) -> Result<ExpenseRecipient, AppError> {
        let mut state = self.state.write().await;
        let now = stamp(state.recipients.iter().map(|r| r.created_utc));
        let recipient = ExpenseRecipient {
            recipient_id: Uuid::new_v4(),
            name: input.name.clone(),
            identity_number: input.identity_number.clone(),
            recipient_type: input.recipient_type.clone(),
            description: input.description.clone(),
            created_utc: now,
            updated_utc: now,
        };
        state.recipients.push(recipient.clone());
        Ok(recipient)
    }

    async fn update_recipient(
        &self,
        recipient_id: Uuid,
        input: &RecipientInput,
    ) -> Result<Option<ExpenseRecipient>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .recipients
            .iter_mut()
            .find(|r| r.recipient_id == recipient_id)
            .map(|r| {
                r.name = input.name.clone();
                r.identity_number = input.identity_number.clone();
                r.recipient_type = input.recipient_type.clone();
                r.description = input.description.clone();
                r.updated_utc = Utc::now();
                r.clone()
            }))
    }

    async fn delete_recipient(&self, recipient_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let before = state.recipients.len();
        state.recipients.retain(|r| r.recipient_id != recipient_id);
        let removed = state.recipients.len() != before;
        if removed {
            for expense in state
                .expenses
                .iter_mut()
                .filter(|e| e.recipient_id == Some(recipient_id))
            {
                expense.recipient_id = None;
            }
        }
        Ok(removed)
    }

    async fn list_expenses(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Expense>, AppError> {
        let state = self.state.read().await;
        let mut expenses: Vec<Expense> = state
            .expenses
            .iter()
            .filter(|e| from.is_none_or(|from| e.expense_date >= from))
            .filter(|e| to.is_none_or(|to| e.expense_date <= to))
            .cloned()
            .collect();
        expenses.sort_by_key(|e| Reverse((e.expense_date, e.created_utc)));
        Ok(expenses)
    }

    async fn find_expense(&self, expense_id: Uuid) -> Result<Option<Expense>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .expenses
            .iter()
            .find(|e| e.expense_id == expense_id)
            .cloned())
    }

    async fn create_expense(&self, input: &ExpenseInput) -> Result<Expense, AppError> {
        let mut state = self.state.write().await;
        let now = stamp(state.expenses.iter().map(|e| e.created_utc));
        let expense = Expense {
            expense_id: Uuid::new_v4(),
            recipient_id: input.recipient_id,
            description: input.description.clone(),
            amount: input.amount,
            expense_date: input.expense_date,
            created_utc: now,
            updated_utc: now,
        };
        state.expenses.push(expense.clone());
        Ok(expense)
    }

    async fn update_expense(
        &self,
        expense_id: Uuid,
        input: &ExpenseInput,
    ) -> Result<Option<Expense>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .expenses
            .iter_mut()
            .find(|e| e.expense_id == expense_id)
            .map(|e| {
                e.recipient_id = input.recipient_id;
                e.description = input.description.clone();
                e.amount = input.amount;
                e.expense_date = input.expense_date;
                e.updated_utc = Utc::now();
                e.clone()
            }))
    }

    async fn delete_expense(&self, expense_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let before = state.expenses.len();
        state.expenses.retain(|e| e.expense_id != expense_id);
        Ok(state.expenses.len() != before)
    }
}

#[async_trait]
impl ComponentStore for MemoryStore {
    async fn list_components(&self, active_only: bool) -> Result<Vec<TariffComponent>, AppError> {
        let state = self.state.read().await;
        let mut components: Vec<TariffComponent> = state
            .components
            .iter()
            .filter(|c| !active_only || c.is_active)
            .cloned()
            .collect();
        components.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(components)
    }

    async fn find_component(
        &self,
        component_id: Uuid,
    ) -> Result<Option<TariffComponent>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .components
            .iter()
            .find(|c| c.component_id == component_id)
            .cloned())
    }

    async fn create_component(&self, input: &ComponentInput) -> Result<TariffComponent, AppError> {
        let mut state = self.state.write().await;
        let now = stamp(state.components.iter().map(|c| c.created_utc));
        let component = TariffComponent {
            component_id: Uuid::new_v4(),
            name: input.name.clone(),
            description: input.description.clone(),
            is_active: input.is_active,
            created_utc: now,
            updated_utc: now,
        };
        state.components.push(component.clone());
        Ok(component)
    }

    async fn update_component(
        &self,
        component_id: Uuid,
        input: &ComponentInput,
    ) -> Result<Option<TariffComponent>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .components
            .iter_mut()
            .find(|c| c.component_id == component_id)
            .map(|c| {
                c.name = input.name.clone();
                c.description = input.description.clone();
                c.is_active = input.is_active;
                c.updated_utc = Utc::now();
                c.clone()
            }))
    }

    async fn list_rates(&self, component_id: Uuid) -> Result<Vec<ComponentRate>, AppError> {
        let state = self.state.read().await;
        let mut rates: Vec<ComponentRate> = state
            .rates
            .iter()
            .filter(|r| r.component_id == component_id)
            .cloned()
            .collect();
        rates.sort_by_key(|r| Reverse((r.valid_from, r.created_utc)));
        Ok(rates)
    }

    async fn create_rate(
        &self,
        component_id: Uuid,
        input: &RateInput,
    ) -> Result<ComponentRate, AppError> {
        let mut state = self.state.write().await;
        let now = stamp(state.rates.iter().map(|r| r.created_utc));
        let rate = ComponentRate {
            rate_id: Uuid::new_v4(),
            component_id,
            amount: input.amount,
            valid_from: input.valid_from,
            valid_to: input.valid_to,
            property_type: input.property_type,
            created_utc: now,
            updated_utc: now,
        };
        state.rates.push(rate.clone());
        Ok(rate)
    }

    async fn update_rate(
        &self,
        rate_id: Uuid,
        input: &RateInput,
    ) -> Result<Option<ComponentRate>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .rates
            .iter_mut()
            .find(|r| r.rate_id == rate_id)
            .map(|r| {
                r.amount = input.amount;
                r.valid_from = input.valid_from;
                r.valid_to = input.valid_to;
                r.property_type = input.property_type;
                r.updated_utc = Utc::now();
                r.clone()
            }))
    }

    async fn find_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<ComponentSubscription>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .find(|s| s.subscription_id == subscription_id)
            .cloned())
    }

    async fn find_subscription_for(
        &self,
        property_id: Uuid,
        component_id: Uuid,
    ) -> Result<Option<ComponentSubscription>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.property_id == property_id && s.component_id == component_id)
            .max_by_key(|s| (s.status == SubscriptionStatus::Active, s.created_utc))
            .cloned())
    }

    async fn create_subscription(
        &self,
        input: &NewSubscription,
    ) -> Result<ComponentSubscription, AppError> {
        let mut state = self.state.write().await;
        let now = stamp(state.subscriptions.iter().map(|s| s.created_utc));
        let subscription = ComponentSubscription {
            subscription_id: Uuid::new_v4(),
            property_id: input.property_id,
            component_id: input.component_id,
            start_date: input.start_date,
            end_date: input.end_date,
            status: input.status,
            requested_by: Some(input.requested_by),
            approved_by: input.approved_by,
            approved_utc: input.approved_by.map(|_| now),
            rejection_reason: None,
            created_utc: now,
            updated_utc: now,
        };
        state.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn transition_subscription(
        &self,
        subscription_id: Uuid,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
        actor: Option<Uuid>,
        rejection_reason: Option<&str>,
    ) -> Result<Option<ComponentSubscription>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .subscriptions
            .iter_mut()
            .find(|s| s.subscription_id == subscription_id && s.status == from)
            .map(|s| {
                let now = Utc::now();
                s.status = to;
                if actor.is_some() {
                    s.approved_by = actor;
                    s.approved_utc = Some(now);
                }
                if let Some(reason) = rejection_reason {
                    s.rejection_reason = Some(reason.to_string());
                }
                s.updated_utc = now;
                s.clone()
            }))
    }

    async fn end_subscription_request(
        &self,
        subscription_id: Uuid,
        requested_by: Uuid,
        end_date: NaiveDate,
    ) -> Result<Option<ComponentSubscription>, AppError> {
        let mut state = self.state.write().await;
        let now = stamp(state.subscriptions.iter().map(|s| s.created_utc));
        let Some(current) = state
            .subscriptions
            .iter_mut()
            .find(|s| s.subscription_id == subscription_id && s.status == SubscriptionStatus::Active)
        else {
            return Ok(None);
        };
        current.status = SubscriptionStatus::Inactive;
        current.updated_utc = now;

        let request = ComponentSubscription {
            subscription_id: Uuid::new_v4(),
            property_id: current.property_id,
            component_id: current.component_id,
            start_date: current.start_date,
            end_date: Some(end_date),
            status: SubscriptionStatus::Pending,
            requested_by: Some(requested_by),
            approved_by: None,
            approved_utc: None,
            rejection_reason: None,
            created_utc: now,
            updated_utc: now,
        };
        state.subscriptions.push(request.clone());
        Ok(Some(request))
    }

    async fn reactivate_subscription(
        &self,
        subscription_id: Uuid,
        approved_by: Uuid,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Result<Option<ComponentSubscription>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .subscriptions
            .iter_mut()
            .find(|s| s.subscription_id == subscription_id)
            .map(|s| {
                let now = Utc::now();
                s.status = SubscriptionStatus::Active;
                s.approved_by = Some(approved_by);
                s.approved_utc = Some(now);
                s.start_date = start_date;
                s.end_date = end_date;
                s.rejection_reason = None;
                s.updated_utc = now;
                s.clone()
            }))
    }

    async fn list_subscriptions_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<Vec<ComponentSubscription>, AppError> {
        let state = self.state.read().await;
        let mut subscriptions: Vec<ComponentSubscription> = state
            .subscriptions
            .iter()
            .filter(|s| s.status == status)
            .cloned()
            .collect();
        subscriptions.sort_by_key(|s| s.created_utc);
        Ok(subscriptions)
    }

    async fn list_subscriptions_for_property(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<ComponentSubscription>, AppError> {
        let state = self.state.read().await;
        let mut subscriptions: Vec<ComponentSubscription> = state
            .subscriptions
            .iter()
            .filter(|s| s.property_id == property_id)
            .cloned()
            .collect();
        subscriptions.sort_by_key(|s| Reverse(s.created_utc));
        Ok(subscriptions)
    }
}
