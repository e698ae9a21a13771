//! Domain models for iuran-service.

mod component;
mod expense;
mod period;
mod property;
mod tariff;
mod transaction;

use thiserror::Error;

pub use component::{
    ComponentInput, ComponentRate, ComponentSubscription, NewSubscription, RateInput,
    SubscriptionStatus, TariffComponent,
};
pub use expense::{Expense, ExpenseInput, ExpenseRecipient, RecipientInput};
pub use period::{MonthYear, WINDOW_MONTHS, Window};
pub use property::{CreateProperty, Property, PropertyType, PropertyUser, RelationType};
pub use tariff::{Tariff, TariffInput, TariffScope, TariffType};
pub use transaction::{
    ListTransactionsFilter, NewPaymentItem, NewTransaction, PaymentItem, PeriodSum,
    PropertyPayment, Transaction, TransactionStatus, TransactionWithItems,
};

/// A stored or submitted string that does not name a known enum variant.
#[derive(Debug, Clone, Error)]
#[error("invalid {kind} value: '{value}'")]
pub struct InvalidEnumValue {
    pub kind: &'static str,
    pub value: String,
}

impl InvalidEnumValue {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
