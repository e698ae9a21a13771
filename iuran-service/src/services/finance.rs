//! Expense bookkeeping and the monthly cash summary.

use super::store::{ExpenseStore, PaymentLedger};
use crate::models::{Expense, ExpenseInput, ExpenseRecipient, MonthYear, RecipientInput};
use anyhow::anyhow;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub year: i32,
    pub month: u32,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub balance: Decimal,
    pub expenses: Vec<Expense>,
}

#[derive(Clone)]
pub struct FinanceService {
    expenses: Arc<dyn ExpenseStore>,
    ledger: Arc<dyn PaymentLedger>,
}

impl FinanceService {
    pub fn new(expenses: Arc<dyn ExpenseStore>, ledger: Arc<dyn PaymentLedger>) -> Self {
        Self { expenses, ledger }
    }

    pub async fn list_recipients(&self) -> Result<Vec<ExpenseRecipient>, AppError> {
        self.expenses.list_recipients().await
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn add_recipient(&self, input: RecipientInput) -> Result<ExpenseRecipient, AppError> {
        validate_recipient(&input)?;
        let recipient = self.expenses.create_recipient(&input).await?;
        info!(recipient_id = %recipient.recipient_id, "Recipient added");
        Ok(recipient)
    }

    #[instrument(skip(self, input))]
    pub async fn update_recipient(
        &self,
        recipient_id: Uuid,
        input: RecipientInput,
    ) -> Result<ExpenseRecipient, AppError> {
        validate_recipient(&input)?;
        self.expenses
            .update_recipient(recipient_id, &input)
            .await?
            .ok_or_else(|| recipient_not_found(recipient_id))
    }

    #[instrument(skip(self))]
    pub async fn delete_recipient(&self, recipient_id: Uuid) -> Result<(), AppError> {
        if !self.expenses.delete_recipient(recipient_id).await? {
            return Err(recipient_not_found(recipient_id));
        }
        info!("Recipient deleted");
        Ok(())
    }

    /// Expenses dated in the optional inclusive range, newest first.
    pub async fn list_expenses(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Expense>, AppError> {
        self.expenses.list_expenses(from, to).await
    }

    #[instrument(skip(self, input), fields(amount = %input.amount, date = %input.expense_date))]
    pub async fn add_expense(&self, input: ExpenseInput) -> Result<Expense, AppError> {
        self.validate_expense(&input).await?;
        let expense = self.expenses.create_expense(&input).await?;
        info!(expense_id = %expense.expense_id, "Expense recorded");
        Ok(expense)
    }

    #[instrument(skip(self, input))]
    pub async fn update_expense(
        &self,
        expense_id: Uuid,
        input: ExpenseInput,
    ) -> Result<Expense, AppError> {
        self.validate_expense(&input).await?;
        self.expenses
            .update_expense(expense_id, &input)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("Expense {} not found", expense_id)))
    }

    #[instrument(skip(self))]
    pub async fn delete_expense(&self, expense_id: Uuid) -> Result<(), AppError> {
        if !self.expenses.delete_expense(expense_id).await? {
            return Err(AppError::NotFound(anyhow!("Expense {} not found", expense_id)));
        }
        info!("Expense deleted");
        Ok(())
    }

    /// Verified income against expenses for one calendar month.
    ///
    /// Income counts transactions by their creation time, expenses by their own date.
    #[instrument(skip(self), fields(period = %period))]
    pub async fn monthly_summary(&self, period: MonthYear) -> Result<FinancialSummary, AppError> {
        let from = period.first_day().and_time(NaiveTime::MIN).and_utc();
        let to = period.next().first_day().and_time(NaiveTime::MIN).and_utc();
        let total_income = self.ledger.verified_income_between(from, to).await?;

        let expenses = self
            .expenses
            .list_expenses(Some(period.first_day()), Some(period.last_day()))
            .await?;
        let total_expense: Decimal = expenses.iter().map(|e| e.amount).sum();

        Ok(FinancialSummary {
            year: period.year(),
            month: period.month(),
            total_income,
            total_expense,
            balance: total_income - total_expense,
            expenses,
        })
    }

    async fn validate_expense(&self, input: &ExpenseInput) -> Result<(), AppError> {
        if input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow!(
                "amount must be greater than zero"
            )));
        }
        if input.description.trim().is_empty() {
            return Err(AppError::BadRequest(anyhow!("description is required")));
        }
        if let Some(recipient_id) = input.recipient_id {
            if self.expenses.find_recipient(recipient_id).await?.is_none() {
                return Err(recipient_not_found(recipient_id));
            }
        }
        Ok(())
    }
}

fn validate_recipient(input: &RecipientInput) -> Result<(), AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow!("recipient name is required")));
    }
    Ok(())
}

fn recipient_not_found(recipient_id: Uuid) -> AppError {
    AppError::NotFound(anyhow!("Recipient {} not found", recipient_id))
}
