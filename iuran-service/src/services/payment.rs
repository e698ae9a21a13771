//! Dues payment workflow: submission, admin entry and verification.

use super::metrics::{record_error, record_payment_submitted, record_verification};
use super::store::{PaymentLedger, PropertyStore};
use crate::models::{
    ListTransactionsFilter, MonthYear, NewPaymentItem, NewTransaction, Transaction,
    TransactionStatus, TransactionWithItems,
};
use anyhow::anyhow;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// One line of a payment as submitted, before validation.
#[derive(Debug, Clone)]
pub struct PaymentItemInput {
    pub property_id: Uuid,
    pub month: u32,
    pub year: i32,
    pub amount: Decimal,
}

#[derive(Clone)]
pub struct PaymentService {
    properties: Arc<dyn PropertyStore>,
    ledger: Arc<dyn PaymentLedger>,
}

impl PaymentService {
    pub fn new(properties: Arc<dyn PropertyStore>, ledger: Arc<dyn PaymentLedger>) -> Self {
        Self { properties, ledger }
    }

    /// A resident pays for one or more property-months they own. Recorded as pending.
    #[instrument(skip(self, items, proof_image), fields(user_id = %user_id, items = items.len()))]
    pub async fn submit(
        &self,
        user_id: Uuid,
        items: Vec<PaymentItemInput>,
        proof_image: Option<String>,
    ) -> Result<TransactionWithItems, AppError> {
        let items = validate_items(items)?;
        self.ensure_properties(&items, Some(user_id)).await?;

        let created = self
            .ledger
            .create_transaction(&NewTransaction {
                user_id,
                proof_image,
                status: TransactionStatus::Pending,
                verified_by: None,
                items,
            })
            .await
            .inspect_err(|e| record_error(e.kind(), "submit_payment"))?;

        record_payment_submitted("resident", TransactionStatus::Pending.as_str());
        info!(
            transaction_id = %created.transaction.transaction_id,
            total = %created.transaction.total_amount,
            "Payment submitted"
        );
        Ok(created)
    }

    /// An admin records a payment on behalf of a resident, optionally verified at once.
    #[instrument(skip(self, items, proof_image), fields(admin_id = %admin_id, user_id = %user_id))]
    pub async fn create_for_user(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        items: Vec<PaymentItemInput>,
        proof_image: Option<String>,
        auto_verify: bool,
    ) -> Result<TransactionWithItems, AppError> {
        let items = validate_items(items)?;
        self.ensure_properties(&items, None).await?;

        let (status, verified_by) = if auto_verify {
            (TransactionStatus::Verified, Some(admin_id))
        } else {
            (TransactionStatus::Pending, None)
        };
        let created = self
            .ledger
            .create_transaction(&NewTransaction {
                user_id,
                proof_image,
                status,
                verified_by,
                items,
            })
            .await
            .inspect_err(|e| record_error(e.kind(), "create_payment_for_user"))?;

        record_payment_submitted("admin", status.as_str());
        info!(
            transaction_id = %created.transaction.transaction_id,
            status = status.as_str(),
            "Payment created by admin"
        );
        Ok(created)
    }

    /// Settle a pending transaction. A transaction is decided exactly once.
    #[instrument(skip(self), fields(transaction_id = %transaction_id, admin_id = %admin_id))]
    pub async fn verify(
        &self,
        admin_id: Uuid,
        transaction_id: Uuid,
        status: TransactionStatus,
    ) -> Result<Transaction, AppError> {
        if !status.is_terminal() {
            return Err(AppError::BadRequest(anyhow!(
                "status must be 'verified' or 'rejected'"
            )));
        }

        if let Some(updated) = self
            .ledger
            .set_status(transaction_id, status, admin_id)
            .await?
        {
            record_verification(status.as_str());
            info!(status = status.as_str(), "Transaction processed");
            return Ok(updated);
        }

        match self.ledger.find_transaction(transaction_id).await? {
            None => Err(AppError::NotFound(anyhow!(
                "Transaction {} not found",
                transaction_id
            ))),
            Some(existing) => {
                record_verification("conflict");
                warn!(current = existing.status.as_str(), "Transaction already processed");
                Err(AppError::Conflict(anyhow!(
                    "Transaction {} is already {}",
                    transaction_id,
                    existing.status.as_str()
                )))
            }
        }
    }

    /// Pending transactions, oldest first, for the verification queue.
    #[instrument(skip(self))]
    pub async fn list_pending(&self) -> Result<Vec<Transaction>, AppError> {
        self.ledger.list_pending().await
    }

    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<TransactionStatus>,
    ) -> Result<Vec<Transaction>, AppError> {
        self.ledger
            .list_transactions(&ListTransactionsFilter {
                user_id: Some(user_id),
                status,
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<TransactionWithItems, AppError> {
        let transaction = self
            .ledger
            .find_transaction(transaction_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow!("Transaction {} not found", transaction_id))
            })?;
        let items = self.ledger.list_items(transaction_id).await?;
        Ok(TransactionWithItems { transaction, items })
    }

    /// Every referenced property must exist; with `owner`, each must belong to them.
    async fn ensure_properties(
        &self,
        items: &[NewPaymentItem],
        owner: Option<Uuid>,
    ) -> Result<(), AppError> {
        let ids: HashSet<Uuid> = items.iter().map(|item| item.property_id).collect();
        for property_id in ids {
            let property = self
                .properties
                .find_property(property_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow!("Property {} not found", property_id)))?;
            if let Some(owner) = owner {
                if !property.is_owned_by(owner) {
                    return Err(AppError::Forbidden(anyhow!(
                        "{} is not owned by the caller",
                        property.address()
                    )));
                }
            }
        }
        Ok(())
    }
}

fn validate_items(items: Vec<PaymentItemInput>) -> Result<Vec<NewPaymentItem>, AppError> {
    if items.is_empty() {
        return Err(AppError::BadRequest(anyhow!(
            "a payment needs at least one item"
        )));
    }
    items
        .into_iter()
        .map(|item| {
            let period = MonthYear::new(item.month, item.year).ok_or_else(|| {
                AppError::BadRequest(anyhow!("invalid period {}/{}", item.month, item.year))
            })?;
            if item.amount <= Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow!(
                    "amount for {} must be greater than zero",
                    period
                )));
            }
            Ok(NewPaymentItem {
                property_id: item.property_id,
                period,
                amount: item.amount,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(month: u32, amount: Decimal) -> PaymentItemInput {
        PaymentItemInput {
            property_id: Uuid::new_v4(),
            month,
            year: 2024,
            amount,
        }
    }

    #[test]
    fn rejects_empty_payment() {
        assert!(matches!(
            validate_items(vec![]),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn rejects_month_thirteen() {
        assert!(matches!(
            validate_items(vec![item(13, dec!(100000))]),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn rejects_non_positive_amount() {
        assert!(matches!(
            validate_items(vec![item(1, dec!(100000)), item(2, Decimal::ZERO)]),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn converts_valid_items() {
        let items = validate_items(vec![item(1, dec!(100000)), item(2, dec!(50000))]).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].period, MonthYear::new(2, 2024).unwrap());
    }
}
