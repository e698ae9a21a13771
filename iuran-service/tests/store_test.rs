//! Store contract tests against the in-memory implementation.

mod common;

use common::{date, spawn_app};
use iuran_service::models::{
    ComponentInput, ExpenseInput, MonthYear, NewPaymentItem, NewSubscription, NewTransaction,
    PropertyType, SubscriptionStatus, TransactionStatus,
};
use iuran_service::services::{ComponentStore, ExpenseStore, PaymentLedger};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use service_core::error::AppError;
use uuid::Uuid;

fn march() -> MonthYear {
    MonthYear::new(3, 2024).unwrap()
}

#[tokio::test]
async fn ledger_sums_split_by_status() {
    let app = spawn_app();
    let property = app
        .seed_property("A", 1, PropertyType::Rumah, None, None)
        .await;
    app.pay(property.property_id, 3, 2024, dec!(70000), true).await;
    app.pay(property.property_id, 3, 2024, dec!(30000), false).await;
    app.pay(property.property_id, 4, 2024, dec!(100000), true).await;

    let verified = app
        .store
        .sum_verified_by_property_month(property.property_id, march())
        .await
        .unwrap();
    let pending = app
        .store
        .sum_pending_by_property_month(property.property_id, march())
        .await
        .unwrap();
    assert_eq!(verified, dec!(70000));
    assert_eq!(pending, dec!(30000));

    let rejected = app
        .store
        .sum_by_status(property.property_id, march(), TransactionStatus::Rejected)
        .await
        .unwrap();
    assert_eq!(rejected, Decimal::ZERO);
}

#[tokio::test]
async fn add_item_extends_transaction_total() {
    let app = spawn_app();
    let property = app
        .seed_property("A", 2, PropertyType::Rumah, None, None)
        .await;
    let created = app
        .store
        .create_transaction(&NewTransaction {
            user_id: app.resident_id,
            proof_image: None,
            status: TransactionStatus::Pending,
            verified_by: None,
            items: vec![NewPaymentItem {
                property_id: property.property_id,
                period: march(),
                amount: dec!(100000),
            }],
        })
        .await
        .unwrap();
    let id = created.transaction.transaction_id;

    app.store
        .add_item(
            id,
            &NewPaymentItem {
                property_id: property.property_id,
                period: march().next(),
                amount: dec!(100000),
            },
        )
        .await
        .unwrap();

    let stored = app.store.find_transaction(id).await.unwrap().unwrap();
    assert_eq!(stored.total_amount, dec!(200000));
    assert_eq!(app.store.list_items(id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn add_item_refuses_decided_transactions() {
    let app = spawn_app();
    let property = app
        .seed_property("A", 4, PropertyType::Rumah, None, None)
        .await;
    let verified = app.pay(property.property_id, 3, 2024, dec!(10), true).await;
    let id = verified.transaction.transaction_id;

    let result = app
        .store
        .add_item(
            id,
            &NewPaymentItem {
                property_id: property.property_id,
                period: march(),
                amount: dec!(90000),
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let stored = app.store.find_transaction(id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Verified);
    assert_eq!(stored.total_amount, dec!(10));
    assert_eq!(app.store.list_items(id).await.unwrap().len(), 1);
    let paid = app
        .store
        .sum_verified_by_property_month(property.property_id, march())
        .await
        .unwrap();
    assert_eq!(paid, dec!(10));

    let missing = app
        .store
        .add_item(
            Uuid::new_v4(),
            &NewPaymentItem {
                property_id: property.property_id,
                period: march(),
                amount: dec!(1),
            },
        )
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn set_status_only_moves_pending_rows() {
    let app = spawn_app();
    let property = app
        .seed_property("A", 3, PropertyType::Rumah, None, None)
        .await;
    let created = app.pay(property.property_id, 3, 2024, dec!(1000), false).await;
    let id = created.transaction.transaction_id;

    let first = app
        .store
        .set_status(id, TransactionStatus::Rejected, app.admin_id)
        .await
        .unwrap();
    assert_eq!(first.map(|t| t.status), Some(TransactionStatus::Rejected));

    let second = app
        .store
        .set_status(id, TransactionStatus::Verified, app.admin_id)
        .await
        .unwrap();
    assert!(second.is_none());
    let stored = app.store.find_transaction(id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Rejected);
}

#[tokio::test]
async fn expenses_round_through_the_store() {
    let app = spawn_app();
    let expense = app
        .store
        .create_expense(&ExpenseInput {
            recipient_id: None,
            description: "Perbaikan lampu jalan".to_string(),
            amount: dec!(125000),
            expense_date: date(2024, 5, 2),
        })
        .await
        .unwrap();

    let found = app
        .store
        .find_expense(expense.expense_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.amount, dec!(125000));

    assert!(app.store.delete_expense(expense.expense_id).await.unwrap());
    assert!(app
        .store
        .find_expense(expense.expense_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn end_subscription_request_swaps_active_row_for_pending_request() {
    let app = spawn_app();
    let property = app
        .seed_property("A", 5, PropertyType::Rumah, Some(app.resident_id), None)
        .await;
    let component = app
        .store
        .create_component(&ComponentInput {
            name: "Air".to_string(),
            description: None,
            is_active: true,
        })
        .await
        .unwrap();
    let active = app
        .store
        .create_subscription(&NewSubscription {
            property_id: property.property_id,
            component_id: component.component_id,
            start_date: date(2024, 1, 1),
            end_date: None,
            status: SubscriptionStatus::Active,
            requested_by: app.resident_id,
            approved_by: Some(app.admin_id),
        })
        .await
        .unwrap();

    let request = app
        .store
        .end_subscription_request(active.subscription_id, app.resident_id, date(2024, 6, 30))
        .await
        .unwrap()
        .expect("active row is ended");
    assert_eq!(request.status, SubscriptionStatus::Pending);
    assert_eq!(request.end_date, Some(date(2024, 6, 30)));
    assert_eq!(request.start_date, date(2024, 1, 1));

    let ended = app
        .store
        .find_subscription(active.subscription_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ended.status, SubscriptionStatus::Inactive);

    // A second call finds nothing active and writes nothing.
    let again = app
        .store
        .end_subscription_request(active.subscription_id, app.resident_id, date(2024, 6, 30))
        .await
        .unwrap();
    assert!(again.is_none());
    let rows = app
        .store
        .list_subscriptions_for_property(property.property_id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}
