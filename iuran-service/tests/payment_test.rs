//! Integration tests for payment submission and verification.

mod common;

use axum::http::StatusCode;
use common::{decimal, spawn_app, As};
use iuran_service::models::{PropertyType, TransactionStatus};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn resident_submits_multi_item_payment_as_pending() {
    let app = spawn_app();
    let home = app
        .seed_property("A", 1, PropertyType::Rumah, Some(app.resident_id), None)
        .await;
    let plot = app
        .seed_property("A", 2, PropertyType::Tanah, Some(app.resident_id), None)
        .await;

    let (status, body) = app
        .post(
            "/payments",
            app.resident(),
            json!({
                "items": [
                    { "propertyId": home.property_id, "month": 1, "year": 2024, "amount": "100000" },
                    { "propertyId": home.property_id, "month": 2, "year": 2024, "amount": "100000" },
                    { "propertyId": plot.property_id, "month": 1, "year": 2024, "amount": "50000" }
                ],
                "proofImage": "uploads/proof.jpg"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "pending");
    assert_eq!(decimal(&body["totalAmount"]), dec!(250000));
    assert_eq!(body["items"].as_array().unwrap().len(), 3);

    let (_, mine) = app.get("/payments/my", app.resident()).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn paying_for_someone_elses_property_writes_nothing() {
    let app = spawn_app();
    let own = app
        .seed_property("B", 1, PropertyType::Rumah, Some(app.resident_id), None)
        .await;
    let other = app
        .seed_property("B", 2, PropertyType::Rumah, Some(Uuid::new_v4()), None)
        .await;

    let (status, _) = app
        .post(
            "/payments",
            app.resident(),
            json!({
                "items": [
                    { "propertyId": own.property_id, "month": 1, "year": 2024, "amount": "100000" },
                    { "propertyId": other.property_id, "month": 1, "year": 2024, "amount": "100000" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let listed = app
        .state
        .payments
        .list_for_user(app.resident_id, None)
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn malformed_items_are_rejected() {
    let app = spawn_app();
    let own = app
        .seed_property("B", 3, PropertyType::Rumah, Some(app.resident_id), None)
        .await;

    let (status, _) = app
        .post("/payments", app.resident(), json!({ "items": [] }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .post(
            "/payments",
            app.resident(),
            json!({ "items": [{ "propertyId": own.property_id, "month": 13, "year": 2024, "amount": "1" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .post(
            "/payments",
            app.resident(),
            json!({ "items": [{ "propertyId": own.property_id, "month": 1, "year": 2024, "amount": "0" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/payments",
            app.resident(),
            json!({ "items": [{ "propertyId": Uuid::new_v4(), "month": 1, "year": 2024, "amount": "1" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn transaction_is_decided_exactly_once() {
    let app = spawn_app();
    let property = app
        .seed_property("C", 1, PropertyType::Rumah, Some(app.resident_id), None)
        .await;
    let created = app
        .pay(property.property_id, 5, 2024, dec!(100000), false)
        .await;
    let uri = format!(
        "/admin/payments/{}/verify",
        created.transaction.transaction_id
    );

    let (status, body) = app
        .put(&uri, app.admin(), json!({ "status": "verified" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "verified");
    assert_eq!(body["verifiedBy"], app.admin_id.to_string());

    let (status, _) = app
        .put(&uri, app.admin(), json!({ "status": "rejected" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let stored = app
        .state
        .payments
        .get_transaction(created.transaction.transaction_id)
        .await
        .unwrap();
    assert_eq!(stored.transaction.status, TransactionStatus::Verified);
}

#[tokio::test]
async fn verify_rejects_pending_target_and_unknown_transaction() {
    let app = spawn_app();
    let property = app
        .seed_property("C", 2, PropertyType::Rumah, None, None)
        .await;
    let created = app
        .pay(property.property_id, 5, 2024, dec!(100000), false)
        .await;

    let (status, _) = app
        .put(
            &format!(
                "/admin/payments/{}/verify",
                created.transaction.transaction_id
            ),
            app.admin(),
            json!({ "status": "pending" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put(
            &format!("/admin/payments/{}/verify", Uuid::new_v4()),
            app.admin(),
            json!({ "status": "verified" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pending_queue_lists_oldest_first() {
    let app = spawn_app();
    let property = app
        .seed_property("D", 1, PropertyType::Rumah, None, None)
        .await;
    let first = app
        .pay(property.property_id, 1, 2024, dec!(100000), false)
        .await;
    let second = app
        .pay(property.property_id, 2, 2024, dec!(100000), false)
        .await;
    app.pay(property.property_id, 3, 2024, dec!(100000), true)
        .await;

    let (status, queue) = app.get("/admin/payments/pending", app.admin()).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = queue
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            first.transaction.transaction_id.to_string(),
            second.transaction.transaction_id.to_string()
        ]
    );
}

#[tokio::test]
async fn admin_can_record_verified_payment_for_resident() {
    let app = spawn_app();
    let resident = Uuid::new_v4();
    let property = app
        .seed_property("E", 1, PropertyType::Rumah, Some(resident), None)
        .await;

    let (status, body) = app
        .post(
            "/admin/payments/create",
            app.admin(),
            json!({
                "userId": resident,
                "items": [{ "propertyId": property.property_id, "month": 6, "year": 2024, "amount": "100000" }],
                "autoVerify": true
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "verified");
    assert_eq!(body["userId"], resident.to_string());

    let (status, body) = app
        .post(
            "/admin/payments/create",
            app.admin(),
            json!({
                "userId": resident,
                "items": [{ "propertyId": property.property_id, "month": 7, "year": 2024, "amount": "100000" }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn residents_only_read_their_own_transactions() {
    let app = spawn_app();
    let property = app
        .seed_property("F", 1, PropertyType::Rumah, Some(app.resident_id), None)
        .await;
    let created = app
        .pay(property.property_id, 1, 2024, dec!(100000), false)
        .await;
    let uri = format!("/payments/{}", created.transaction.transaction_id);

    let (status, body) = app.get(&uri, app.resident()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (status, _) = app.get(&uri, As::Resident(Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get(&uri, app.admin()).await;
    assert_eq!(status, StatusCode::OK);
}
