//! Integration tests for expenses, recipients and the monthly cash summary.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Datelike, Utc};
use common::{decimal, spawn_app, As};
use iuran_service::models::PropertyType;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn summary_balances_verified_income_against_expenses() {
    let app = spawn_app();
    let today = Utc::now().date_naive();
    let property = app
        .seed_property("A", 1, PropertyType::Rumah, None, None)
        .await;

    app.pay(property.property_id, 1, 2024, dec!(100000), true).await;
    app.pay(property.property_id, 2, 2024, dec!(150000), true).await;
    // Pending money is not income yet.
    app.pay(property.property_id, 3, 2024, dec!(999999), false).await;

    for amount in ["40000", "35000"] {
        let (status, _) = app
            .post(
                "/admin/expenses",
                app.admin(),
                json!({ "description": "Gaji satpam", "amount": amount, "date": today }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, summary) = app
        .get(
            &format!(
                "/dashboard/financial?year={}&month={}",
                today.year(),
                today.month()
            ),
            As::Anonymous,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&summary["totalIncome"]), dec!(250000));
    assert_eq!(decimal(&summary["totalExpense"]), dec!(75000));
    assert_eq!(decimal(&summary["balance"]), dec!(175000));
    assert_eq!(summary["expenses"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn empty_month_has_zero_balance() {
    let app = spawn_app();
    let (status, summary) = app
        .get("/dashboard/financial?year=2020&month=2", As::Anonymous)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["month"], 2);
    assert_eq!(decimal(&summary["totalIncome"]), Decimal::ZERO);
    assert_eq!(decimal(&summary["balance"]), Decimal::ZERO);

    let (status, _) = app
        .get("/dashboard/financial?year=2020&month=13", As::Anonymous)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expenses_are_validated() {
    let app = spawn_app();

    let (status, _) = app
        .post(
            "/admin/expenses",
            app.admin(),
            json!({ "description": "Listrik", "amount": "-5", "date": "2024-05-01" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/admin/expenses",
            app.admin(),
            json!({ "description": "", "amount": "5000", "date": "2024-05-01" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .post(
            "/admin/expenses",
            app.admin(),
            json!({
                "recipientId": Uuid::new_v4(),
                "description": "Listrik",
                "amount": "5000",
                "date": "2024-05-01"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expenses_filter_by_date_range_newest_first() {
    let app = spawn_app();
    for date in ["2024-01-10", "2024-03-05", "2024-02-20"] {
        app.post(
            "/admin/expenses",
            app.admin(),
            json!({ "description": "Kebersihan", "amount": "10000", "date": date }),
        )
        .await;
    }

    let (status, listed) = app
        .get("/admin/expenses?from=2024-02-01&to=2024-03-31", app.admin())
        .await;
    assert_eq!(status, StatusCode::OK);
    let dates: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, vec!["2024-03-05", "2024-02-20"]);
}

#[tokio::test]
async fn deleting_recipient_keeps_its_expenses() {
    let app = spawn_app();
    let (status, recipient) = app
        .post(
            "/admin/recipients",
            app.admin(),
            json!({ "name": "CV Bersih", "type": "vendor" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let recipient_id = recipient["id"].as_str().unwrap().to_string();

    let (_, expense) = app
        .post(
            "/admin/expenses",
            app.admin(),
            json!({
                "recipientId": recipient_id,
                "description": "Angkut sampah",
                "amount": "200000",
                "date": "2024-04-01"
            }),
        )
        .await;
    assert_eq!(expense["recipientId"], recipient_id.as_str());

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/admin/recipients/{recipient_id}"),
            app.admin(),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listed) = app.get("/admin/expenses", app.admin()).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0]["recipientId"].is_null());

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/admin/recipients/{recipient_id}"),
            app.admin(),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recipient_name_is_required() {
    let app = spawn_app();
    let (status, _) = app
        .post("/admin/recipients", app.admin(), json!({ "name": "" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .post("/admin/recipients", app.admin(), json!({ "name": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
