//! Integration tests for tariff components and property subscriptions.

mod common;

use axum::http::StatusCode;
use common::{decimal, spawn_app, As, TestApp};
use iuran_service::models::PropertyType;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

/// Create a component with one all-types rate from 2024-01-01 and return its id.
async fn component_with_rate(app: &TestApp, name: &str, amount: &str) -> String {
    let (status, component) = app
        .post("/admin/components", app.admin(), json!({ "name": name }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{component}");
    let id = component["id"].as_str().unwrap().to_string();

    let (status, rate) = app
        .post(
            "/admin/component-rates",
            app.admin(),
            json!({ "componentId": id, "amount": amount, "validFrom": "2024-01-01" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{rate}");
    id
}

async fn request(
    app: &TestApp,
    property_id: Uuid,
    component_id: &str,
    start: &str,
) -> (StatusCode, Value) {
    app.post(
        "/components/subscribe",
        app.resident(),
        json!({ "propertyId": property_id, "componentId": component_id, "startDate": start }),
    )
    .await
}

#[tokio::test]
async fn request_then_approve_activates_subscription() {
    let app = spawn_app();
    let property = app
        .seed_property("A", 1, PropertyType::Rumah, Some(app.resident_id), None)
        .await;
    let water = component_with_rate(&app, "Air", "20000").await;

    let (status, pending) = request(&app, property.property_id, &water, "2024-01-01").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(pending["status"], "pending");
    let id = pending["id"].as_str().unwrap();

    let (_, queue) = app
        .get("/admin/component-requests/pending", app.admin())
        .await;
    assert_eq!(queue.as_array().unwrap().len(), 1);

    let (status, approved) = app
        .post(
            &format!("/admin/component-requests/{id}/approve"),
            app.admin(),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "active");
    assert_eq!(approved["approvedBy"], app.admin_id.to_string());

    let (status, _) = app
        .post(
            &format!("/admin/component-requests/{id}/reject"),
            app.admin(),
            json!({ "reason": "too late" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = request(&app, property.property_id, &water, "2024-03-01").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn rejection_needs_a_reason() {
    let app = spawn_app();
    let property = app
        .seed_property("A", 2, PropertyType::Rumah, None, None)
        .await;
    let security = component_with_rate(&app, "Keamanan", "30000").await;
    let (_, pending) = request(&app, property.property_id, &security, "2024-01-01").await;
    let uri = format!(
        "/admin/component-requests/{}/reject",
        pending["id"].as_str().unwrap()
    );

    let (status, _) = app.post(&uri, app.admin(), json!({ "reason": "" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, rejected) = app
        .post(&uri, app.admin(), json!({ "reason": "outside service area" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "rejected");
    assert_eq!(rejected["rejectionReason"], "outside service area");
}

#[tokio::test]
async fn inactive_component_cannot_be_requested() {
    let app = spawn_app();
    let property = app
        .seed_property("A", 3, PropertyType::Rumah, None, None)
        .await;
    let (_, component) = app
        .post(
            "/admin/components",
            app.admin(),
            json!({ "name": "Sampah", "isActive": false }),
        )
        .await;
    let id = component["id"].as_str().unwrap();

    let (_, available) = app.get("/components/available", As::Anonymous).await;
    assert!(available.as_array().unwrap().is_empty());

    let (status, _) = request(&app, property.property_id, id, "2024-01-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsubscribe_deactivates_and_queues_end_request() {
    let app = spawn_app();
    let property = app
        .seed_property("B", 1, PropertyType::Rumah, Some(app.resident_id), None)
        .await;
    let water = component_with_rate(&app, "Air", "20000").await;
    let (_, pending) = request(&app, property.property_id, &water, "2024-01-01").await;
    let id = pending["id"].as_str().unwrap().to_string();
    app.post(
        &format!("/admin/component-requests/{id}/approve"),
        app.admin(),
        json!({}),
    )
    .await;

    let uri = format!("/components/unsubscribe/{id}");
    let (status, _) = app
        .post(&uri, As::Resident(Uuid::new_v4()), json!({ "endDate": "2024-06-30" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(&uri, app.resident(), json!({ "endDate": "2023-12-31" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, end_request) = app
        .post(&uri, app.resident(), json!({ "endDate": "2024-06-30" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{end_request}");
    assert_eq!(end_request["status"], "pending");
    assert_eq!(end_request["endDate"], "2024-06-30");

    let (_, rows) = app
        .get(
            &format!("/components/subscriptions/{}", property.property_id),
            app.resident(),
        )
        .await;
    let statuses: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["status"].as_str().unwrap())
        .collect();
    assert!(statuses.contains(&"inactive"));
    assert!(statuses.contains(&"pending"));

    let (status, _) = app
        .post(&uri, app.resident(), json!({ "endDate": "2024-06-30" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn bulk_assign_and_remove_report_each_property() {
    let app = spawn_app();
    let security = component_with_rate(&app, "Keamanan", "30000").await;
    let first = app
        .seed_property("C", 1, PropertyType::Rumah, None, None)
        .await;
    let second = app
        .seed_property("C", 2, PropertyType::Tanah, None, None)
        .await;
    let missing = Uuid::new_v4();

    let bulk = |action: &str, ids: Vec<Uuid>| {
        json!({
            "propertyIds": ids,
            "componentId": security,
            "action": action,
            "startDate": "2024-01-01"
        })
    };

    let (status, result) = app
        .post(
            "/admin/component-subscriptions/bulk",
            app.admin(),
            bulk("assign", vec![first.property_id, missing]),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["processed"], 2);
    assert_eq!(result["details"][0]["status"], "assigned");
    assert!(result["details"][1]["error"].is_string());

    let (_, result) = app
        .post(
            "/admin/component-subscriptions/bulk",
            app.admin(),
            bulk("assign", vec![first.property_id, second.property_id]),
        )
        .await;
    assert_eq!(result["details"][0]["status"], "already_active");
    assert_eq!(result["details"][1]["status"], "assigned");

    let (_, result) = app
        .post(
            "/admin/component-subscriptions/bulk",
            app.admin(),
            bulk("remove", vec![first.property_id]),
        )
        .await;
    assert_eq!(result["details"][0]["status"], "removed");

    let (_, result) = app
        .post(
            "/admin/component-subscriptions/bulk",
            app.admin(),
            bulk("assign", vec![first.property_id]),
        )
        .await;
    assert_eq!(result["details"][0]["status"], "reactivated");

    let (_, active) = app
        .get("/admin/component-subscriptions/active", app.admin())
        .await;
    assert_eq!(active.as_array().unwrap().len(), 2);

    let (status, _) = app
        .post(
            "/admin/component-subscriptions/bulk",
            app.admin(),
            bulk("assign", vec![]),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn component_cost_sums_rates_for_property_type() {
    let app = spawn_app();
    let property = app
        .seed_property("D", 1, PropertyType::Rumah, Some(app.resident_id), None)
        .await;
    let water = component_with_rate(&app, "Air", "20000").await;
    let security = component_with_rate(&app, "Keamanan", "30000").await;

    let (_, lamp) = app
        .post("/admin/components", app.admin(), json!({ "name": "Lampu" }))
        .await;
    let lamp = lamp["id"].as_str().unwrap().to_string();
    app.post(
        "/admin/component-rates",
        app.admin(),
        json!({ "componentId": lamp, "amount": "5000", "validFrom": "2024-01-01", "propertyType": "tanah" }),
    )
    .await;

    app.post(
        "/admin/component-subscriptions/bulk",
        app.admin(),
        json!({
            "propertyIds": [property.property_id],
            "componentId": water,
            "action": "assign",
            "startDate": "2024-01-01"
        }),
    )
    .await;
    for component in [&security, &lamp] {
        app.post(
            "/admin/component-subscriptions/bulk",
            app.admin(),
            json!({
                "propertyIds": [property.property_id],
                "componentId": component,
                "action": "assign",
                "startDate": "2024-03-01"
            }),
        )
        .await;
    }

    let uri = format!("/components/cost/{}?date=2024-06-15", property.property_id);
    let (status, cost) = app.get(&uri, app.resident()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&cost["totalCost"]), dec!(50000));
    assert_eq!(cost["breakdown"].as_array().unwrap().len(), 2);

    let uri = format!("/components/cost/{}?date=2024-02-01", property.property_id);
    let (_, cost) = app.get(&uri, app.resident()).await;
    assert_eq!(decimal(&cost["totalCost"]), dec!(20000));
}

#[tokio::test]
async fn component_detail_lists_rates() {
    let app = spawn_app();
    let water = component_with_rate(&app, "Air", "20000").await;

    let (status, detail) = app
        .get(&format!("/admin/components/{water}"), app.admin())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["name"], "Air");
    assert_eq!(detail["rates"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .post(
            "/admin/component-rates",
            app.admin(),
            json!({ "componentId": water, "amount": "0", "validFrom": "2024-01-01" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get(&format!("/admin/components/{}", Uuid::new_v4()), app.admin())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
