//! Integration tests for the public dashboard: the six-month grid, arrears and history.

mod common;

use axum::http::StatusCode;
use common::{date, decimal, spawn_app, spawn_app_with, As};
use iuran_service::config::DuesConfig;
use iuran_service::models::{PropertyType, TariffScope};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

fn row<'a>(grid: &'a Value, block: &str, number: i64) -> &'a Value {
    grid["properties"]
        .as_array()
        .expect("properties array")
        .iter()
        .find(|p| p["block"] == block && p["number"] == number)
        .expect("property row present")
}

#[tokio::test]
async fn empty_registry_gives_empty_grid() {
    let app = spawn_app();
    let (status, grid) = app
        .get(
            "/dashboard/properties/all?startMonth=3&startYear=2024",
            As::Anonymous,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{grid}");
    assert_eq!(grid["properties"], serde_json::json!([]));

    let period = &grid["period"];
    assert_eq!(period["startMonth"], 3);
    assert_eq!(period["endMonth"], 8);
    assert_eq!(period["endYear"], 2024);
    assert_eq!(period["months"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn window_wraps_into_next_year() {
    let app = spawn_app();
    let (status, grid) = app
        .get(
            "/dashboard/properties/all?startMonth=11&startYear=2024",
            As::Anonymous,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let period = &grid["period"];
    assert_eq!(period["startMonth"], 11);
    assert_eq!(period["startYear"], 2024);
    assert_eq!(period["endMonth"], 4);
    assert_eq!(period["endYear"], 2025);

    let months: Vec<(i64, i64)> = period["months"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| (m["month"].as_i64().unwrap(), m["year"].as_i64().unwrap()))
        .collect();
    assert_eq!(
        months,
        vec![(11, 2024), (12, 2024), (1, 2025), (2, 2025), (3, 2025), (4, 2025)]
    );
    assert_eq!(period["previous"]["month"], 5);
    assert_eq!(period["next"]["month"], 5);
    assert_eq!(period["next"]["year"], 2025);
}

#[tokio::test]
async fn overall_status_needs_every_month_settled() {
    let app = spawn_app();
    app.seed_tariff(dec!(100000), date(2024, 1, 1), None, TariffScope::All)
        .await;
    let paid = app
        .seed_property("A", 1, PropertyType::Rumah, None, None)
        .await;
    let almost = app
        .seed_property("A", 2, PropertyType::Rumah, None, None)
        .await;

    for month in 1..=6 {
        app.pay(paid.property_id, month, 2024, dec!(100000), true).await;
    }
    for month in 1..=5 {
        app.pay(almost.property_id, month, 2024, dec!(100000), true).await;
    }
    app.pay(almost.property_id, 6, 2024, dec!(100000), false).await;

    let (status, grid) = app
        .get(
            "/dashboard/properties/all?startMonth=1&startYear=2024",
            As::Anonymous,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let settled = row(&grid, "A", 1);
    assert_eq!(settled["status"], "lunas");
    assert_eq!(settled["statusText"], "Lunas");
    assert_eq!(settled["paidMonths"], 6);

    let pending = row(&grid, "A", 2);
    assert_eq!(pending["status"], "belum_lunas");
    assert_eq!(pending["paidMonths"], 5);
    assert_eq!(pending["monthlyStatus"][5]["status"], "menunggu_verifikasi");
    assert_eq!(decimal(&pending["totalDebt"]), Decimal::ZERO);
}

#[tokio::test]
async fn grid_rows_are_sorted_by_block_then_number() {
    let app = spawn_app();
    for (block, number) in [("B", 1), ("A", 10), ("A", 2)] {
        app.seed_property(block, number, PropertyType::Rumah, None, None)
            .await;
    }

    let (_, grid) = app.get("/dashboard/properties/all", As::Anonymous).await;
    let order: Vec<(String, i64)> = grid["properties"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| {
            (
                p["block"].as_str().unwrap().to_string(),
                p["number"].as_i64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![
            ("A".to_string(), 2),
            ("A".to_string(), 10),
            ("B".to_string(), 1)
        ]
    );
}

#[tokio::test]
async fn arrears_count_from_month_after_handover() {
    let app = spawn_app();
    app.seed_tariff(dec!(100000), date(2024, 1, 1), None, TariffScope::All)
        .await;
    app.seed_property("C", 3, PropertyType::Rumah, None, Some(date(2024, 1, 15)))
        .await;

    let (_, body) = app
        .get(
            "/dashboard/overview/C/3?startMonth=1&startYear=2024",
            As::Anonymous,
        )
        .await;
    assert_eq!(body["bastStatus"], "Sudah BAST");
    assert_eq!(body["monthlyStatus"][0]["status"], "n/a");
    assert_eq!(body["paidMonths"], 0);
    assert_eq!(decimal(&body["totalDebt"]), dec!(500000));
    assert_eq!(decimal(&body["totalDebtFromBast"]), dec!(500000));
    assert_eq!(body["totalMonthsFromBast"], 5);
    assert_eq!(body["bastLookbackCapped"], false);
}

#[tokio::test]
async fn property_without_handover_has_no_arrears() {
    let app = spawn_app();
    app.seed_tariff(dec!(100000), date(2024, 1, 1), None, TariffScope::All)
        .await;
    app.seed_property("C", 4, PropertyType::Rumah, None, None)
        .await;

    let (_, body) = app
        .get(
            "/dashboard/overview/C/4?startMonth=1&startYear=2024",
            As::Anonymous,
        )
        .await;
    assert_eq!(body["bastStatus"], "Belum BAST");
    assert_eq!(decimal(&body["totalDebt"]), dec!(600000));
    assert_eq!(decimal(&body["totalDebtFromBast"]), Decimal::ZERO);
    assert_eq!(body["totalMonthsFromBast"], 0);
}

#[tokio::test]
async fn long_arrears_are_capped_and_flagged() {
    let app = spawn_app_with(DuesConfig {
        arrears_max_months: 12,
        ..DuesConfig::default()
    });
    app.seed_tariff(dec!(100000), date(2024, 1, 1), None, TariffScope::All)
        .await;
    app.seed_property("D", 1, PropertyType::Rumah, None, Some(date(2000, 1, 10)))
        .await;

    let (status, body) = app
        .get(
            "/dashboard/overview/D/1?startMonth=1&startYear=2024",
            As::Anonymous,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bastLookbackCapped"], true);
    assert_eq!(body["totalMonthsFromBast"], 12);
    // Jul-Dec 2023 predate the first tariff and owe nothing.
    assert_eq!(decimal(&body["totalDebtFromBast"]), dec!(600000));
}

#[tokio::test]
async fn search_and_overview_report_missing_property() {
    let app = spawn_app();
    let (status, _) = app
        .get("/dashboard/property/search?block=Z&number=9", As::Anonymous)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/dashboard/overview/Z/9", As::Anonymous).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.seed_property("E", 5, PropertyType::Tanah, None, None)
        .await;
    let (status, body) = app
        .get("/dashboard/property/search?block=E&number=5", As::Anonymous)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "tanah");
}

#[tokio::test]
async fn detail_history_filters_by_verification() {
    let app = spawn_app();
    app.seed_tariff(dec!(100000), date(2024, 1, 1), None, TariffScope::All)
        .await;
    let property = app
        .seed_property("F", 1, PropertyType::Rumah, None, None)
        .await;
    app.pay(property.property_id, 3, 2024, dec!(100000), true).await;
    app.pay(property.property_id, 4, 2024, dec!(50000), false).await;

    let (_, all) = app
        .get("/dashboard/detail/F/1?year=2024", As::Anonymous)
        .await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, paid) = app
        .get("/dashboard/detail/F/1?year=2024&status=paid", As::Anonymous)
        .await;
    let paid = paid.as_array().unwrap();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0]["month"], 3);
    assert_eq!(paid[0]["isValid"], true);

    let (_, unpaid) = app
        .get("/dashboard/detail/F/1?year=2024&status=unpaid", As::Anonymous)
        .await;
    let unpaid = unpaid.as_array().unwrap();
    assert_eq!(unpaid.len(), 1);
    assert_eq!(unpaid[0]["isValid"], false);
    assert_eq!(decimal(&unpaid[0]["expectedAmount"]), dec!(100000));
}
