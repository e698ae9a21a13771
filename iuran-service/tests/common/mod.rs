//! Common test utilities for iuran-service integration tests.
//!
//! Tests run against the in-memory store, so no database is needed. Seed helpers write
//! straight to the store; HTTP helpers drive the real router with `oneshot`.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use iuran_service::config::DuesConfig;
use iuran_service::models::{
    CreateProperty, Property, PropertyType, Tariff, TariffInput, TariffScope, TariffType,
    TransactionWithItems,
};
use iuran_service::services::{
    MemoryStore, PaymentItemInput, PropertyStore, Repositories, TariffStore,
};
use iuran_service::startup::{build_router, AppState};
use rust_decimal::Decimal;
use serde_json::Value;
use service_core::observability::init_test_tracing;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub fn init_tracing() {
    init_test_tracing("info,iuran_service=debug");
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

/// Test application wrapper.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub admin_id: Uuid,
    pub resident_id: Uuid,
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(DuesConfig::default())
}

pub fn spawn_app_with(dues: DuesConfig) -> TestApp {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let repos = Repositories::from_memory(store.clone());
    let state = AppState::new("iuran-service-test", repos, &dues, None);
    TestApp {
        state,
        store,
        admin_id: Uuid::new_v4(),
        resident_id: Uuid::new_v4(),
    }
}

/// Who is making an HTTP call.
#[derive(Clone, Copy)]
pub enum As {
    Anonymous,
    Admin(Uuid),
    Resident(Uuid),
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn admin(&self) -> As {
        As::Admin(self.admin_id)
    }

    pub fn resident(&self) -> As {
        As::Resident(self.resident_id)
    }

    pub async fn seed_property(
        &self,
        block: &str,
        number: i32,
        property_type: PropertyType,
        owner_id: Option<Uuid>,
        bast_date: Option<NaiveDate>,
    ) -> Property {
        self.store
            .create_property(&CreateProperty {
                block: block.to_string(),
                number,
                property_type,
                owner_id,
                bast_date,
            })
            .await
            .expect("seed property")
    }

    /// Insert a routine tariff without overlap checks.
    pub async fn seed_tariff(
        &self,
        amount: Decimal,
        valid_from: NaiveDate,
        valid_to: Option<NaiveDate>,
        scope: TariffScope,
    ) -> Tariff {
        self.store
            .create_tariff(&TariffInput {
                amount,
                valid_from,
                valid_to,
                property_type: scope,
                tariff_type: TariffType::Rutin,
                description: None,
            })
            .await
            .expect("seed tariff")
    }

    /// Record a single-item payment for `month/year` through the admin path.
    pub async fn pay(
        &self,
        property_id: Uuid,
        month: u32,
        year: i32,
        amount: Decimal,
        verified: bool,
    ) -> TransactionWithItems {
        self.state
            .payments
            .create_for_user(
                self.admin_id,
                self.resident_id,
                vec![PaymentItemInput {
                    property_id,
                    month,
                    year,
                    amount,
                }],
                None,
                verified,
            )
            .await
            .expect("seed payment")
    }

    /// Send a request through the router and decode the JSON body (Null when empty).
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        who: As,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        match who {
            As::Anonymous => {}
            As::Admin(id) => {
                builder = builder
                    .header("X-User-ID", id.to_string())
                    .header("X-User-Role", "admin");
            }
            As::Resident(id) => {
                builder = builder
                    .header("X-User-ID", id.to_string())
                    .header("X-User-Role", "warga");
            }
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self.router().oneshot(request).await.expect("router call");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, who: As) -> (StatusCode, Value) {
        self.call(Method::GET, uri, who, None).await
    }

    pub async fn post(&self, uri: &str, who: As, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, who, Some(body)).await
    }

    pub async fn put(&self, uri: &str, who: As, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, who, Some(body)).await
    }
}

/// Decimal fields serialize as JSON strings.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}
