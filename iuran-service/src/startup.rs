//! Application startup and lifecycle management.

use crate::config::{DuesConfig, IuranConfig};
use crate::handlers::{self, components, dashboard, finance, payments, properties, tariffs};
use crate::services::{
    init_metrics, DashboardService, Database, FinanceService, PaymentService, PropertyService,
    ReconciliationService, Repositories, SubscriptionService, TariffService,
};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::{request_id_middleware, request_id_of};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service_name: Arc<str>,
    pub properties: PropertyService,
    pub tariffs: TariffService,
    pub payments: PaymentService,
    pub reconciliation: ReconciliationService,
    pub dashboard: DashboardService,
    pub finance: FinanceService,
    pub subscriptions: SubscriptionService,
    /// Present when backed by Postgres; used by the readiness probe.
    pub db: Option<Arc<Database>>,
}

impl AppState {
    /// Wire every service against one set of stores.
    pub fn new(
        service_name: &str,
        repos: Repositories,
        dues: &DuesConfig,
        db: Option<Arc<Database>>,
    ) -> Self {
        Self {
            service_name: Arc::from(service_name),
            properties: PropertyService::new(repos.properties.clone()),
            tariffs: TariffService::new(repos.tariffs.clone(), dues.tariff_allow_overlap),
            payments: PaymentService::new(repos.properties.clone(), repos.ledger.clone()),
            reconciliation: ReconciliationService::new(
                repos.properties.clone(),
                repos.tariffs.clone(),
                repos.ledger.clone(),
            ),
            dashboard: DashboardService::new(
                repos.properties.clone(),
                repos.tariffs.clone(),
                repos.ledger.clone(),
                dues.arrears_max_months,
            ),
            finance: FinanceService::new(repos.expenses.clone(), repos.ledger.clone()),
            subscriptions: SubscriptionService::new(repos.properties, repos.components),
            db,
        }
    }
}

/// Build the full HTTP router with tracing, metrics and request-id layers.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/dashboard/properties/all", get(dashboard::all_properties))
        .route("/dashboard/property/search", get(dashboard::search_property))
        .route("/dashboard/overview/:block/:number", get(dashboard::overview))
        .route("/dashboard/detail/:block/:number", get(dashboard::detail_history))
        .route("/dashboard/financial", get(dashboard::financial_summary))
        .route(
            "/reconciliation/:property_id/:year/:month",
            get(tariffs::reconcile_month),
        )
        .route("/tariffs/active", get(tariffs::active_tariff))
        .route("/components/available", get(components::available_components));

    let resident = Router::new()
        .route("/payments", post(payments::submit_payment))
        .route("/payments/my", get(payments::my_payments))
        .route("/payments/:id", get(payments::get_transaction))
        .route("/properties/my", get(properties::my_properties))
        .route("/components/subscribe", post(components::subscribe))
        .route(
            "/components/unsubscribe/:subscription_id",
            post(components::unsubscribe),
        )
        .route(
            "/components/subscriptions/:property_id",
            get(components::property_subscriptions),
        )
        .route("/components/cost/:property_id", get(components::component_cost));

    let admin = Router::new()
        .route("/payments/pending", get(payments::pending_payments))
        .route("/payments/:id/verify", put(payments::verify_payment))
        .route("/payments/create", post(payments::create_payment_for_user))
        .route(
            "/tariffs",
            get(tariffs::list_tariffs).post(tariffs::add_tariff),
        )
        .route(
            "/tariffs/:id",
            put(tariffs::update_tariff).delete(tariffs::delete_tariff),
        )
        .route(
            "/properties",
            get(properties::list_properties).post(properties::create_property),
        )
        .route("/properties/:id/type", put(properties::update_type))
        .route("/properties/:id/bast", put(properties::update_bast))
        .route("/properties/:id/owner", put(properties::update_owner))
        .route(
            "/properties/:id/users",
            get(properties::property_users).post(properties::link_property_user),
        )
        .route(
            "/property-users/:id",
            put(properties::update_property_user).delete(properties::delete_property_user),
        )
        .route(
            "/expenses",
            get(finance::list_expenses).post(finance::add_expense),
        )
        .route(
            "/expenses/:id",
            put(finance::update_expense).delete(finance::delete_expense),
        )
        .route(
            "/recipients",
            get(finance::list_recipients).post(finance::add_recipient),
        )
        .route(
            "/recipients/:id",
            put(finance::update_recipient).delete(finance::delete_recipient),
        )
        .route(
            "/components",
            get(components::list_components).post(components::add_component),
        )
        .route(
            "/components/:id",
            get(components::get_component).put(components::update_component),
        )
        .route("/component-rates", post(components::add_rate))
        .route("/component-rates/:id", put(components::update_rate))
        .route(
            "/component-requests/pending",
            get(components::pending_requests),
        )
        .route(
            "/component-requests/:id/approve",
            post(components::approve_request),
        )
        .route(
            "/component-requests/:id/reject",
            post(components::reject_request),
        )
        .route(
            "/component-subscriptions/bulk",
            post(components::bulk_subscriptions),
        )
        .route(
            "/component-subscriptions/active",
            get(components::active_subscriptions),
        );

    public
        .merge(resident)
        .nest("/admin", admin)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    request_id = %request_id_of(request),
                    method = %request.method(),
                    uri = %request.uri(),
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Connect to Postgres, apply migrations and bind the listener.
    pub async fn build(config: IuranConfig) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        let db = Arc::new(db);
        let repos = Repositories::postgres(db.as_ref().clone());
        let state = AppState::new(&config.service_name, repos, &config.dues, Some(db));

        let addr: SocketAddr = format!("{}:{}", config.common.host, config.common.port)
            .parse()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("invalid listen address: {}", e))
            })?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Iuran service listener bound");

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run_until_stopped(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
