//! Services module for iuran-service.

pub mod dashboard;
pub mod database;
pub mod finance;
pub mod memory;
pub mod metrics;
pub mod payment;
pub mod property;
pub mod reconciliation;
pub mod store;
pub mod subscription;
pub mod tariff;

pub use dashboard::{DashboardService, HistoryFilter};
pub use database::Database;
pub use finance::{FinanceService, FinancialSummary};
pub use memory::MemoryStore;
pub use metrics::{
    get_metrics, init_metrics, record_error, record_payment_submitted,
    record_subscription_operation, record_tariff_operation, record_verification,
};
pub use payment::{PaymentItemInput, PaymentService};
pub use property::PropertyService;
pub use reconciliation::{MonthStatus, MonthlyStatus, ReconciliationService, reconcile};
pub use store::{
    ComponentStore, ExpenseStore, PaymentLedger, PropertyStore, Repositories, TariffStore,
};
pub use subscription::{BulkAction, BulkOutcome, BulkRequest, SubscriptionService};
pub use tariff::{TariffService, resolve_tariff};
