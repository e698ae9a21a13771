//! Monthly reconciliation: expected dues against verified and pending payments.

use super::store::{PaymentLedger, PropertyStore, TariffStore};
use super::tariff::resolve_tariff;
use crate::models::{MonthYear, PeriodSum, Property, Tariff, TariffType, TransactionStatus};
use anyhow::anyhow;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Outcome of reconciling one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonthStatus {
    #[serde(rename = "lunas")]
    Lunas,
    #[serde(rename = "menunggu_verifikasi")]
    MenungguVerifikasi,
    #[serde(rename = "belum_lunas")]
    BelumLunas,
    /// The month is at or before the property's handover and owes nothing.
    #[serde(rename = "n/a")]
    NotApplicable,
}

impl MonthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonthStatus::Lunas => "lunas",
            MonthStatus::MenungguVerifikasi => "menunggu_verifikasi",
            MonthStatus::BelumLunas => "belum_lunas",
            MonthStatus::NotApplicable => "n/a",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStatus {
    pub month: u32,
    pub year: i32,
    pub status: MonthStatus,
    pub expected_amount: Decimal,
    pub paid_amount: Decimal,
    pub pending_amount: Decimal,
    pub debt: Decimal,
}

/// Verified, pending and rejected item sums for one property-month.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeriodSums {
    pub verified: Decimal,
    pub pending: Decimal,
    pub rejected: Decimal,
}

impl PeriodSums {
    fn add(&mut self, status: TransactionStatus, amount: Decimal) {
        match status {
            TransactionStatus::Verified => self.verified += amount,
            TransactionStatus::Pending => self.pending += amount,
            TransactionStatus::Rejected => self.rejected += amount,
        }
    }
}

/// Decide the status of one month.
///
/// `expected` is `None` when no tariff applies, which counts as zero. A month at or before
/// the handover month (`bast_covers`) is not applicable regardless of payments.
pub fn reconcile(
    period: MonthYear,
    expected: Option<Decimal>,
    sums: PeriodSums,
    bast_covers: bool,
) -> MonthlyStatus {
    let expected_amount = expected.unwrap_or(Decimal::ZERO);
    let mut result = MonthlyStatus {
        month: period.month(),
        year: period.year(),
        status: MonthStatus::BelumLunas,
        expected_amount,
        paid_amount: sums.verified,
        pending_amount: sums.pending,
        debt: Decimal::ZERO,
    };

    if bast_covers {
        result.status = MonthStatus::NotApplicable;
        result.expected_amount = Decimal::ZERO;
    } else if sums.verified >= expected_amount {
        result.status = MonthStatus::Lunas;
    } else if sums.pending > Decimal::ZERO {
        result.status = MonthStatus::MenungguVerifikasi;
    } else {
        result.debt = expected_amount - sums.verified;
    }
    result
}

/// Whether `property`'s handover date puts `period` out of scope.
pub fn bast_covers(property: &Property, period: MonthYear) -> bool {
    property
        .bast_date
        .is_some_and(|bast| bast >= period.first_day())
}

/// In-memory index of grouped payment sums, built from one ledger query.
#[derive(Debug, Default)]
pub struct PaymentBook {
    sums: HashMap<(Uuid, MonthYear), PeriodSums>,
}

impl PaymentBook {
    pub fn from_sums(rows: impl IntoIterator<Item = PeriodSum>) -> Self {
        let mut sums: HashMap<(Uuid, MonthYear), PeriodSums> = HashMap::new();
        for row in rows {
            let Some(period) = u32::try_from(row.month)
                .ok()
                .and_then(|month| MonthYear::new(month, row.year))
            else {
                continue;
            };
            sums.entry((row.property_id, period))
                .or_default()
                .add(row.status, row.total);
        }
        Self { sums }
    }

    pub fn get(&self, property_id: Uuid, period: MonthYear) -> PeriodSums {
        self.sums
            .get(&(property_id, period))
            .copied()
            .unwrap_or_default()
    }
}

/// Reconcile one cell using preloaded tariffs and payment sums.
pub fn reconcile_cell(
    property: &Property,
    period: MonthYear,
    tariffs: &[Tariff],
    book: &PaymentBook,
) -> MonthlyStatus {
    let expected = resolve_tariff(
        tariffs,
        period.first_day(),
        property.property_type,
        TariffType::Rutin,
    )
    .map(|t| t.amount);
    reconcile(
        period,
        expected,
        book.get(property.property_id, period),
        bast_covers(property, period),
    )
}

/// Point reconciliation of a single (property, month), backed by the stores.
#[derive(Clone)]
pub struct ReconciliationService {
    properties: Arc<dyn PropertyStore>,
    tariffs: Arc<dyn TariffStore>,
    ledger: Arc<dyn PaymentLedger>,
}

impl ReconciliationService {
    pub fn new(
        properties: Arc<dyn PropertyStore>,
        tariffs: Arc<dyn TariffStore>,
        ledger: Arc<dyn PaymentLedger>,
    ) -> Self {
        Self {
            properties,
            tariffs,
            ledger,
        }
    }

    #[instrument(skip(self), fields(property_id = %property_id, period = %period))]
    pub async fn reconcile_month(
        &self,
        property_id: Uuid,
        period: MonthYear,
    ) -> Result<MonthlyStatus, AppError> {
        let property = self
            .properties
            .find_property(property_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("Property {} not found", property_id)))?;

        let expected = self
            .tariffs
            .find_active_for_date(period.first_day(), property.property_type, TariffType::Rutin)
            .await?
            .map(|t| t.amount);
        let rows = self
            .ledger
            .period_sums(Some(std::slice::from_ref(&property_id)), period, period)
            .await?;
        let sums = PaymentBook::from_sums(rows).get(property_id, period);

        let status = reconcile(period, expected, sums, bast_covers(&property, period));
        debug!(status = status.status.as_str(), debt = %status.debt, "Month reconciled");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn period(month: u32, year: i32) -> MonthYear {
        MonthYear::new(month, year).unwrap()
    }

    #[test]
    fn partial_payment_leaves_debt() {
        let sums = PeriodSums {
            verified: dec!(50000),
            ..Default::default()
        };
        let got = reconcile(period(3, 2024), Some(dec!(100000)), sums, false);
        assert_eq!(got.status, MonthStatus::BelumLunas);
        assert_eq!(got.debt, dec!(50000));
    }

    #[test]
    fn pending_payment_is_not_debt() {
        let sums = PeriodSums {
            pending: dec!(100000),
            ..Default::default()
        };
        let got = reconcile(period(3, 2024), Some(dec!(100000)), sums, false);
        assert_eq!(got.status, MonthStatus::MenungguVerifikasi);
        assert_eq!(got.debt, Decimal::ZERO);
        assert_eq!(got.pending_amount, dec!(100000));
    }

    #[test]
    fn no_tariff_means_paid() {
        let got = reconcile(period(1, 2020), None, PeriodSums::default(), false);
        assert_eq!(got.status, MonthStatus::Lunas);
        assert_eq!(got.expected_amount, Decimal::ZERO);
    }

    #[test]
    fn rejected_payments_count_nowhere() {
        let sums = PeriodSums {
            rejected: dec!(100000),
            ..Default::default()
        };
        let got = reconcile(period(3, 2024), Some(dec!(100000)), sums, false);
        assert_eq!(got.status, MonthStatus::BelumLunas);
        assert_eq!(got.paid_amount, Decimal::ZERO);
        assert_eq!(got.debt, dec!(100000));
    }

    #[test]
    fn overpayment_is_lunas() {
        let sums = PeriodSums {
            verified: dec!(150000),
            ..Default::default()
        };
        let got = reconcile(period(3, 2024), Some(dec!(100000)), sums, false);
        assert_eq!(got.status, MonthStatus::Lunas);
        assert_eq!(got.debt, Decimal::ZERO);
    }

    #[test]
    fn bast_month_is_not_applicable() {
        let got = reconcile(period(3, 2024), Some(dec!(100000)), PeriodSums::default(), true);
        assert_eq!(got.status, MonthStatus::NotApplicable);
        assert_eq!(got.debt, Decimal::ZERO);
        assert_eq!(got.expected_amount, Decimal::ZERO);
    }

    #[test]
    fn book_groups_statuses() {
        let property_id = Uuid::new_v4();
        let row = |status, total| PeriodSum {
            property_id,
            year: 2024,
            month: 5,
            status,
            total,
        };
        let book = PaymentBook::from_sums(vec![
            row(TransactionStatus::Verified, dec!(30000)),
            row(TransactionStatus::Verified, dec!(20000)),
            row(TransactionStatus::Pending, dec!(10000)),
        ]);
        let sums = book.get(property_id, period(5, 2024));
        assert_eq!(sums.verified, dec!(50000));
        assert_eq!(sums.pending, dec!(10000));
        assert_eq!(book.get(property_id, period(6, 2024)), PeriodSums::default());
    }

    #[test]
    fn month_status_serializes_as_wire_strings() {
        let json = serde_json::to_string(&MonthStatus::NotApplicable).unwrap();
        assert_eq!(json, "\"n/a\"");
        let json = serde_json::to_string(&MonthStatus::MenungguVerifikasi).unwrap();
        assert_eq!(json, "\"menunggu_verifikasi\"");
    }
}
