//! Window and arrears aggregation for the dues dashboard.
//!
//! Every read loads the tariff table once and the grouped payment sums for the whole month
//! range once, then reconciles each (property, month) cell in memory.

use super::reconciliation::{MonthStatus, MonthlyStatus, PaymentBook, reconcile_cell};
use super::store::{PaymentLedger, PropertyStore, TariffStore};
use super::tariff::resolve_tariff;
use crate::models::{
    MonthYear, Property, PropertyPayment, PropertyType, Tariff, TariffType, TransactionStatus,
    WINDOW_MONTHS, Window,
};
use anyhow::anyhow;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BastStatus {
    #[serde(rename = "Sudah BAST")]
    Handed,
    #[serde(rename = "Belum BAST")]
    NotHanded,
}

/// One dashboard row: six reconciled months plus arrears since handover.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRow {
    pub id: Uuid,
    pub block: String,
    pub number: i32,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub address: String,
    pub bast_date: Option<NaiveDate>,
    pub bast_status: BastStatus,
    pub status: MonthStatus,
    pub status_text: &'static str,
    pub monthly_status: Vec<MonthlyStatus>,
    pub total_debt: Decimal,
    pub total_debt_from_bast: Decimal,
    pub total_months_from_bast: u32,
    pub bast_lookback_capped: bool,
    pub paid_months: u32,
    pub total_months: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodBlock {
    pub start_month: u32,
    pub start_year: i32,
    pub end_month: u32,
    pub end_year: i32,
    pub months: Vec<MonthYear>,
    pub previous: MonthYear,
    pub next: MonthYear,
}

impl From<Window> for PeriodBlock {
    fn from(window: Window) -> Self {
        Self {
            start_month: window.start().month(),
            start_year: window.start().year(),
            end_month: window.end().month(),
            end_year: window.end().year(),
            months: window.months(),
            previous: window.previous().start(),
            next: window.next().start(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusGrid {
    pub properties: Vec<PropertyRow>,
    pub period: PeriodBlock,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyOverview {
    #[serde(flatten)]
    pub row: PropertyRow,
    pub period: PeriodBlock,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFilter {
    #[default]
    All,
    Paid,
    Unpaid,
}

impl HistoryFilter {
    fn keeps(&self, status: TransactionStatus) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::Paid => status == TransactionStatus::Verified,
            HistoryFilter::Unpaid => status != TransactionStatus::Verified,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub payment: PropertyPayment,
    pub expected_amount: Decimal,
    /// A tariff applies and the item covers it.
    pub is_valid: bool,
}

/// Months counted toward arrears since handover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArrearsRange {
    from: MonthYear,
    to: MonthYear,
    capped: bool,
}

/// The month after handover through `end`, trimmed to at most `max_months`.
fn arrears_range(bast_date: NaiveDate, end: MonthYear, max_months: u32) -> Option<ArrearsRange> {
    let first = MonthYear::of(bast_date).next();
    let count = first.months_through(end);
    if count == 0 {
        return None;
    }
    if max_months > 0 && count > max_months {
        return Some(ArrearsRange {
            from: end.shift(1 - max_months as i32),
            to: end,
            capped: true,
        });
    }
    Some(ArrearsRange {
        from: first,
        to: end,
        capped: false,
    })
}

#[derive(Clone)]
pub struct DashboardService {
    properties: Arc<dyn PropertyStore>,
    tariffs: Arc<dyn TariffStore>,
    ledger: Arc<dyn PaymentLedger>,
    arrears_max_months: u32,
}

impl DashboardService {
    pub fn new(
        properties: Arc<dyn PropertyStore>,
        tariffs: Arc<dyn TariffStore>,
        ledger: Arc<dyn PaymentLedger>,
        arrears_max_months: u32,
    ) -> Self {
        Self {
            properties,
            tariffs,
            ledger,
            arrears_max_months,
        }
    }

    /// Six-month status grid for every property, sorted by block then number.
    #[instrument(skip(self), fields(start = %window.start()))]
    pub async fn status_grid(&self, window: Window) -> Result<StatusGrid, AppError> {
        let mut properties = self.properties.list_properties().await?;
        properties.sort_by(|a, b| a.block.cmp(&b.block).then(a.number.cmp(&b.number)));

        let rows = self.build_rows(&properties, window, None).await?;
        info!(properties = rows.len(), "Status grid built");
        Ok(StatusGrid {
            properties: rows,
            period: window.into(),
        })
    }

    /// The same row for a single property found by block and number.
    #[instrument(skip(self), fields(start = %window.start()))]
    pub async fn overview(
        &self,
        block: &str,
        number: i32,
        window: Window,
    ) -> Result<PropertyOverview, AppError> {
        let property = self.find_property(block, number).await?;
        let ids = [property.property_id];
        let mut rows = self
            .build_rows(std::slice::from_ref(&property), window, Some(&ids[..]))
            .await?;
        let row = rows
            .pop()
            .ok_or_else(|| AppError::InternalError(anyhow!("overview produced no row")))?;
        Ok(PropertyOverview {
            row,
            period: window.into(),
        })
    }

    /// Payment items of one property for a year, newest first, checked against tariffs.
    #[instrument(skip(self))]
    pub async fn detail_history(
        &self,
        block: &str,
        number: i32,
        year: i32,
        filter: HistoryFilter,
    ) -> Result<Vec<HistoryEntry>, AppError> {
        let property = self.find_property(block, number).await?;
        let tariffs = self.tariffs.list_tariffs().await?;
        let payments = self
            .ledger
            .property_payments(property.property_id, year)
            .await?;

        Ok(payments
            .into_iter()
            .filter(|payment| filter.keeps(payment.status))
            .map(|payment| {
                let tariff = payment.period().and_then(|period| {
                    resolve_tariff(
                        &tariffs,
                        period.first_day(),
                        property.property_type,
                        TariffType::Rutin,
                    )
                });
                HistoryEntry {
                    expected_amount: tariff.map(|t| t.amount).unwrap_or(Decimal::ZERO),
                    is_valid: tariff.is_some_and(|t| payment.amount >= t.amount),
                    payment,
                }
            })
            .collect())
    }

    async fn find_property(&self, block: &str, number: i32) -> Result<Property, AppError> {
        self.properties
            .find_by_block_number(block, number)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow!("Property Blok {} No. {} not found", block, number))
            })
    }

    async fn build_rows(
        &self,
        properties: &[Property],
        window: Window,
        scope: Option<&[Uuid]>,
    ) -> Result<Vec<PropertyRow>, AppError> {
        if properties.is_empty() {
            return Ok(Vec::new());
        }

        let ranges: Vec<Option<ArrearsRange>> = properties
            .iter()
            .map(|p| {
                p.bast_date
                    .and_then(|bast| arrears_range(bast, window.end(), self.arrears_max_months))
            })
            .collect();
        let from = ranges
            .iter()
            .flatten()
            .map(|range| range.from)
            .fold(window.start(), std::cmp::min);

        let tariffs = self.tariffs.list_tariffs().await?;
        let book = PaymentBook::from_sums(self.ledger.period_sums(scope, from, window.end()).await?);

        Ok(properties
            .iter()
            .zip(ranges)
            .map(|(property, range)| self.build_row(property, window, range, &tariffs, &book))
            .collect())
    }

    fn build_row(
        &self,
        property: &Property,
        window: Window,
        range: Option<ArrearsRange>,
        tariffs: &[Tariff],
        book: &PaymentBook,
    ) -> PropertyRow {
        let monthly_status: Vec<MonthlyStatus> = window
            .months()
            .into_iter()
            .map(|period| reconcile_cell(property, period, tariffs, book))
            .collect();

        let paid_months = monthly_status
            .iter()
            .filter(|m| m.status == MonthStatus::Lunas)
            .count() as u32;
        let total_debt = monthly_status.iter().map(|m| m.debt).sum();

        let (total_debt_from_bast, total_months_from_bast, capped) = match range {
            Some(range) => {
                if range.capped {
                    warn!(
                        property_id = %property.property_id,
                        max_months = self.arrears_max_months,
                        "Arrears lookback capped"
                    );
                }
                let debt = MonthYear::range_inclusive(range.from, range.to)
                    .map(|period| reconcile_cell(property, period, tariffs, book).debt)
                    .sum();
                (debt, range.from.months_through(range.to), range.capped)
            }
            None => (Decimal::ZERO, 0, false),
        };

        let status = if paid_months == WINDOW_MONTHS {
            MonthStatus::Lunas
        } else {
            MonthStatus::BelumLunas
        };

        PropertyRow {
            id: property.property_id,
            block: property.block.clone(),
            number: property.number,
            property_type: property.property_type,
            address: property.address(),
            bast_date: property.bast_date,
            bast_status: if property.bast_date.is_some() {
                BastStatus::Handed
            } else {
                BastStatus::NotHanded
            },
            status,
            status_text: if status == MonthStatus::Lunas {
                "Lunas"
            } else {
                "Belum Lunas"
            },
            monthly_status,
            total_debt,
            total_debt_from_bast,
            total_months_from_bast,
            bast_lookback_capped: capped,
            paid_months,
            total_months: WINDOW_MONTHS,
        }
    }
}
