//! Tariff resolution and tariff administration.
//!
//! Resolution is a pure function over an in-memory slice so the dashboard aggregator can
//! load every tariff once and resolve hundreds of (property, month) cells without going
//! back to the database. The Postgres point lookup in
//! [`Database::find_active_for_date`](super::database::Database) uses the same ordering.

use super::metrics::{record_error, record_tariff_operation};
use super::store::TariffStore;
use crate::models::{ComponentRate, PropertyType, Tariff, TariffInput, TariffScope, TariffType};
use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A rate with an inclusive validity range and a property-type scope.
pub trait DatedRate {
    fn id(&self) -> Uuid;
    fn valid_from(&self) -> NaiveDate;
    fn valid_to(&self) -> Option<NaiveDate>;
    fn scope(&self) -> TariffScope;
    fn created_utc(&self) -> DateTime<Utc>;

    fn is_active_on(&self, date: NaiveDate) -> bool {
        self.valid_from() <= date && self.valid_to().is_none_or(|to| to >= date)
    }

    /// Whether the two inclusive ranges share at least one day. Open ends run forever.
    fn overlaps(&self, valid_from: NaiveDate, valid_to: Option<NaiveDate>) -> bool {
        let starts_before_other_ends = valid_to.is_none_or(|to| self.valid_from() <= to);
        let other_starts_before_end = self.valid_to().is_none_or(|to| valid_from <= to);
        starts_before_other_ends && other_starts_before_end
    }
}

impl DatedRate for Tariff {
    fn id(&self) -> Uuid {
        self.tariff_id
    }
    fn valid_from(&self) -> NaiveDate {
        self.valid_from
    }
    fn valid_to(&self) -> Option<NaiveDate> {
        self.valid_to
    }
    fn scope(&self) -> TariffScope {
        self.property_type
    }
    fn created_utc(&self) -> DateTime<Utc> {
        self.created_utc
    }
}

impl DatedRate for ComponentRate {
    fn id(&self) -> Uuid {
        self.rate_id
    }
    fn valid_from(&self) -> NaiveDate {
        self.valid_from
    }
    fn valid_to(&self) -> Option<NaiveDate> {
        self.valid_to
    }
    fn scope(&self) -> TariffScope {
        self.property_type
    }
    fn created_utc(&self) -> DateTime<Utc> {
        self.created_utc
    }
}

/// Pick the applicable rate for `property_type` on `date`.
///
/// Among rates active on `date` whose scope covers the property type, the one with the
/// latest `valid_from` wins; ties go to the later `created_utc`, then the greater id.
pub fn latest_applicable<'a, R, I>(
    rates: I,
    date: NaiveDate,
    property_type: PropertyType,
) -> Option<&'a R>
where
    R: DatedRate + 'a,
    I: IntoIterator<Item = &'a R>,
{
    rates
        .into_iter()
        .filter(|rate| rate.is_active_on(date) && rate.scope().covers(property_type))
        .max_by_key(|rate| (rate.valid_from(), rate.created_utc(), rate.id()))
}

/// Resolve the tariff of `tariff_type` in effect for `property_type` on `date`.
///
/// `None` means no tariff applies; callers treat that as an expected amount of zero.
pub fn resolve_tariff(
    tariffs: &[Tariff],
    date: NaiveDate,
    property_type: PropertyType,
    tariff_type: TariffType,
) -> Option<&Tariff> {
    latest_applicable(
        tariffs.iter().filter(|t| t.tariff_type == tariff_type),
        date,
        property_type,
    )
}

/// Resolve the rate of one component for `property_type` on `date`.
pub fn resolve_component_rate(
    rates: &[ComponentRate],
    component_id: Uuid,
    date: NaiveDate,
    property_type: PropertyType,
) -> Option<&ComponentRate> {
    latest_applicable(
        rates.iter().filter(|r| r.component_id == component_id),
        date,
        property_type,
    )
}

/// Date-range checks shared by tariffs and component rates.
pub fn validate_rate_window(
    amount: Decimal,
    valid_from: NaiveDate,
    valid_to: Option<NaiveDate>,
) -> Result<(), AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow!("amount must be greater than zero")));
    }
    match valid_to {
        Some(valid_to) if valid_to <= valid_from => Err(AppError::BadRequest(anyhow!(
            "validTo ({}) must be after validFrom ({})",
            valid_to,
            valid_from
        ))),
        _ => Ok(()),
    }
}

fn validate_tariff(input: &TariffInput) -> Result<(), AppError> {
    validate_rate_window(input.amount, input.valid_from, input.valid_to)?;
    if input.tariff_type == TariffType::Insidentil
        && input
            .description
            .as_deref()
            .is_none_or(|d| d.trim().is_empty())
    {
        return Err(AppError::BadRequest(anyhow!(
            "insidentil tariffs require a description"
        )));
    }
    Ok(())
}

/// Tariff administration and point resolution.
#[derive(Clone)]
pub struct TariffService {
    store: Arc<dyn TariffStore>,
    allow_overlap: bool,
}

impl TariffService {
    pub fn new(store: Arc<dyn TariffStore>, allow_overlap: bool) -> Self {
        Self {
            store,
            allow_overlap,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Tariff>, AppError> {
        self.store.list_tariffs().await
    }

    /// Resolve the tariff in effect on `date`.
    #[instrument(skip(self))]
    pub async fn active(
        &self,
        date: NaiveDate,
        property_type: PropertyType,
        tariff_type: TariffType,
    ) -> Result<Option<Tariff>, AppError> {
        self.store
            .find_active_for_date(date, property_type, tariff_type)
            .await
    }

    #[instrument(skip(self, input), fields(amount = %input.amount, valid_from = %input.valid_from))]
    pub async fn add(&self, input: TariffInput) -> Result<Tariff, AppError> {
        validate_tariff(&input)?;
        self.ensure_no_overlap(&input, None).await?;

        let tariff = self.store.create_tariff(&input).await.inspect_err(|e| {
            record_error(e.kind(), "add_tariff");
        })?;
        record_tariff_operation("create");
        info!(tariff_id = %tariff.tariff_id, "Tariff created");
        Ok(tariff)
    }

    #[instrument(skip(self, input), fields(tariff_id = %tariff_id))]
    pub async fn update(&self, tariff_id: Uuid, input: TariffInput) -> Result<Tariff, AppError> {
        validate_tariff(&input)?;
        if self.store.find_tariff(tariff_id).await?.is_none() {
            return Err(AppError::NotFound(anyhow!("Tariff {} not found", tariff_id)));
        }
        self.ensure_no_overlap(&input, Some(tariff_id)).await?;

        let tariff = self
            .store
            .update_tariff(tariff_id, &input)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("Tariff {} not found", tariff_id)))?;
        record_tariff_operation("update");
        info!("Tariff updated");
        Ok(tariff)
    }

    #[instrument(skip(self), fields(tariff_id = %tariff_id))]
    pub async fn delete(&self, tariff_id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_tariff(tariff_id).await? {
            return Err(AppError::NotFound(anyhow!("Tariff {} not found", tariff_id)));
        }
        record_tariff_operation("delete");
        info!("Tariff deleted");
        Ok(())
    }

    async fn ensure_no_overlap(
        &self,
        input: &TariffInput,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        if self.allow_overlap {
            return Ok(());
        }
        let existing = self.store.list_tariffs().await?;
        let clash = existing.iter().find(|t| {
            Some(t.tariff_id) != exclude
                && t.property_type == input.property_type
                && t.tariff_type == input.tariff_type
                && t.overlaps(input.valid_from, input.valid_to)
        });
        if let Some(clash) = clash {
            warn!(conflicting_tariff = %clash.tariff_id, "Rejected overlapping tariff");
            return Err(AppError::Conflict(anyhow!(
                "validity overlaps tariff {} ({} to {})",
                clash.tariff_id,
                clash.valid_from,
                clash
                    .valid_to
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "open".to_string())
            )));
        }
        Ok(())
    }
}
