//! Tariff resolution, point reconciliation and tariff administration.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use anyhow::anyhow;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::today;
use crate::dtos::{ActiveTariffQuery, TariffRequest};
use crate::middleware::AdminContext;
use crate::models::{MonthYear, Tariff};
use crate::services::MonthlyStatus;
use crate::startup::AppState;

pub async fn reconcile_month(
    State(state): State<AppState>,
    Path((property_id, year, month)): Path<(Uuid, i32, u32)>,
) -> Result<Json<MonthlyStatus>, AppError> {
    let period = MonthYear::new(month, year)
        .ok_or_else(|| AppError::BadRequest(anyhow!("invalid period {}/{}", month, year)))?;
    Ok(Json(
        state
            .reconciliation
            .reconcile_month(property_id, period)
            .await?,
    ))
}

/// The tariff in effect on `date` (today when omitted). `null` when none applies.
pub async fn active_tariff(
    State(state): State<AppState>,
    Query(query): Query<ActiveTariffQuery>,
) -> Result<Json<Option<Tariff>>, AppError> {
    let date = query.date.unwrap_or_else(today);
    Ok(Json(
        state
            .tariffs
            .active(date, query.property_type, query.tariff_type)
            .await?,
    ))
}

pub async fn list_tariffs(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<Tariff>>, AppError> {
    Ok(Json(state.tariffs.list().await?))
}

pub async fn add_tariff(
    State(state): State<AppState>,
    admin: AdminContext,
    Json(payload): Json<TariffRequest>,
) -> Result<(StatusCode, Json<Tariff>), AppError> {
    payload.validate()?;
    tracing::info!(
        admin_id = %admin.user_id,
        amount = %payload.amount,
        valid_from = %payload.valid_from,
        "Adding tariff"
    );
    let tariff = state.tariffs.add(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(tariff)))
}

pub async fn update_tariff(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(tariff_id): Path<Uuid>,
    Json(payload): Json<TariffRequest>,
) -> Result<Json<Tariff>, AppError> {
    payload.validate()?;
    tracing::info!(admin_id = %admin.user_id, tariff_id = %tariff_id, "Updating tariff");
    Ok(Json(state.tariffs.update(tariff_id, payload.into()).await?))
}

pub async fn delete_tariff(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(tariff_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tracing::info!(admin_id = %admin.user_id, tariff_id = %tariff_id, "Deleting tariff");
    state.tariffs.delete(tariff_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
