//! Public read-only dashboard.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Datelike;
use service_core::error::AppError;

use super::today;
use crate::dtos::{DetailQuery, FinancialQuery, SearchQuery, WindowQuery};
use crate::models::Property;
use crate::services::dashboard::{HistoryEntry, PropertyOverview, StatusGrid};
use crate::services::FinancialSummary;
use crate::startup::AppState;

/// Six-month status grid for every property.
pub async fn all_properties(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<StatusGrid>, AppError> {
    let window = query.window(today())?;
    tracing::info!(start = %window.start(), "Building status grid");
    Ok(Json(state.dashboard.status_grid(window).await?))
}

pub async fn search_property(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Property>, AppError> {
    Ok(Json(
        state.properties.search(&query.block, query.number).await?,
    ))
}

pub async fn overview(
    State(state): State<AppState>,
    Path((block, number)): Path<(String, i32)>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<PropertyOverview>, AppError> {
    let window = query.window(today())?;
    Ok(Json(state.dashboard.overview(&block, number, window).await?))
}

/// Payment history of one property for a year, defaulting to the current year.
pub async fn detail_history(
    State(state): State<AppState>,
    Path((block, number)): Path<(String, i32)>,
    Query(query): Query<DetailQuery>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let year = query.year.unwrap_or_else(|| today().year());
    Ok(Json(
        state
            .dashboard
            .detail_history(&block, number, year, query.status)
            .await?,
    ))
}

pub async fn financial_summary(
    State(state): State<AppState>,
    Query(query): Query<FinancialQuery>,
) -> Result<Json<FinancialSummary>, AppError> {
    let period = query.period(today())?;
    Ok(Json(state.finance.monthly_summary(period).await?))
}
