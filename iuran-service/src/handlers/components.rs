//! Component catalogue and subscription handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::today;
use crate::dtos::{
    BulkSubscriptionRequest, ComponentRequest, CreateRateRequest, DateQuery, RateRequest,
    RejectRequest, SubscribeRequest, UnsubscribeRequest,
};
use crate::middleware::{AdminContext, CallerContext};
use crate::models::{ComponentRate, ComponentSubscription, TariffComponent};
use crate::services::subscription::{BulkResult, ComponentCost, ComponentDetail};
use crate::startup::AppState;

/// Active components residents may subscribe to.
pub async fn available_components(
    State(state): State<AppState>,
) -> Result<Json<Vec<TariffComponent>>, AppError> {
    Ok(Json(state.subscriptions.list_components(true).await?))
}

pub async fn subscribe(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(payload): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<ComponentSubscription>), AppError> {
    tracing::info!(
        user_id = %caller.user_id,
        property_id = %payload.property_id,
        component_id = %payload.component_id,
        "Requesting component subscription"
    );
    let subscription = state
        .subscriptions
        .request(
            caller.user_id,
            payload.property_id,
            payload.component_id,
            payload.start_date,
            payload.end_date,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(subscription_id): Path<Uuid>,
    Json(payload): Json<UnsubscribeRequest>,
) -> Result<(StatusCode, Json<ComponentSubscription>), AppError> {
    let request = state
        .subscriptions
        .request_unsubscription(caller.user_id, subscription_id, payload.end_date)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn property_subscriptions(
    State(state): State<AppState>,
    _caller: CallerContext,
    Path(property_id): Path<Uuid>,
) -> Result<Json<Vec<ComponentSubscription>>, AppError> {
    Ok(Json(state.subscriptions.by_property(property_id).await?))
}

pub async fn component_cost(
    State(state): State<AppState>,
    _caller: CallerContext,
    Path(property_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ComponentCost>, AppError> {
    let date = query.date.unwrap_or_else(today);
    Ok(Json(
        state
            .subscriptions
            .component_cost(property_id, date)
            .await?,
    ))
}

pub async fn list_components(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<TariffComponent>>, AppError> {
    Ok(Json(state.subscriptions.list_components(false).await?))
}

pub async fn get_component(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(component_id): Path<Uuid>,
) -> Result<Json<ComponentDetail>, AppError> {
    Ok(Json(state.subscriptions.component_detail(component_id).await?))
}

pub async fn add_component(
    State(state): State<AppState>,
    _admin: AdminContext,
    Json(payload): Json<ComponentRequest>,
) -> Result<(StatusCode, Json<TariffComponent>), AppError> {
    payload.validate()?;
    let component = state.subscriptions.add_component(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(component)))
}

pub async fn update_component(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(component_id): Path<Uuid>,
    Json(payload): Json<ComponentRequest>,
) -> Result<Json<TariffComponent>, AppError> {
    payload.validate()?;
    Ok(Json(
        state
            .subscriptions
            .update_component(component_id, payload.into())
            .await?,
    ))
}

pub async fn add_rate(
    State(state): State<AppState>,
    _admin: AdminContext,
    Json(payload): Json<CreateRateRequest>,
) -> Result<(StatusCode, Json<ComponentRate>), AppError> {
    let rate = state
        .subscriptions
        .add_rate(payload.component_id, payload.rate.into())
        .await?;
    Ok((StatusCode::CREATED, Json(rate)))
}

pub async fn update_rate(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(rate_id): Path<Uuid>,
    Json(payload): Json<RateRequest>,
) -> Result<Json<ComponentRate>, AppError> {
    Ok(Json(
        state
            .subscriptions
            .update_rate(rate_id, payload.into())
            .await?,
    ))
}

pub async fn pending_requests(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<ComponentSubscription>>, AppError> {
    Ok(Json(state.subscriptions.pending().await?))
}

pub async fn approve_request(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(subscription_id): Path<Uuid>,
) -> Result<Json<ComponentSubscription>, AppError> {
    Ok(Json(
        state
            .subscriptions
            .approve(admin.user_id, subscription_id)
            .await?,
    ))
}

pub async fn reject_request(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(subscription_id): Path<Uuid>,
    Json(payload): Json<RejectRequest>,
) -> Result<Json<ComponentSubscription>, AppError> {
    payload.validate()?;
    Ok(Json(
        state
            .subscriptions
            .reject(admin.user_id, subscription_id, &payload.reason)
            .await?,
    ))
}

pub async fn bulk_subscriptions(
    State(state): State<AppState>,
    admin: AdminContext,
    Json(payload): Json<BulkSubscriptionRequest>,
) -> Result<Json<BulkResult>, AppError> {
    payload.validate()?;
    let request = payload.into_request(today());
    Ok(Json(state.subscriptions.bulk(admin.user_id, request).await?))
}

pub async fn active_subscriptions(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<ComponentSubscription>>, AppError> {
    Ok(Json(state.subscriptions.all_active().await?))
}
