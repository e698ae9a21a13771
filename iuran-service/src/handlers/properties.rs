use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{
    CreatePropertyRequest, LinkPropertyUserRequest, UpdateBastRequest, UpdateOwnerRequest,
    UpdatePropertyTypeRequest, UpdatePropertyUserRequest,
};
use crate::middleware::{AdminContext, CallerContext};
use crate::models::{Property, PropertyUser};
use crate::startup::AppState;

pub async fn my_properties(
    State(state): State<AppState>,
    caller: CallerContext,
) -> Result<Json<Vec<Property>>, AppError> {
    Ok(Json(state.properties.owned_by(caller.user_id).await?))
}

pub async fn list_properties(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<Property>>, AppError> {
    Ok(Json(state.properties.list().await?))
}

pub async fn create_property(
    State(state): State<AppState>,
    admin: AdminContext,
    Json(payload): Json<CreatePropertyRequest>,
) -> Result<(StatusCode, Json<Property>), AppError> {
    payload.validate()?;
    tracing::info!(
        admin_id = %admin.user_id,
        block = %payload.block,
        number = payload.number,
        "Registering property"
    );
    let property = state.properties.create(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(property)))
}

pub async fn update_type(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(property_id): Path<Uuid>,
    Json(payload): Json<UpdatePropertyTypeRequest>,
) -> Result<Json<Property>, AppError> {
    Ok(Json(
        state
            .properties
            .update_type(property_id, payload.property_type)
            .await?,
    ))
}

pub async fn update_bast(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(property_id): Path<Uuid>,
    Json(payload): Json<UpdateBastRequest>,
) -> Result<Json<Property>, AppError> {
    Ok(Json(
        state
            .properties
            .update_bast_date(property_id, payload.bast_date)
            .await?,
    ))
}

pub async fn update_owner(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(property_id): Path<Uuid>,
    Json(payload): Json<UpdateOwnerRequest>,
) -> Result<Json<Property>, AppError> {
    Ok(Json(
        state
            .properties
            .update_owner(property_id, payload.owner_id)
            .await?,
    ))
}

pub async fn property_users(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(property_id): Path<Uuid>,
) -> Result<Json<Vec<PropertyUser>>, AppError> {
    Ok(Json(state.properties.users(property_id).await?))
}

pub async fn link_property_user(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(property_id): Path<Uuid>,
    Json(payload): Json<LinkPropertyUserRequest>,
) -> Result<(StatusCode, Json<PropertyUser>), AppError> {
    tracing::info!(
        admin_id = %admin.user_id,
        property_id = %property_id,
        user_id = %payload.user_id,
        "Linking user to property"
    );
    let link = state
        .properties
        .link_user(property_id, payload.user_id, payload.relation_type)
        .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn update_property_user(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(link_id): Path<Uuid>,
    Json(payload): Json<UpdatePropertyUserRequest>,
) -> Result<Json<PropertyUser>, AppError> {
    Ok(Json(
        state
            .properties
            .update_link(link_id, payload.relation_type)
            .await?,
    ))
}

pub async fn delete_property_user(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(link_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.properties.unlink(link_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
