//! Expense and recipient administration.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{DateRangeQuery, ExpenseRequest, RecipientRequest};
use crate::middleware::AdminContext;
use crate::models::{Expense, ExpenseRecipient};
use crate::startup::AppState;

pub async fn list_recipients(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<ExpenseRecipient>>, AppError> {
    Ok(Json(state.finance.list_recipients().await?))
}

pub async fn add_recipient(
    State(state): State<AppState>,
    _admin: AdminContext,
    Json(payload): Json<RecipientRequest>,
) -> Result<(StatusCode, Json<ExpenseRecipient>), AppError> {
    payload.validate()?;
    let recipient = state.finance.add_recipient(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(recipient)))
}

pub async fn update_recipient(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(recipient_id): Path<Uuid>,
    Json(payload): Json<RecipientRequest>,
) -> Result<Json<ExpenseRecipient>, AppError> {
    payload.validate()?;
    Ok(Json(
        state
            .finance
            .update_recipient(recipient_id, payload.into())
            .await?,
    ))
}

pub async fn delete_recipient(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(recipient_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.finance.delete_recipient(recipient_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_expenses(
    State(state): State<AppState>,
    _admin: AdminContext,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<Expense>>, AppError> {
    Ok(Json(state.finance.list_expenses(range.from, range.to).await?))
}

pub async fn add_expense(
    State(state): State<AppState>,
    admin: AdminContext,
    Json(payload): Json<ExpenseRequest>,
) -> Result<(StatusCode, Json<Expense>), AppError> {
    payload.validate()?;
    tracing::info!(
        admin_id = %admin.user_id,
        amount = %payload.amount,
        date = %payload.date,
        "Recording expense"
    );
    let expense = state.finance.add_expense(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn update_expense(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(expense_id): Path<Uuid>,
    Json(payload): Json<ExpenseRequest>,
) -> Result<Json<Expense>, AppError> {
    payload.validate()?;
    Ok(Json(
        state
            .finance
            .update_expense(expense_id, payload.into())
            .await?,
    ))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(expense_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.finance.delete_expense(expense_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
